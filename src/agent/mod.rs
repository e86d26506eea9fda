pub mod client;
pub mod conversation;
pub mod openai;
pub mod prompt;
pub mod reply;

pub use client::{ModelClient, ModelError, ModelReply, ToolMode};
pub use conversation::{Conversation, Role, Turn, TurnContent};

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use thiserror::Error;

use crate::limits::MAX_MESSAGE_LEN;
use crate::observability::{MODEL_CALL_DURATION_SECONDS, MODEL_CALLS_TOTAL, SESSIONS_TOTAL, outcome_label};
use crate::tools::{TOOLS, ToolCall, ToolInvocation, ToolRegistry};

pub const MAX_ITERATIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The model called `terminate`.
    Terminated { message: String },
    /// The iteration budget ran out. Carries no message.
    Exhausted,
    /// The model failed mid-session.
    Interrupted { reason: String },
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub termination: Termination,
    /// Model calls made.
    pub iterations: u32,
    pub conversation: Conversation,
}

impl SessionOutcome {
    pub fn message(&self) -> Option<&str> {
        match &self.termination {
            Termination::Terminated { message } => Some(message),
            _ => None,
        }
    }
}

enum State {
    AwaitingModelReply,
    DispatchingTool { reply: Turn, call_id: Option<String>, invocation: ToolInvocation },
    Done(Termination),
}

/// Bounded model-driven control loop.
///
/// Each iteration sends the whole conversation to the model, turns its reply
/// into one tool invocation and records the result.
pub struct AgentLoop {
    client: Arc<dyn ModelClient>,
    registry: Arc<ToolRegistry>,
    mode: ToolMode,
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(client: Arc<dyn ModelClient>, registry: Arc<ToolRegistry>, mode: ToolMode) -> Self {
        Self {
            client,
            registry,
            mode,
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run one session for `request`.
    ///
    /// Fails only if the request is unusable or the very first model call
    /// fails; every other problem is fed back to the model or ends the session
    /// with a `Termination`.
    pub async fn run(&self, request: &str) -> Result<SessionOutcome, AgentError> {
        let request = request.trim();
        if request.is_empty() {
            return Err(AgentError::InvalidRequest("empty request"));
        }
        if request.len() > MAX_MESSAGE_LEN {
            return Err(AgentError::InvalidRequest("request too long"));
        }

        let mut conversation = Conversation::new(prompt::system_instructions(self.mode), request);
        let mut iterations = 0u32;
        let mut state = State::AwaitingModelReply;
        tracing::info!(mode = ?self.mode, "session started");

        let termination = loop {
            state = match state {
                State::AwaitingModelReply => {
                    if iterations >= self.max_iterations {
                        State::Done(Termination::Exhausted)
                    } else {
                        iterations += 1;
                        let result = self.call_model(conversation.turns()).await;
                        match result {
                            Ok(reply) => self.on_reply(reply, &mut conversation),
                            Err(e) if iterations == 1 => {
                                metrics::counter!(SESSIONS_TOTAL, "outcome" => "failed").increment(1);
                                return Err(AgentError::Model(e));
                            }
                            Err(e) => State::Done(Termination::Interrupted { reason: e.to_string() }),
                        }
                    }
                }
                State::DispatchingTool {
                    reply,
                    call_id,
                    invocation,
                } => self.dispatch(reply, call_id, &invocation, &mut conversation).await,
                State::Done(termination) => break termination,
            };
        };

        metrics::counter!(SESSIONS_TOTAL, "outcome" => outcome_label(&termination)).increment(1);
        tracing::info!(iterations, outcome = outcome_label(&termination), "session finished");
        Ok(SessionOutcome {
            termination,
            iterations,
            conversation,
        })
    }

    async fn call_model(&self, turns: &[Turn]) -> Result<ModelReply, ModelError> {
        let tools = (self.mode == ToolMode::Native).then_some(TOOLS);
        let start = Instant::now();
        let result = self.client.complete(turns, tools).await;
        metrics::histogram!(MODEL_CALL_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(MODEL_CALLS_TOTAL, "status" => status).increment(1);
        if let Err(e) = &result {
            tracing::error!("model call failed: {e}");
        }
        result
    }

    fn on_reply(&self, reply: ModelReply, conversation: &mut Conversation) -> State {
        let (turn, call_id) = match &reply {
            ModelReply::Text(text) => (Turn::assistant_text(text.clone()), None),
            ModelReply::ToolCall { id, name, arguments } => (
                Turn::assistant_tool_call(id.clone(), name.clone(), arguments.clone()),
                Some(id.clone()),
            ),
        };
        match reply::parse_reply(&reply, self.mode) {
            Ok(invocation) => {
                tracing::debug!(tool = %invocation.tool_name, "model requested tool");
                State::DispatchingTool {
                    reply: turn,
                    call_id,
                    invocation,
                }
            }
            Err(e) => {
                tracing::warn!("unparseable model reply: {e}");
                conversation.record_exchange(turn, Turn::tool_result(call_id, json!({ "error": e.to_string() })));
                State::AwaitingModelReply
            }
        }
    }

    async fn dispatch(
        &self,
        reply: Turn,
        call_id: Option<String>,
        invocation: &ToolInvocation,
        conversation: &mut Conversation,
    ) -> State {
        let payload: Value = match self.registry.validate(invocation) {
            Ok(ToolCall::Terminate { message }) => {
                conversation.record_final(reply);
                return State::Done(Termination::Terminated { message });
            }
            Ok(call) => match self.registry.execute(&call).await {
                Ok(result) => json!({ "result": result }),
                Err(e) => json!({ "error": e.to_string() }),
            },
            Err(e) => json!({ "error": e.to_string() }),
        };
        conversation.record_exchange(reply, Turn::tool_result(call_id, payload));
        State::AwaitingModelReply
    }
}
