use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::{ModelClient, ModelError, ModelReply};
use super::conversation::{Role, Turn, TurnContent};
use crate::tools::ToolSpec;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// `ModelClient` over an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            model: model.into(),
            max_tokens,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// ── Wire types ───────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDef>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize)]
struct ToolDef {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDef,
}

#[derive(Debug, Serialize)]
struct FunctionDef {
    name: &'static str,
    description: &'static str,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn to_message(turn: &Turn) -> ChatMessage {
    let text = |role, content: String| ChatMessage {
        role,
        content: Some(content),
        tool_calls: None,
        tool_call_id: None,
    };
    match (&turn.role, &turn.content) {
        (Role::Assistant, TurnContent::ToolCall { id, name, arguments }) => ChatMessage {
            role: "assistant",
            content: None,
            tool_calls: Some(vec![WireToolCall {
                id: id.clone(),
                kind: function_kind(),
                function: WireFunction {
                    name: name.clone(),
                    arguments: arguments.clone(),
                },
            }]),
            tool_call_id: None,
        },
        (_, TurnContent::ToolResult {
            call_id: Some(id),
            payload,
        }) => ChatMessage {
            role: "tool",
            content: Some(payload.to_string()),
            tool_calls: None,
            tool_call_id: Some(id.clone()),
        },
        // Results of plain-text exchanges go back as user messages.
        (Role::Tool, _) => text("user", turn.render()),
        (Role::System, _) => text("system", turn.render()),
        (Role::User, _) => text("user", turn.render()),
        (Role::Assistant, _) => text("assistant", turn.render()),
    }
}

fn to_tool_defs(tools: &[ToolSpec]) -> Vec<ToolDef> {
    tools
        .iter()
        .map(|t| ToolDef {
            kind: "function",
            function: FunctionDef {
                name: t.name,
                description: t.description,
                parameters: t.parameters_schema(),
            },
        })
        .collect()
}

fn into_reply(response: ChatResponse) -> Result<ModelReply, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::InvalidResponse("no choices".into()))?;
    let message = choice.message;
    if let Some(call) = message.tool_calls.into_iter().next() {
        return Ok(ModelReply::ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        });
    }
    message
        .content
        .map(ModelReply::Text)
        .ok_or_else(|| ModelError::InvalidResponse("reply has neither content nor tool call".into()))
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, turns: &[Turn], tools: Option<&[ToolSpec]>) -> Result<ModelReply, ModelError> {
        let body = ChatRequest {
            model: &self.model,
            messages: turns.iter().map(to_message).collect(),
            max_tokens: self.max_tokens,
            tools: tools.map(to_tool_defs),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        into_reply(parsed)
    }
}
