use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnContent {
    Text {
        text: String,
    },
    /// A structured call as the model returned it; `arguments` is raw JSON text.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// `{"result": ...}` or `{"error": ...}`. `call_id` pairs it with a
    /// structured call; plain-text exchanges have none.
    ToolResult {
        call_id: Option<String>,
        payload: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: TurnContent::Text { text: text.into() },
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text { text: text.into() },
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text { text: text.into() },
        }
    }

    pub fn assistant_tool_call(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::ToolCall {
                id: id.into(),
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn tool_result(call_id: Option<String>, payload: Value) -> Self {
        Self {
            role: Role::Tool,
            content: TurnContent::ToolResult { call_id, payload },
        }
    }

    /// The turn as plain text, for collaborators without structured turns.
    pub fn render(&self) -> String {
        match &self.content {
            TurnContent::Text { text } => text.clone(),
            TurnContent::ToolCall { name, arguments, .. } => {
                format!("{{\"tool_name\": \"{name}\", \"args\": {arguments}}}")
            }
            TurnContent::ToolResult { payload, .. } => payload.to_string(),
        }
    }
}

/// Ordered turns of one session. Turns are only ever appended.
///
/// After the opening system and user turns, assistant replies and tool
/// results are recorded in pairs; only a final reply stands alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(instructions: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(instructions), Turn::user(request)],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub(crate) fn record_exchange(&mut self, reply: Turn, result: Turn) {
        debug_assert_eq!(reply.role, Role::Assistant);
        debug_assert_eq!(result.role, Role::Tool);
        self.turns.push(reply);
        self.turns.push(result);
    }

    pub(crate) fn record_final(&mut self, reply: Turn) {
        debug_assert_eq!(reply.role, Role::Assistant);
        self.turns.push(reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn opens_with_instructions_and_request() {
        let conv = Conversation::new("rules", "book me a haircut");
        assert_eq!(conv.len(), 2);
        assert!(!conv.is_empty());
        assert_eq!(conv.turns()[0].role, Role::System);
        assert_eq!(conv.turns()[1], Turn::user("book me a haircut"));
    }

    #[test]
    fn exchanges_append_in_pairs() {
        let mut conv = Conversation::new("rules", "hi");
        conv.record_exchange(
            Turn::assistant_text("```action\n{}\n```"),
            Turn::tool_result(None, json!({"error": "bad"})),
        );
        conv.record_final(Turn::assistant_text("done"));
        let roles: Vec<Role> = conv.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
    }

    #[test]
    fn render_tool_call_as_action_json() {
        let turn = Turn::assistant_tool_call("call_1", "list_available_slots", r#"{"service_id":1}"#);
        let rendered: Value = serde_json::from_str(&turn.render()).unwrap();
        assert_eq!(rendered, json!({"tool_name": "list_available_slots", "args": {"service_id": 1}}));
    }
}
