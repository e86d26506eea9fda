use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

use super::conversation::Turn;
use crate::tools::ToolSpec;

/// How tool calls travel between the loop and the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    /// The model writes a fenced `action` JSON block in plain text.
    #[default]
    Text,
    /// The model returns a structured function call.
    Native,
}

impl FromStr for ToolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ToolMode::Text),
            "native" => Ok(ToolMode::Native),
            other => Err(format!("unknown tool mode `{other}`, expected `text` or `native`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Transport(String),
    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

/// The language model behind the loop. One outstanding call per session.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// `tools` is `Some` only in native mode.
    async fn complete(&self, turns: &[Turn], tools: Option<&[ToolSpec]>) -> Result<ModelReply, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_mode_parses_case_insensitively() {
        assert_eq!("text".parse::<ToolMode>(), Ok(ToolMode::Text));
        assert_eq!(" Native ".parse::<ToolMode>(), Ok(ToolMode::Native));
        assert!("json".parse::<ToolMode>().is_err());
    }
}
