use serde_json::{Map, Value};
use thiserror::Error;

use super::client::{ModelReply, ToolMode};
use crate::limits::MAX_REPLY_LEN;
use crate::tools::ToolInvocation;

/// Fence tag of the block text-mode replies carry their call in.
pub const ACTION_BLOCK: &str = "action";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("Invalid JSON response. You must respond with a JSON tool invocation.")]
    InvalidJson,
    #[error("You must respond with a JSON tool invocation.")]
    MissingFields,
    #[error("You must call one of the available tools.")]
    NoToolCall,
    #[error("Tool call arguments must be a JSON object.")]
    InvalidArguments,
    #[error("Response too long.")]
    TooLong,
}

/// Contents of the first fenced block, minus a leading `block_type` tag.
/// Text without any fence is returned whole.
pub fn extract_markdown_block<'a>(reply: &'a str, block_type: &str) -> &'a str {
    let Some(inner) = reply.split("```").nth(1) else {
        return reply;
    };
    let inner = inner.trim();
    inner.strip_prefix(block_type).map_or(inner, str::trim)
}

/// Parse an `action` block of the form `{"tool_name": ..., "args": {...}}`.
pub fn parse_text_reply(text: &str) -> Result<ToolInvocation, ReplyError> {
    if text.len() > MAX_REPLY_LEN {
        return Err(ReplyError::TooLong);
    }
    let block = extract_markdown_block(text, ACTION_BLOCK);
    let value: Value = serde_json::from_str(block).map_err(|_| ReplyError::InvalidJson)?;
    let Value::Object(mut obj) = value else {
        return Err(ReplyError::MissingFields);
    };
    let (Some(Value::String(tool_name)), Some(args)) = (obj.remove("tool_name"), obj.remove("args")) else {
        return Err(ReplyError::MissingFields);
    };
    let Value::Object(args) = args else {
        return Err(ReplyError::InvalidArguments);
    };
    Ok(ToolInvocation { tool_name, args })
}

/// Parse a structured call whose arguments arrive as JSON text.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolInvocation, ReplyError> {
    if arguments.len() > MAX_REPLY_LEN {
        return Err(ReplyError::TooLong);
    }
    let args = if arguments.trim().is_empty() {
        Map::new()
    } else {
        match serde_json::from_str(arguments).map_err(|_| ReplyError::InvalidJson)? {
            Value::Object(args) => args,
            _ => return Err(ReplyError::InvalidArguments),
        }
    };
    Ok(ToolInvocation {
        tool_name: name.to_string(),
        args,
    })
}

/// Exactly one invocation out of a reply, or why there is none.
pub fn parse_reply(reply: &ModelReply, mode: ToolMode) -> Result<ToolInvocation, ReplyError> {
    match (reply, mode) {
        (ModelReply::ToolCall { name, arguments, .. }, _) => parse_tool_call(name, arguments),
        (ModelReply::Text(text), ToolMode::Text) => parse_text_reply(text),
        (ModelReply::Text(_), ToolMode::Native) => Err(ReplyError::NoToolCall),
    }
}
