//! Message types for agent communication
//!
//! [`Message`] serializes directly into the chat completion wire format, so
//! a conversation can be sent as-is.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;
use crate::error::Error;
use super::loop_impl::LoopState;

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,

        /// Tool calls made by assistant, in the order the model emitted them
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Message::System { content: content.into() }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Message::User { content: content.into() }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message with tool calls
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Message::Assistant { content, tool_calls }
    }

    /// Create a tool result message
    pub fn tool_result(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Message::Tool {
            tool_call_id: call_id.into(),
            content: result.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::Tool { .. } => Role::Tool,
        }
    }

    /// Text content, empty for an assistant turn that only carries tool calls.
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Tool { content, .. } => content,
            Message::Assistant { content, .. } => content.as_deref().unwrap_or(""),
        }
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call request from the LLM.
///
/// `arguments` is kept as the exact string the model produced; some
/// backends check that the echoed assistant turn matches byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireToolCall", from = "WireToolCall")]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the argument string into a JSON object.
    ///
    /// Blank input means "no arguments". Anything that is not a JSON object
    /// is rejected.
    pub fn parse_arguments(&self) -> Result<Value> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(value @ Value::Object(_)) => Ok(value),
            Ok(other) => Err(Error::Tool(format!(
                "arguments for '{}' must be a JSON object, got {}",
                self.name, other
            ))),
            Err(e) => Err(Error::Tool(format!(
                "malformed arguments for '{}': {}",
                self.name, e
            ))),
        }
    }
}

/// Chat completion wire shape of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

impl From<ToolCallRequest> for WireToolCall {
    fn from(call: ToolCallRequest) -> Self {
        Self {
            id: call.id,
            kind: function_type(),
            function: WireFunction {
                name: call.name,
                arguments: call.arguments,
            },
        }
    }
}

impl From<WireToolCall> for ToolCallRequest {
    fn from(wire: WireToolCall) -> Self {
        Self {
            id: wire.id,
            name: wire.function.name,
            arguments: wire.function.arguments,
        }
    }
}

/// A tool call with its result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub result: String,
    pub failed: bool,
}

/// Response from the agent
#[derive(Debug, Clone)]
pub struct Response {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,

    /// States visited, in order
    pub states: Vec<LoopState>,
}

impl Response {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: vec![],
            states: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), "Hello");
    }

    #[test]
    fn test_assistant_wire_format_keeps_raw_arguments() {
        let raw = r#"{"a":25,  "b":17}"#;
        let msg = Message::assistant_with_tools(None, vec![ToolCallRequest::new("call_1", "add", raw)]);
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "add", "arguments": raw}
                }]
            })
        );
    }

    #[test]
    fn test_tool_message_wire_format() {
        let value = serde_json::to_value(Message::tool_result("call_1", "42")).unwrap();
        assert_eq!(value, json!({"role": "tool", "tool_call_id": "call_1", "content": "42"}));
    }

    #[test]
    fn test_plain_assistant_omits_tool_calls() {
        let value = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(value, json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn test_parse_arguments() {
        let call = ToolCallRequest::new("1", "add", r#"{"a": 1}"#);
        assert_eq!(call.parse_arguments().unwrap(), json!({"a": 1}));

        let blank = ToolCallRequest::new("2", "now", "  ");
        assert_eq!(blank.parse_arguments().unwrap(), json!({}));

        let broken = ToolCallRequest::new("3", "add", r#"{"a": "#);
        assert!(broken.parse_arguments().is_err());

        let array = ToolCallRequest::new("4", "add", "[1, 2]");
        assert!(array.parse_arguments().is_err());
    }
}
