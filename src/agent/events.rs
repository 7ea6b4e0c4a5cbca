//! Progress events of a streamed conversation
//!
//! Each event serializes to one JSON object with a `type` discriminator, so a
//! transport can frame them as newline-delimited JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use super::message::ToolCallRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Start { message: String },
    ToolCalls { tools: Vec<ToolCallSummary> },
    ToolExecuting { tool_name: String, message: String },
    ToolResult { tool_name: String, result: String },
    ToolError { tool_name: String, error: String },
    Generating { message: String },
    Content { content: String },
    End { message: String },
    Error { error: String },
}

impl ChatEvent {
    /// The `type` tag of this event
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::Start { .. } => "start",
            ChatEvent::ToolCalls { .. } => "tool_calls",
            ChatEvent::ToolExecuting { .. } => "tool_executing",
            ChatEvent::ToolResult { .. } => "tool_result",
            ChatEvent::ToolError { .. } => "tool_error",
            ChatEvent::Generating { .. } => "generating",
            ChatEvent::Content { .. } => "content",
            ChatEvent::End { .. } => "end",
            ChatEvent::Error { .. } => "error",
        }
    }

    /// Serialize as one NDJSON line, trailing newline included.
    pub fn to_ndjson_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// A requested tool call as announced to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallSummary {
    pub id: String,
    pub name: String,

    /// Parsed arguments; the raw string when they are not valid JSON
    pub arguments: Value,
}

impl From<&ToolCallRequest> for ToolCallSummary {
    fn from(call: &ToolCallRequest) -> Self {
        let arguments = call
            .parse_arguments()
            .unwrap_or_else(|_| Value::String(call.arguments.clone()));
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = ChatEvent::ToolExecuting {
            tool_name: "weather".to_string(),
            message: "Calling tool weather...".to_string(),
        };
        let line = event.to_ndjson_line().unwrap();

        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(
            value,
            json!({"type": "tool_executing", "tool_name": "weather", "message": "Calling tool weather..."})
        );
        assert_eq!(event.kind(), "tool_executing");
    }

    #[test]
    fn test_tool_call_summary_arguments() {
        let parsed = ToolCallSummary::from(&ToolCallRequest::new("c1", "add", r#"{"a":1,"b":2}"#));
        assert_eq!(parsed.arguments, json!({"a": 1, "b": 2}));

        let raw = ToolCallSummary::from(&ToolCallRequest::new("c2", "add", "{oops"));
        assert_eq!(raw.arguments, json!("{oops"));

        let value = serde_json::to_value(ChatEvent::ToolCalls { tools: vec![parsed] }).unwrap();
        assert_eq!(value["type"], "tool_calls");
        assert_eq!(value["tools"][0]["name"], "add");
    }
}
