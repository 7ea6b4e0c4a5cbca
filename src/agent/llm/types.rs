//! Wire types for the OpenAI-compatible chat completion API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::message::{Message, ToolCallRequest};

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],

    /// Omitted entirely when there are no tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>,

    pub max_tokens: u32,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

/// Top-level chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<UsageInfo>,
}

/// A single response choice.
#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

/// Assistant message of a choice.
#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,

    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

/// Token usage block.
#[derive(Debug, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: Option<usize>,
    pub completion_tokens: Option<usize>,
    pub total_tokens: Option<usize>,
}

/// One `data:` payload of a streamed completion.
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
}
