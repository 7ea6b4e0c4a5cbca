//! LLM client abstraction layer.
//!
//! This module provides:
//! - [`LlmClient`] trait for swappable chat completion backends
//! - [`OpenAiClient`], the OpenAI-compatible implementation
//!
//! # Adding a New Provider
//!
//! 1. Create a new file (e.g., `anthropic.rs`)
//! 2. Implement `LlmClient` trait
//! 3. Construct it where the server builds its client

mod types;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::tools::ToolDescriptor;
use crate::Result;

pub use types::*;

pub mod openai;

pub use openai::OpenAiClient;

use super::message::{Message, ToolCallRequest};

/// Stream of content fragments, in the order the model produced them.
pub type ContentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text content of the response.
    pub content: Option<String>,

    /// Tool calls requested by the LLM.
    pub tool_calls: Vec<ToolCallRequest>,

    /// Reason the response finished.
    pub finish_reason: String,

    /// Token usage statistics.
    pub usage: Usage,
}

impl LlmResponse {
    /// Create a simple text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: vec![],
            finish_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    /// Create a response that only requests tools.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls: calls,
            finish_reason: "tool_calls".to_string(),
            usage: Usage::default(),
        }
    }

    /// Check if response has tool calls.
    #[inline]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Per-call request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatOptions {
    pub max_tokens: u32,
}

impl ChatOptions {
    pub fn with_max_tokens(max_tokens: u32) -> Self {
        Self { max_tokens }
    }
}

/// LLM client trait - swappable provider abstraction.
///
/// Implement this trait to add a new LLM provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send messages and get response. An empty `tools` slice means the
    /// request carries no tool fields at all.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        options: &ChatOptions,
    ) -> Result<LlmResponse>;

    /// Stream the content of a tool-less completion.
    async fn chat_stream(&self, messages: &[Message], options: &ChatOptions) -> Result<ContentStream>;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;
}

/// One request as seen by [`FakeLlmClient`].
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub max_tokens: u32,
    pub streamed: bool,
}

/// Fake LLM client for testing.
///
/// Pops scripted responses in order for both `chat` and `chat_stream`; a
/// streamed text response is split into one fragment per word.
#[cfg(test)]
pub struct FakeLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<LlmResponse>>>,
    requests: std::sync::Mutex<Vec<RecordedRequest>>,
}

#[cfg(test)]
impl FakeLlmClient {
    /// Create with predefined text responses.
    pub fn new(responses: Vec<&str>) -> Self {
        Self::scripted(responses.iter().map(|s| Ok(LlmResponse::text(*s))).collect())
    }

    /// Create from an explicit script, errors included.
    pub fn scripted(responses: Vec<Result<LlmResponse>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create with a single tool call followed by a text response.
    pub fn with_tool_call(name: &str, args: &str, final_response: &str) -> Self {
        Self::scripted(vec![
            Ok(LlmResponse::tool_calls(vec![ToolCallRequest::new("tc_1", name, args)])),
            Ok(LlmResponse::text(final_response)),
        ])
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, messages: &[Message], tools: &[ToolDescriptor], options: &ChatOptions, streamed: bool) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            max_tokens: options.max_tokens,
            streamed,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(crate::Error::Llm("No more fake responses".to_string())))
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        options: &ChatOptions,
    ) -> Result<LlmResponse> {
        self.next(messages, tools, options, false)
    }

    async fn chat_stream(&self, messages: &[Message], options: &ChatOptions) -> Result<ContentStream> {
        let response = self.next(messages, &[], options, true)?;
        let content = response.content.unwrap_or_default();
        let fragments: Vec<Result<String>> = content
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok(Box::pin(futures_util::stream::iter(fragments)))
    }

    fn default_model(&self) -> &str {
        "fake-model"
    }
}
