//! Agent module - core agent logic.
//!
//! This module contains:
//! - Message types (Message, ToolCallRequest, Response)
//! - LLM client trait and the OpenAI-compatible implementation
//! - Agent loop: the two-phase tool-call state machine
//! - Session state and prompt building
//! - Progress events for streaming transports

mod context;
mod events;
mod loop_impl;
mod message;

// LLM providers in submodule
pub mod llm;

// Re-exports for convenience
pub use context::{system_prompt, Session};
pub use events::{ChatEvent, ToolCallSummary};
pub use llm::{ChatOptions, ContentStream, LlmClient, LlmResponse, OpenAiClient, Usage};
pub use loop_impl::{apology, AgentLoop, LoopState};
pub use message::{Message, Response, Role, ToolCall, ToolCallRequest};
