//! Agent loop - the two-phase tool-call state machine
//!
//! One model call decides between a direct answer and tool use; when tools
//! are requested they run in order and a second, tool-less call writes the
//! answer from their results.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::TokenBudget;
use crate::error::Error;
use crate::tools::ToolOutcome;
use crate::Result;
use super::context::Session;
use super::events::{ChatEvent, ToolCallSummary};
use super::llm::{ChatOptions, LlmClient, LlmResponse};
use super::message::{Message, Response, ToolCall};

/// States a run passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Start,
    FirstModelCall,
    DirectAnswer,
    ToolDispatch,
    SecondModelCall,
    End,
    Error,
}

/// Final text for a run that failed at a model call.
pub fn apology(err: &Error) -> String {
    format!(
        "Sorry, an error occurred during the conversation ({}): {}",
        err.kind(),
        err
    )
}

/// The agent loop processes messages through LLM and tool execution
pub struct AgentLoop<C: LlmClient + ?Sized> {
    client: Arc<C>,
    persona: String,
    budget: TokenBudget,
}

impl<C: LlmClient + ?Sized> AgentLoop<C> {
    /// Create a new agent loop
    pub fn new(client: Arc<C>, persona: impl Into<String>, budget: TokenBudget) -> Self {
        Self {
            client,
            persona: persona.into(),
            budget,
        }
    }

    /// Answer one message. Never fails: a model error becomes an apology.
    pub async fn run(&self, text: &str, session: &mut Session) -> Response {
        let mut trace = vec![LoopState::Start];
        session.start(&self.persona, text);
        info!("Starting agent loop with message: {}", text);

        match self.drive(session, &mut trace).await {
            Ok(mut response) => {
                trace.push(LoopState::End);
                info!("Agent completed with response: {} chars", response.content.len());
                response.states = trace;
                response
            }
            Err(e) => {
                error!("Conversation failed: {}", e);
                trace.push(LoopState::Error);
                let mut response = Response::new(apology(&e));
                response.states = trace;
                response
            }
        }
    }

    /// Answer one message, reporting progress on `sink`.
    ///
    /// Ends with exactly one `end` or `error` event. A closed sink does not
    /// stop the run.
    pub async fn run_streaming(
        &self,
        text: &str,
        session: &mut Session,
        sink: &mpsc::Sender<ChatEvent>,
    ) -> Vec<LoopState> {
        let mut trace = vec![LoopState::Start];
        emit(sink, ChatEvent::Start {
            message: "Processing your request...".to_string(),
        })
        .await;
        session.start(&self.persona, text);
        info!("Starting streaming agent loop with message: {}", text);

        match self.drive_streaming(session, sink, &mut trace).await {
            Ok(()) => {
                trace.push(LoopState::End);
                emit(sink, ChatEvent::End {
                    message: "Response complete".to_string(),
                })
                .await;
            }
            Err(e) => {
                error!("Streaming conversation failed: {}", e);
                trace.push(LoopState::Error);
                emit(sink, ChatEvent::Error { error: apology(&e) }).await;
            }
        }

        trace
    }

    async fn drive(&self, session: &mut Session, trace: &mut Vec<LoopState>) -> Result<Response> {
        trace.push(LoopState::FirstModelCall);
        let first = self.first_call(session).await?;

        if !first.has_tool_calls() {
            trace.push(LoopState::DirectAnswer);
            return Ok(Response::new(first.content.unwrap_or_default()));
        }

        trace.push(LoopState::ToolDispatch);
        let tool_calls = self.dispatch(session, first, None).await;

        trace.push(LoopState::SecondModelCall);
        let options = ChatOptions::with_max_tokens(self.budget.follow_up);
        let reply = self.client.chat(&session.messages, &[], &options).await?;

        Ok(Response {
            content: reply.content.unwrap_or_default(),
            tool_calls,
            states: Vec::new(),
        })
    }

    async fn drive_streaming(
        &self,
        session: &mut Session,
        sink: &mpsc::Sender<ChatEvent>,
        trace: &mut Vec<LoopState>,
    ) -> Result<()> {
        trace.push(LoopState::FirstModelCall);
        let first = self.first_call(session).await?;

        if !first.has_tool_calls() {
            trace.push(LoopState::DirectAnswer);
            emit(sink, generating()).await;
            let content = first.content.unwrap_or_default();
            if !content.is_empty() {
                emit(sink, ChatEvent::Content { content }).await;
            }
            return Ok(());
        }

        trace.push(LoopState::ToolDispatch);
        emit(sink, ChatEvent::ToolCalls {
            tools: first.tool_calls.iter().map(ToolCallSummary::from).collect(),
        })
        .await;
        self.dispatch(session, first, Some(sink)).await;

        trace.push(LoopState::SecondModelCall);
        emit(sink, generating()).await;
        let options = ChatOptions::with_max_tokens(self.budget.follow_up);
        let mut stream = self.client.chat_stream(&session.messages, &options).await?;

        while let Some(fragment) = stream.next().await {
            emit(sink, ChatEvent::Content { content: fragment? }).await;
        }

        Ok(())
    }

    async fn first_call(&self, session: &Session) -> Result<LlmResponse> {
        let options = ChatOptions::with_max_tokens(self.budget.first_call);
        debug!("First model call with {} tools", session.registry.len());
        self.client
            .chat(&session.messages, session.registry.all(), &options)
            .await
    }

    /// Echo the assistant turn and run every requested tool in order.
    async fn dispatch(
        &self,
        session: &mut Session,
        reply: LlmResponse,
        sink: Option<&mpsc::Sender<ChatEvent>>,
    ) -> Vec<ToolCall> {
        session.messages.push(Message::assistant_with_tools(
            reply.content,
            reply.tool_calls.clone(),
        ));

        let mut records = Vec::with_capacity(reply.tool_calls.len());
        for call in reply.tool_calls {
            if let Some(sink) = sink {
                emit(sink, ChatEvent::ToolExecuting {
                    tool_name: call.name.clone(),
                    message: format!("Calling tool {}...", call.name),
                })
                .await;
            }

            let outcome = match call.parse_arguments() {
                Ok(arguments) => session.executor.execute(&call.name, arguments).await,
                Err(e) => {
                    warn!("Skipping tool {}: {}", call.name, e);
                    ToolOutcome::failure(e)
                }
            };

            if let Some(sink) = sink {
                let event = match outcome {
                    ToolOutcome::Success(ref result) => ChatEvent::ToolResult {
                        tool_name: call.name.clone(),
                        result: result.clone(),
                    },
                    ToolOutcome::Failure(ref error) => ChatEvent::ToolError {
                        tool_name: call.name.clone(),
                        error: error.clone(),
                    },
                };
                emit(sink, event).await;
            }

            session.messages.push(Message::tool_result(&call.id, outcome.text()));
            records.push(ToolCall {
                failed: !outcome.is_success(),
                result: outcome.into_text(),
                id: call.id,
                name: call.name,
                arguments: call.arguments,
            });
        }

        records
    }
}

fn generating() -> ChatEvent {
    ChatEvent::Generating {
        message: "Generating answer...".to_string(),
    }
}

async fn emit(sink: &mpsc::Sender<ChatEvent>, event: ChatEvent) {
    let kind = event.kind();
    if sink.send(event).await.is_err() {
        debug!("Event sink closed, dropping {} event", kind);
    }
}
