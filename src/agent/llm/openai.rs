//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::{Event, EventSource};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::error::Error;
use crate::tools::ToolDescriptor;
use crate::Result;

use super::super::message::Message;
use super::{ChatOptions, ChatRequest, ChatResponse, ContentStream, LlmClient, LlmResponse, StreamChunk, Usage};

const DONE_MARKER: &str = "[DONE]";

/// Client for any endpoint speaking the chat completions protocol.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl OpenAiClient {
    /// Create a new client. `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: Client::new(),
        }
    }

    fn build_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn post(&self, request: &ChatRequest<'_>) -> RequestBuilder {
        self.client
            .post(self.build_url())
            .bearer_auth(&self.api_key)
            .json(request)
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let response = self.post(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("chat API error ({status}): {error_text}")));
        }

        Ok(response)
    }

    fn parse_response(&self, response: ChatResponse) -> Result<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Llm("No choices in response".to_string()))?;

        let usage = response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens.unwrap_or(0),
                completion_tokens: u.completion_tokens.unwrap_or(0),
                total_tokens: u.total_tokens.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        options: &ChatOptions,
    ) -> Result<LlmResponse> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            tools: (!tools.is_empty()).then(|| tools.iter().map(|t| t.to_function_schema()).collect()),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            max_tokens: options.max_tokens,
            stream: false,
        };

        debug!("Chat request: {} messages, {} tools", messages.len(), tools.len());
        let response = self.send(&request).await?;
        let chat_response: ChatResponse = response.json().await?;
        self.parse_response(chat_response)
    }

    async fn chat_stream(&self, messages: &[Message], options: &ChatOptions) -> Result<ContentStream> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            tools: None,
            tool_choice: None,
            max_tokens: options.max_tokens,
            stream: true,
        };

        debug!("Streaming chat request: {} messages", messages.len());
        let mut events = EventSource::new(self.post(&request))
            .map_err(|e| Error::Llm(format!("chat stream request failed: {e}")))?;

        // Surface a rejected request here rather than mid-stream.
        match events.next().await {
            Some(Ok(Event::Open)) => {}
            Some(Ok(Event::Message(_))) => {
                events.close();
                return Err(Error::Llm("chat stream sent data before opening".to_string()));
            }
            Some(Err(e)) => {
                events.close();
                return Err(stream_error(e).await);
            }
            None => return Err(Error::Llm("chat stream closed before opening".to_string())),
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(forward_content(events, tx));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

/// Pump content fragments from the event source until `[DONE]`, the end of
/// the body, or the first error.
async fn forward_content(mut events: EventSource, tx: mpsc::Sender<Result<String>>) {
    while let Some(event) = events.next().await {
        let message = match event {
            Ok(Event::Message(message)) => message,
            Ok(Event::Open) => continue,
            Err(reqwest_eventsource::Error::StreamEnded) => break,
            Err(e) => {
                let _ = tx.send(Err(stream_error(e).await)).await;
                break;
            }
        };

        if message.data.trim() == DONE_MARKER {
            break;
        }

        match content_fragment(&message.data) {
            Ok(Some(fragment)) => {
                if tx.send(Ok(fragment)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
    events.close();
}

fn content_fragment(data: &str) -> Result<Option<String>> {
    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|e| Error::Llm(format!("malformed stream chunk: {e}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty()))
}

async fn stream_error(err: reqwest_eventsource::Error) -> Error {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let error_text = response.text().await.unwrap_or_default();
            Error::Llm(format!("chat API error ({status}): {error_text}"))
        }
        other => Error::Llm(format!("chat stream failed: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<Value>>>;

    async fn completions(State(seen): State<Seen>, Json(body): Json<Value>) -> axum::response::Response {
        seen.lock().unwrap().push(body.clone());

        if body["messages"][0]["content"] == "fail" {
            return (StatusCode::TOO_MANY_REQUESTS, "quota exceeded").into_response();
        }

        if body["stream"] == json!(true) {
            let sse = concat!(
                "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
                ": keep-alive\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"It is \"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"sunny.\"}}]}\n\n",
                "data: [DONE]\n\n",
            );
            let sse = if body["messages"][0]["content"] == "cr" {
                sse.replace('\n', "\r")
            } else {
                sse.to_string()
            };
            return ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response();
        }

        if body.get("tools").is_some() {
            return Json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "add", "arguments": "{\"a\":25,\"b\":17}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
            }))
            .into_response();
        }

        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}]
        }))
        .into_response()
    }

    async fn spawn_fake_api() -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(seen.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1/", addr), seen)
    }

    fn add_descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "add".to_string(),
            description: "Add two integers".to_string(),
            parameters: json!({"type": "object", "properties": {}, "required": []}),
        }
    }

    #[tokio::test]
    async fn test_chat_without_tools_omits_tool_fields() {
        let (base, seen) = spawn_fake_api().await;
        let client = OpenAiClient::new("sk-test", &base, "gpt-4o-mini");

        let response = client
            .chat(&[Message::user("hello")], &[], &ChatOptions::with_max_tokens(500))
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("hello"));
        let body = seen.lock().unwrap()[0].clone();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("stream").is_none());
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["model"], "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_chat_with_tools_parses_tool_calls() {
        let (base, seen) = spawn_fake_api().await;
        let client = OpenAiClient::new("sk-test", &base, "gpt-4o-mini");

        let response = client
            .chat(&[Message::user("25+17?")], &[add_descriptor()], &ChatOptions::with_max_tokens(500))
            .await
            .unwrap();

        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].name, "add");
        assert_eq!(response.tool_calls[0].arguments, r#"{"a":25,"b":17}"#);
        assert_eq!(response.usage.total_tokens, 20);

        let body = seen.lock().unwrap()[0].clone();
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "add");
    }

    #[tokio::test]
    async fn test_chat_error_status() {
        let (base, _) = spawn_fake_api().await;
        let client = OpenAiClient::new("sk-test", &base, "gpt-4o-mini");

        let err = client
            .chat(&[Message::user("fail")], &[], &ChatOptions::with_max_tokens(10))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Llm(_)));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_chat_stream_yields_fragments_in_order() {
        let (base, seen) = spawn_fake_api().await;
        let client = OpenAiClient::new("sk-test", &base, "gpt-4o-mini");

        let stream = client
            .chat_stream(&[Message::user("weather?")], &ChatOptions::with_max_tokens(300))
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;

        assert_eq!(fragments, vec!["It is ", "sunny."]);
        let body = seen.lock().unwrap()[0].clone();
        assert_eq!(body["stream"], true);
        assert!(body.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_chat_stream_accepts_cr_line_endings() {
        let (base, _) = spawn_fake_api().await;
        let client = OpenAiClient::new("sk-test", &base, "gpt-4o-mini");

        let stream = client
            .chat_stream(&[Message::user("cr")], &ChatOptions::with_max_tokens(300))
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;

        assert_eq!(fragments, vec!["It is ", "sunny."]);
    }

    #[tokio::test]
    async fn test_chat_stream_error_status() {
        let (base, _) = spawn_fake_api().await;
        let client = OpenAiClient::new("sk-test", &base, "gpt-4o-mini");

        let err = match client
            .chat_stream(&[Message::user("fail")], &ChatOptions::with_max_tokens(300))
            .await
        {
            Ok(_) => panic!("expected a rejected stream"),
            Err(e) => e,
        };

        assert!(matches!(err, Error::Llm(_)));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_default_model() {
        let client = OpenAiClient::new("sk-test", "http://localhost/v1", "gpt-4o-mini");
        assert_eq!(client.default_model(), "gpt-4o-mini");
    }
}
