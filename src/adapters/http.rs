//! HTTP adapter - chat endpoints over axum.
//!
//! `POST /chat/stream` answers with newline-delimited JSON events;
//! `POST /chat` with a single JSON object. Every chat request gets its own
//! tool-host session, opened before the loop runs and closed after it ends.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, info_span, warn, Instrument};

use crate::agent::{AgentLoop, ChatEvent, ChatOptions, LlmClient, Message, OpenAiClient, Session};
use crate::config::Config;
use crate::Result;

use super::Channel;

const EVENT_BUFFER: usize = 32;
const CHAT_PAGE: &str = include_str!("../../static/chat.html");

/// Standard JSON error body: `{ "ok": false, "error": { "code", "message" } }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorResponse {
    pub ok: bool,
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorResponse {
                ok: false,
                error: ApiErrorBody {
                    code: code.into(),
                    message: message.into(),
                },
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Shared across requests: configuration and the chat client.
pub struct AppState {
    pub config: Config,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub http: reqwest::Client,
}

impl AppState {
    fn agent(&self) -> std::result::Result<AgentLoop<dyn LlmClient>, ApiError> {
        let llm = self
            .llm
            .clone()
            .ok_or_else(|| ApiError::internal("OPENAI_API_KEY is not configured"))?;
        Ok(AgentLoop::new(llm, self.config.persona.clone(), self.config.budget))
    }
}

/// The chat server
pub struct ChatServer {
    state: Arc<AppState>,
}

impl ChatServer {
    pub fn new(config: Config, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            state: Arc::new(AppState {
                config,
                llm,
                http: reqwest::Client::new(),
            }),
        }
    }

    /// Build the chat client from configuration. Without an API key the
    /// server still starts; chat routes then answer 500.
    pub fn from_config(config: Config) -> Self {
        let llm: Option<Arc<dyn LlmClient>> = if config.has_api_key() {
            Some(Arc::new(OpenAiClient::new(
                &config.openai_api_key,
                &config.openai_base_url,
                &config.model,
            )))
        } else {
            warn!("OPENAI_API_KEY is not set; chat endpoints will fail");
            None
        };
        Self::new(config, llm)
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(index))
            .route("/chat", post(chat))
            .route("/chat/stream", post(chat_stream))
            .route("/health", get(health))
            .route("/test", post(test_llm))
            .with_state(self.state.clone())
            .layer(cors)
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        let server = &self.state.config.server;
        format!("{}:{}", server.host, server.port)
            .parse()
            .map_err(|e| crate::Error::Config(format!("Invalid listen address: {}", e)))
    }

    /// Serve until Ctrl+C.
    pub async fn serve(&self, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Chat server listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        Ok(())
    }
}

impl Channel for ChatServer {
    fn name(&self) -> &str {
        "http"
    }

    async fn start(&self) -> Result<()> {
        let addr = self.addr()?;
        self.serve(addr).await
    }
}

fn validate(request: &ChatRequest) -> std::result::Result<&str, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    Ok(message)
}

async fn index() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Response, ApiError> {
    let message = validate(&request)?.to_string();
    let agent = state.agent()?;

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("chat_stream", %request_id);
    let (tx, rx) = mpsc::channel::<ChatEvent>(EVENT_BUFFER);

    tokio::spawn(
        async move {
            let mut session = Session::open(&state.config, &state.http).await;
            let states = agent.run_streaming(&message, &mut session, &tx).await;
            session.close().await;
            info!("Request finished in {:?}", states.last());
        }
        .instrument(span),
    );

    let lines = ReceiverStream::new(rx).map(|event| {
        let line = event.to_ndjson_line().unwrap_or_else(|e| {
            error!("Failed to encode {} event: {}", event.kind(), e);
            String::new()
        });
        Ok::<_, Infallible>(line)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(lines))
        .map_err(|e| ApiError::internal(e.to_string()))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Json<Value>, ApiError> {
    let message = validate(&request)?;
    let agent = state.agent()?;

    let request_id = uuid::Uuid::new_v4();
    let response = async {
        let mut session = Session::open(&state.config, &state.http).await;
        let response = agent.run(message, &mut session).await;
        session.close().await;
        response
    }
    .instrument(info_span!("chat", %request_id))
    .await;

    Ok(Json(json!({ "response": response.content })))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    let llm_client = if state.llm.is_some() { "initialized" } else { "not initialized" };
    let api_key = if config.has_api_key() { "set" } else { "missing" };

    Json(json!({
        "status": "healthy",
        "message": "MCP chat server is running",
        "llm_client": llm_client,
        "mcp_server_url": config.mcp_server_url,
        "environment": {
            "openai_api_key": api_key,
            "openai_base_url": config.openai_base_url,
        },
        "time": chrono::Local::now().to_rfc3339(),
    }))
}

/// One tool-less round trip to check the chat API is reachable.
async fn test_llm(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let Some(ref llm) = state.llm else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "error": "OPENAI_API_KEY is not configured",
                "message": "Chat API connection failed",
            })),
        );
    };

    let messages = [Message::user("Hello, please reply with a short greeting.")];
    match llm.chat(&messages, &[], &ChatOptions::with_max_tokens(50)).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "response": reply.content.unwrap_or_default(),
                "message": "Chat API connection is working",
            })),
        ),
        Err(e) => {
            warn!("Chat API test failed: {}", e);
            (
                StatusCode::OK,
                Json(json!({
                    "status": "error",
                    "error": e.to_string(),
                    "message": "Chat API connection failed",
                })),
            )
        }
    }
}
