//! MCP tool host - serves [`Tool`]s over streamable HTTP at `/mcp`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ToolHostConfig;
use crate::error::Error;
use crate::tools::{AddTool, CityCodes, MultiplyTool, Tool, WeatherTool};
use crate::Result;

use super::protocol::{
    CallToolParams, CallToolResult, Content, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    ToolInfo, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
    SESSION_HEADER,
};

const SERVER_NAME: &str = "mcpchat-tools";

/// Tool host. Stateless: session ids are issued but never required.
pub struct McpServer {
    tools: Vec<Box<dyn Tool>>,
}

impl McpServer {
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Host with the standard tool set: `weather`, `add`, `multiply`.
    pub fn from_config(config: &ToolHostConfig) -> Result<Self> {
        let cities = match config.adcode_table {
            Some(ref path) => CityCodes::with_table(path)?,
            None => CityCodes::builtin(),
        };

        if config.amap_key.is_empty() {
            warn!("No AMap key configured (KEY / AMAP_KEY); weather calls will fail");
        }

        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(WeatherTool::new(&config.amap_key, cities)?),
            Box::new(AddTool),
            Box::new(MultiplyTool),
        ];
        Ok(Self::new(tools))
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/mcp", post(handle_post).delete(handle_delete))
            .with_state(Arc::new(self))
    }

    /// Serve until Ctrl+C.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let names = self.tool_names().join(", ");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("MCP tool host listening on http://{}/mcp ({})", addr, names);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        Ok(())
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => {
                let requested = request
                    .params
                    .as_ref()
                    .and_then(|p| p.get("protocolVersion"))
                    .and_then(|v| v.as_str())
                    .unwrap_or(PROTOCOL_VERSION);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": requested,
                        "capabilities": {"tools": {"listChanged": false}},
                        "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")}
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                let result = ListToolsResult {
                    tools: self
                        .tools
                        .iter()
                        .map(|t| {
                            let descriptor = t.to_descriptor();
                            ToolInfo {
                                name: descriptor.name,
                                description: Some(descriptor.description),
                                input_schema: descriptor.parameters,
                            }
                        })
                        .collect(),
                    next_cursor: None,
                };
                to_response(id, &result)
            }
            "tools/call" => {
                let params: CallToolParams = match request.params.map(serde_json::from_value) {
                    Some(Ok(params)) => params,
                    Some(Err(e)) => return JsonRpcResponse::failure(id, INVALID_PARAMS, e.to_string()),
                    None => return JsonRpcResponse::failure(id, INVALID_PARAMS, "missing params"),
                };

                let Some(tool) = self.tools.iter().find(|t| t.name() == params.name) else {
                    return JsonRpcResponse::failure(id, INVALID_PARAMS, format!("Unknown tool: {}", params.name));
                };

                let arguments = params.arguments.unwrap_or_else(|| json!({}));
                debug!("tools/call {} {}", params.name, arguments);

                let result = match tool.execute(arguments).await {
                    Ok(text) => CallToolResult {
                        content: vec![Content::text(text)],
                        is_error: false,
                    },
                    Err(e) => {
                        warn!("Tool {} failed: {}", params.name, e);
                        CallToolResult {
                            content: vec![Content::text(e.to_string())],
                            is_error: true,
                        }
                    }
                };
                to_response(id, &result)
            }
            other => JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
        }
    }
}

fn to_response<T: serde::Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::failure(id, INVALID_REQUEST, Error::from(e).to_string()),
    }
}

async fn handle_post(State(server): State<Arc<McpServer>>, headers: HeaderMap, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Rejecting malformed JSON-RPC body: {}", e);
            let rpc = JsonRpcResponse::failure(Value::Null, PARSE_ERROR, format!("Parse error: {}", e));
            return (StatusCode::BAD_REQUEST, Json(rpc)).into_response();
        }
    };

    if request.is_notification() {
        debug!("Notification {}", request.method);
        return StatusCode::ACCEPTED.into_response();
    }

    let is_initialize = request.method == "initialize";
    let rpc = server.dispatch(request).await;
    let mut response = Json(rpc).into_response();

    if is_initialize {
        let session_id = headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }

    response
}

async fn handle_delete(headers: HeaderMap) -> StatusCode {
    if let Some(session_id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        debug!("Session {} closed", session_id);
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::DummyTool;

    async fn spawn(server: McpServer) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, server.router()).await.unwrap();
        });
        format!("http://{}/mcp", addr)
    }

    fn echo_server() -> McpServer {
        McpServer::new(vec![Box::new(DummyTool {
            name: "echo".to_string(),
            result: "pong".to_string(),
        })])
    }

    #[tokio::test]
    async fn test_notification_is_accepted() {
        let url = spawn(echo_server()).await;
        let response = reqwest::Client::new()
            .post(&url)
            .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
        assert!(response.text().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let url = spawn(echo_server()).await;
        let response = reqwest::Client::new()
            .post(&url)
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_list_includes_input_schema() {
        let url = spawn(McpServer::new(vec![Box::new(AddTool)])).await;
        let body: Value = reqwest::Client::new()
            .post(&url)
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["result"]["tools"][0]["name"], "add");
        assert_eq!(body["result"]["tools"][0]["description"], "Add two integers");
        assert_eq!(body["result"]["tools"][0]["inputSchema"]["required"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_delete() {
        let url = spawn(echo_server()).await;
        let http = reqwest::Client::new();

        let body: Value = http
            .post(&url)
            .json(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "nope"}}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["error"]["code"], INVALID_PARAMS);

        let status = http.delete(&url).header(SESSION_HEADER, "abc").send().await.unwrap().status();
        assert_eq!(status, reqwest::StatusCode::OK);
    }

    #[test]
    fn test_from_config_registers_standard_tools() {
        let server = McpServer::from_config(&ToolHostConfig::default()).unwrap();
        assert_eq!(server.tool_names(), vec!["weather", "add", "multiply"]);
    }
}
