//! MCP client over the streamable-HTTP transport

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::tools::{RemoteTool, ToolHost, ToolReply};
use crate::Result;

use super::protocol::{
    CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION,
    SESSION_HEADER,
};

/// An initialized session with one tool host.
///
/// Created per request by the chat server; [`McpClient::close`] ends it.
pub struct McpClient {
    http: reqwest::Client,
    endpoint: String,
    session_id: Option<String>,
    next_id: AtomicU64,
    server_name: Option<String>,
}

impl McpClient {
    /// Connect and run the initialize handshake.
    pub async fn connect(endpoint: &str, http: reqwest::Client) -> Result<Self> {
        let mut client = Self {
            http,
            endpoint: endpoint.to_string(),
            session_id: None,
            next_id: AtomicU64::new(1),
            server_name: None,
        };

        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let (result, session_id) = client.exchange("initialize", Some(params)).await?;
        client.session_id = session_id;
        client.server_name = result
            .pointer("/serverInfo/name")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        client.notify("notifications/initialized").await?;

        info!(
            "Connected to MCP server {} at {}",
            client.server_name.as_deref().unwrap_or("(unnamed)"),
            client.endpoint
        );
        Ok(client)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// End the session. Best effort; failures are only logged.
    pub async fn close(&self) {
        let Some(ref session_id) = self.session_id else {
            return;
        };

        match self
            .http
            .delete(&self.endpoint)
            .header(SESSION_HEADER, session_id)
            .send()
            .await
        {
            Ok(response) => debug!("Closed MCP session {} ({})", session_id, response.status()),
            Err(e) => warn!("Failed to close MCP session {}: {}", session_id, e),
        }
    }

    /// Send a request and return its result.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let (result, _) = self.exchange(method, params).await?;
        Ok(result)
    }

    async fn exchange(&self, method: &str, params: Option<Value>) -> Result<(Value, Option<String>)> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        debug!("MCP request {} #{}", method, id);

        let response = self.post(&request).await?;

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let rpc = if is_sse {
            read_sse_response(response.bytes_stream(), id).await?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&response.text().await?)?
        };

        if let Some(error) = rpc.error {
            return Err(Error::Mcp(format!("{} failed ({}): {}", method, error.code, error.message)));
        }

        Ok((rpc.result.unwrap_or(Value::Null), session_id))
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let request = JsonRpcRequest::notification(method);
        self.post(&request).await?;
        Ok(())
    }

    async fn post(&self, request: &JsonRpcRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(request);

        if let Some(ref session_id) = self.session_id {
            builder = builder.header(SESSION_HEADER, session_id);
        }

        let response = builder.send().await.map_err(|e| {
            Error::Mcp(format!("MCP server unreachable at {}: {}", self.endpoint, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Mcp(format!("{} returned HTTP {}: {}", request.method, status, body)));
        }

        Ok(response)
    }
}

/// Read events until the response carrying `id` arrives. Notifications and
/// replies to other requests are skipped.
async fn read_sse_response<S, B, E>(body: S, id: u64) -> Result<JsonRpcResponse>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let events = body.eventsource();
    tokio::pin!(events);

    while let Some(event) = events.next().await {
        let event = event.map_err(|e| Error::Mcp(format!("event stream for request #{} failed: {}", id, e)))?;
        match serde_json::from_str::<JsonRpcResponse>(&event.data) {
            Ok(rpc) if rpc.id == Value::from(id) => return Ok(rpc),
            _ => continue,
        }
    }

    Err(Error::Mcp(format!("no response for request #{} in event stream", id)))
}

#[async_trait]
impl ToolHost for McpClient {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult = serde_json::from_value(self.request("tools/list", params).await?)?;

            tools.extend(page.tools.into_iter().map(|t| RemoteTool {
                name: t.name,
                description: t.description,
            }));

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!("Tool host lists {} tools", tools.len());
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolReply> {
        let params = json!({ "name": name, "arguments": arguments });
        let result: CallToolResult = serde_json::from_value(self.request("tools/call", Some(params)).await?)?;

        Ok(ToolReply {
            text: result.primary_text().map(str::to_string),
            is_error: result.is_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::McpServer;
    use crate::tools::{AddTool, DummyTool, MultiplyTool, Tool};

    async fn spawn_tool_host(tools: Vec<Box<dyn Tool>>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = McpServer::new(tools).router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/mcp", addr)
    }

    #[tokio::test]
    async fn test_loopback_list_and_call() {
        let url = spawn_tool_host(vec![Box::new(AddTool), Box::new(MultiplyTool)]).await;
        let client = tokio_test::assert_ok!(McpClient::connect(&url, reqwest::Client::new()).await);

        assert!(client.session_id().is_some());
        assert_eq!(client.server_name(), Some("mcpchat-tools"));

        let tools = client.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["add", "multiply"]);

        let reply = tokio_test::assert_ok!(client.call_tool("add", json!({"a": 25, "b": 17})).await);
        assert_eq!(reply, ToolReply { text: Some("42".to_string()), is_error: false });

        client.close().await;
    }

    #[tokio::test]
    async fn test_loopback_tool_failure_is_flagged() {
        let url = spawn_tool_host(vec![Box::new(AddTool)]).await;
        let client = McpClient::connect(&url, reqwest::Client::new()).await.unwrap();

        let reply = client.call_tool("add", json!({"a": 1})).await.unwrap();
        assert!(reply.is_error);
        assert!(reply.text.unwrap().contains("'b'"));
    }

    #[tokio::test]
    async fn test_loopback_unknown_method() {
        let url = spawn_tool_host(vec![Box::new(DummyTool {
            name: "echo".to_string(),
            result: "hi".to_string(),
        })])
        .await;
        let client = McpClient::connect(&url, reqwest::Client::new()).await.unwrap();

        let err = client.request("resources/list", None).await.unwrap_err();
        assert!(matches!(err, Error::Mcp(_)));
        assert!(err.to_string().contains("-32601"));
    }

    #[tokio::test]
    async fn test_connect_unreachable() {
        let result = McpClient::connect("http://127.0.0.1:9/mcp", reqwest::Client::new()).await;
        assert!(matches!(result, Err(Error::Mcp(_))));
    }

    fn event_body(text: &'static str) -> impl Stream<Item = std::result::Result<&'static str, std::convert::Infallible>> {
        futures_util::stream::iter(vec![Ok(text)])
    }

    #[tokio::test]
    async fn test_sse_response_matches_id() {
        let body = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"tools\":[]}}\n\n",
        );
        let rpc = read_sse_response(event_body(body), 3).await.unwrap();
        assert_eq!(rpc.result, Some(json!({"tools": []})));
        assert!(read_sse_response(event_body(body), 4).await.is_err());
    }

    #[tokio::test]
    async fn test_sse_response_with_cr_line_endings() {
        let body = concat!(
            "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\r\r",
            "data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"ok\":true}}\r\r",
            ": done\r\r",
        );
        let rpc = read_sse_response(event_body(body), 2).await.unwrap();
        assert_eq!(rpc.result, Some(json!({"ok": true})));
    }
}
