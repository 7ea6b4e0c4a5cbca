//! Tool executor - invokes remote tools and turns every result into text

use std::sync::Arc;
use serde_json::Value;
use tracing::{debug, warn};

use super::ToolHost;

const FAILURE_PREFIX: &str = "tool invocation failed";
const EMPTY_RESULT: &str = "tool call succeeded but returned no result";

/// Result of one tool invocation. Both variants end up as plain text in the
/// conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success(String),
    Failure(String),
}

impl ToolOutcome {
    /// Failure with the standard prefix
    pub fn failure(detail: impl std::fmt::Display) -> Self {
        ToolOutcome::Failure(format!("{}: {}", FAILURE_PREFIX, detail))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    pub fn text(&self) -> &str {
        match self {
            ToolOutcome::Success(text) | ToolOutcome::Failure(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ToolOutcome::Success(text) | ToolOutcome::Failure(text) => text,
        }
    }
}

/// Executes tool calls against an optional host
#[derive(Clone)]
pub struct ToolExecutor {
    host: Option<Arc<dyn ToolHost>>,
}

impl ToolExecutor {
    pub fn new(host: Option<Arc<dyn ToolHost>>) -> Self {
        Self { host }
    }

    /// Executor without a host; every call fails with "tool host unavailable"
    pub fn detached() -> Self {
        Self { host: None }
    }

    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    /// Execute a tool by name. Never fails.
    pub async fn execute(&self, name: &str, arguments: Value) -> ToolOutcome {
        let Some(host) = self.host.as_ref() else {
            warn!("Tool '{}' requested but no tool host is connected", name);
            return ToolOutcome::failure("tool host unavailable");
        };

        debug!("Calling tool '{}' with {}", name, arguments);

        match host.call_tool(name, arguments).await {
            Ok(reply) if reply.is_error => {
                let detail = reply.text.unwrap_or_else(|| "tool reported an error".to_string());
                warn!("Tool '{}' reported an error: {}", name, detail);
                ToolOutcome::failure(detail)
            }
            Ok(reply) => match reply.text {
                Some(text) => {
                    debug!("Tool '{}' succeeded: {} chars", name, text.len());
                    ToolOutcome::Success(text)
                }
                None => ToolOutcome::Success(EMPTY_RESULT.to_string()),
            },
            Err(e) => {
                warn!("Tool '{}' failed: {}", name, e);
                ToolOutcome::failure(e)
            }
        }
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FakeToolHost, ToolReply};
    use serde_json::json;

    #[tokio::test]
    async fn test_execute_success() {
        let host = Arc::new(FakeToolHost::new().with_tool("add", "Add", "42"));
        let executor = ToolExecutor::new(Some(host.clone()));

        let outcome = executor.execute("add", json!({"a": 25, "b": 17})).await;

        assert_eq!(outcome, ToolOutcome::Success("42".to_string()));
        assert_eq!(host.recorded_calls(), vec![("add".to_string(), json!({"a": 25, "b": 17}))]);
    }

    #[tokio::test]
    async fn test_execute_without_host() {
        let outcome = ToolExecutor::detached().execute("add", json!({})).await;
        assert_eq!(outcome.text(), "tool invocation failed: tool host unavailable");
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_execute_host_error_becomes_text() {
        let host = Arc::new(FakeToolHost::new().with_failing_tool("add", "boom"));
        let outcome = ToolExecutor::new(Some(host)).execute("add", json!({})).await;

        assert!(!outcome.is_success());
        assert!(outcome.text().starts_with("tool invocation failed:"));
        assert!(outcome.text().contains("boom"));
    }

    #[tokio::test]
    async fn test_execute_empty_and_error_replies() {
        let mut host = FakeToolHost::new().with_tool("quiet", "", "");
        host.replies.insert("quiet".to_string(), Ok(ToolReply::default()));
        host.replies.insert(
            "grumpy".to_string(),
            Ok(ToolReply { text: Some("bad city".to_string()), is_error: true }),
        );
        let executor = ToolExecutor::new(Some(Arc::new(host)));

        let quiet = executor.execute("quiet", json!({})).await;
        assert_eq!(quiet, ToolOutcome::Success(EMPTY_RESULT.to_string()));

        let grumpy = executor.execute("grumpy", json!({})).await;
        assert_eq!(grumpy.into_text(), "tool invocation failed: bad city");
    }
}
