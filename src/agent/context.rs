//! Per-request session state and prompt building.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::mcp::McpClient;
use crate::tools::{SchemaLookup, ToolExecutor, ToolHost, ToolRegistry};

use super::message::Message;

/// Appended to the persona when tools are on offer.
const TOOL_SENTENCE: &str =
    " You have some tools that can help fetch real-time information, such as weather lookups.";

/// Build the system prompt for a registry.
pub fn system_prompt(persona: &str, registry: &ToolRegistry) -> String {
    if registry.is_empty() {
        persona.to_string()
    } else {
        format!("{}{}", persona, TOOL_SENTENCE)
    }
}

/// Everything one request needs: the conversation, the tools offered to the
/// model and the executor bound to this request's tool-host connection.
pub struct Session {
    pub messages: Vec<Message>,
    pub registry: ToolRegistry,
    pub executor: ToolExecutor,
    mcp: Option<Arc<McpClient>>,
}

impl Session {
    pub fn new(registry: ToolRegistry, executor: ToolExecutor) -> Self {
        Self {
            messages: Vec::new(),
            registry,
            executor,
            mcp: None,
        }
    }

    /// Session with no tools and no host.
    pub fn detached() -> Self {
        Self::new(ToolRegistry::new(), ToolExecutor::detached())
    }

    /// Open a session against the configured tool host.
    ///
    /// Never fails: without a configured URL, or when the host cannot be
    /// reached, the session simply has no tools.
    pub async fn open(config: &Config, http: &reqwest::Client) -> Self {
        let Some(ref url) = config.mcp_server_url else {
            return Self::detached();
        };

        let client = match McpClient::connect(url, http.clone()).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!("Tool host unavailable, continuing without tools: {}", e);
                return Self::detached();
            }
        };

        let schemas = SchemaLookup::load(&config.schemas_path);
        let registry = ToolRegistry::build(client.as_ref(), &schemas).await;
        info!("Session opened with tools: {:?}", registry.names());

        let host: Arc<dyn ToolHost> = client.clone();
        Self {
            messages: Vec::new(),
            registry,
            executor: ToolExecutor::new(Some(host)),
            mcp: Some(client),
        }
    }

    /// Reset the conversation to `[system, user]`.
    pub fn start(&mut self, persona: &str, text: &str) {
        self.messages.clear();
        self.messages.push(Message::system(system_prompt(persona, &self.registry)));
        self.messages.push(Message::user(text));
    }

    /// End the tool-host session, if any.
    pub async fn close(self) {
        if let Some(client) = self.mcp {
            client.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::Role;
    use crate::tools::{empty_parameters, ToolDescriptor};

    #[test]
    fn test_system_prompt_mentions_tools_only_when_present() {
        let persona = "You are helpful.";
        assert_eq!(system_prompt(persona, &ToolRegistry::new()), persona);

        let registry = ToolRegistry::from_descriptors(vec![ToolDescriptor {
            name: "weather".to_string(),
            description: "Weather".to_string(),
            parameters: empty_parameters(),
        }]);
        let prompt = system_prompt(persona, &registry);
        assert!(prompt.starts_with(persona));
        assert!(prompt.contains("tools"));
    }

    #[test]
    fn test_start_resets_conversation() {
        let mut session = Session::detached();
        session.start("persona", "first");
        session.messages.push(Message::assistant("reply"));
        session.start("persona", "second");

        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role(), Role::System);
        assert_eq!(session.messages[1].content(), "second");
    }

    #[tokio::test]
    async fn test_open_without_url_is_detached() {
        let session = Session::open(&Config::default(), &reqwest::Client::new()).await;
        assert!(session.registry.is_empty());
        assert!(!session.executor.has_host());
    }

    #[tokio::test]
    async fn test_open_unreachable_host_degrades() {
        let config = Config {
            mcp_server_url: Some("http://127.0.0.1:9/mcp".to_string()),
            ..Config::default()
        };
        let session = Session::open(&config, &reqwest::Client::new()).await;
        assert!(session.registry.is_empty());
        assert!(!session.executor.has_host());
        session.close().await;
    }
}
