//! Adapters module - front-ends that drive the agent loop.
//!
//! Each adapter implements the [`Channel`] trait for uniform handling.
//!
//! # Supported Channels
//!
//! - **HTTP** - NDJSON streaming and single-reply chat endpoints
//! - **CLI** - Interactive and one-shot command line interface
//!
//! # Adding a New Channel
//!
//! 1. Create a new file (e.g., `websocket.rs`)
//! 2. Implement the [`Channel`] trait
//! 3. Add to [`ChannelRegistry`]

pub mod cli;
pub mod http;

use crate::config::Config;

/// Channel trait for chat adapters.
///
/// All channel implementations must be [`Send`] + [`Sync`] for async compatibility.
pub trait Channel: Send + Sync {
    /// Channel name (e.g., "http", "cli").
    fn name(&self) -> &str;

    /// Run the channel until it finishes or is interrupted.
    fn start(&self) -> impl std::future::Future<Output = crate::Result<()>> + Send;
}

/// Channel registry - metadata about available channels.
pub struct ChannelRegistry;

impl ChannelRegistry {
    /// List all available channel names.
    pub fn available() -> &'static [&'static str] {
        &["http", "cli"]
    }

    /// Check if a channel can run with this config.
    pub fn is_enabled(name: &str, config: &Config) -> bool {
        match name {
            "http" | "cli" => config.has_api_key(),
            _ => false,
        }
    }

    /// Get a human-readable description of a channel.
    pub fn description(name: &str) -> &'static str {
        match name {
            "http" => "Chat server (/chat/stream, /chat, /health, /test)",
            "cli" => "Interactive command line interface",
            _ => "Unknown channel",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_need_api_key() {
        let mut config = Config::default();
        assert!(!ChannelRegistry::is_enabled("http", &config));

        config.openai_api_key = "sk-test".to_string();
        for name in ChannelRegistry::available() {
            assert!(ChannelRegistry::is_enabled(name, &config));
        }
        assert!(!ChannelRegistry::is_enabled("email", &config));
    }
}
