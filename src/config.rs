//! Configuration management
//!
//! Settings come from an optional JSON file, then `.env`, then the process
//! environment. Later sources win.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::Result;
use crate::error::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API key for the chat completion endpoint
    #[serde(default)]
    pub openai_api_key: String,

    /// Base URL of the OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Streamable-HTTP endpoint of the MCP tool host. `None` runs without tools.
    #[serde(default)]
    pub mcp_server_url: Option<String>,

    /// JSON side-file mapping tool name to its parameter schema
    #[serde(default = "default_schemas_path")]
    pub schemas_path: PathBuf,

    /// Persona text for the system message
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Token caps for the two model calls
    #[serde(default)]
    pub budget: TokenBudget,

    /// Chat server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Tool host (weather) settings
    #[serde(default)]
    pub tool_host: ToolHostConfig,
}

/// Token caps for the tool-selection call and the follow-up synthesis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    #[serde(default = "default_first_call_tokens")]
    pub first_call: u32,

    #[serde(default = "default_follow_up_tokens")]
    pub follow_up: u32,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            first_call: default_first_call_tokens(),
            follow_up: default_follow_up_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_server_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolHostConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_tool_host_port")]
    pub port: u16,

    /// AMap web service key used by the weather tool
    #[serde(default)]
    pub amap_key: String,

    /// Optional JSON file mapping city names to adcodes
    #[serde(default)]
    pub adcode_table: Option<PathBuf>,
}

impl Default for ToolHostConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_tool_host_port(),
            amap_key: String::new(),
            adcode_table: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_schemas_path() -> PathBuf {
    PathBuf::from("schemas.json")
}

fn default_persona() -> String {
    "You are an intelligent assistant that can answer all kinds of questions.".to_string()
}

fn default_first_call_tokens() -> u32 {
    500
}

fn default_follow_up_tokens() -> u32 {
    300
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8002
}

fn default_tool_host_port() -> u16 {
    8001
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            model: default_model(),
            mcp_server_url: None,
            schemas_path: default_schemas_path(),
            persona: default_persona(),
            budget: TokenBudget::default(),
            server: ServerConfig::default(),
            tool_host: ToolHostConfig::default(),
        }
    }
}

impl Config {
    /// Whether an API key is available for the chat completion endpoint.
    pub fn has_api_key(&self) -> bool {
        !self.openai_api_key.trim().is_empty()
    }

    /// Apply environment-style overrides. `lookup` returns the value of a variable.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai_api_key = key;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.openai_base_url = url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.model = model;
        }
        if let Some(url) = get("MCP_SERVER_URL") {
            self.mcp_server_url = Some(url);
        }
        if let Some(path) = get("MCP_SCHEMAS_PATH") {
            self.schemas_path = PathBuf::from(path);
        }
        if let Some(key) = get("AMAP_KEY").or_else(|| get("KEY")) {
            self.tool_host.amap_key = key;
        }
    }

    /// Check that configured URLs parse.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.openai_base_url).map_err(|e| {
            Error::Config(format!("Invalid OPENAI_BASE_URL '{}': {}", self.openai_base_url, e))
        })?;

        if let Some(ref mcp) = self.mcp_server_url {
            url::Url::parse(mcp)
                .map_err(|e| Error::Config(format!("Invalid MCP_SERVER_URL '{}': {}", mcp, e)))?;
        }

        Ok(())
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcpchat")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one, `~/.mcpchat/config.json` is
/// read when present and defaults are used otherwise.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!("Config not found at {:?}", path)));
            }
            read_file(path)?
        }
        None => {
            let path = config_path();
            if path.exists() {
                read_file(&path)?
            } else {
                debug!("No config file at {:?}, using defaults", path);
                Config::default()
            }
        }
    };

    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {:?}", path);
    }
    config.apply_overrides(|name| std::env::var(name).ok());
    config.validate()?;

    Ok(config)
}

fn read_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
