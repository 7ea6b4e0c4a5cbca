//! Error types for mcpchat

use thiserror::Error;

/// Result type alias for mcpchat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mcpchat
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short name of the error category, used in user-facing apologies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::Llm(_) => "LlmError",
            Error::Tool(_) => "ToolError",
            Error::Mcp(_) => "McpError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
            Error::Http(_) => "HttpError",
            Error::Other(_) => "Error",
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
