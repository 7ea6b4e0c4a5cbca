//! MCP (Model Context Protocol) over streamable HTTP.
//!
//! - [`McpClient`] connects to a tool host and implements
//!   [`ToolHost`](crate::tools::ToolHost) for the registry and executor.
//! - [`McpServer`] is the tool host itself, serving [`Tool`](crate::tools::Tool)s.

mod client;
pub mod protocol;
mod server;

pub use client::McpClient;
pub use server::McpServer;
