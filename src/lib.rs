//! mcpchat - tool-augmented chat over MCP
//!
//! This library provides a two-phase tool-calling agent loop on top of an
//! OpenAI-compatible chat API, an MCP client and tool host, and the HTTP
//! and terminal front-ends that drive them.

pub mod agent;
pub mod tools;
pub mod mcp;
pub mod adapters;
pub mod config;
pub mod error;
pub mod ui;

pub use error::{Error, Result};
