//! Tools module - what the model can call
//!
//! Two sides live here:
//! - the client side: [`ToolRegistry`] and [`ToolExecutor`], which talk to a
//!   remote tool host through the [`ToolHost`] trait;
//! - the host side: the [`Tool`] trait and the concrete tools the MCP tool
//!   host serves (`weather`, `add`, `multiply`).

mod city_codes;
mod executor;
mod math;
mod registry;
mod weather;

pub use city_codes::CityCodes;
pub use executor::{ToolExecutor, ToolOutcome};
pub use math::{AddTool, MultiplyTool};
pub use registry::{empty_parameters, SchemaLookup, ToolRegistry};
pub use weather::WeatherTool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use crate::Result;

/// Tool definition as presented to the chat completion API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    /// Function-calling schema entry for the `tools` array.
    pub fn to_function_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters
            }
        })
    }
}

/// A tool as announced by the host's listing. Carries no parameter schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTool {
    pub name: String,
    pub description: Option<String>,
}

/// Reply of a remote tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolReply {
    /// Primary text payload (first text content item), if any
    pub text: Option<String>,

    /// The host ran the call but the tool itself reported failure
    pub is_error: bool,
}

/// Remote tool host - the only operations the core needs from it.
///
/// Connecting and initializing happen before a value of this type exists.
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// List the tools the host exposes
    async fn list_tools(&self) -> Result<Vec<RemoteTool>>;

    /// Invoke a tool by name
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolReply>;
}

/// Tool trait - interface for tools served by the tool host
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name used in function calls
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON Schema for parameters
    fn parameters(&self) -> Value;

    /// Execute the tool with given parameters
    async fn execute(&self, params: Value) -> Result<String>;

    /// Convert to tool descriptor
    fn to_descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Dummy tool for testing
#[cfg(test)]
pub struct DummyTool {
    pub name: String,
    pub result: String,
}

#[cfg(test)]
#[async_trait]
impl Tool for DummyTool {
    fn name(&self) -> &str { &self.name }
    fn description(&self) -> &str { "Dummy tool for testing" }
    fn parameters(&self) -> Value { json!({"type": "object"}) }

    async fn execute(&self, _params: Value) -> Result<String> {
        Ok(self.result.clone())
    }
}

/// Scripted tool host for testing.
///
/// Records every call and answers from a fixed table; unknown tools fail.
#[cfg(test)]
pub struct FakeToolHost {
    pub tools: Vec<RemoteTool>,
    pub replies: std::collections::HashMap<String, Result<ToolReply>>,
    pub calls: std::sync::Mutex<Vec<(String, Value)>>,
}

#[cfg(test)]
impl FakeToolHost {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            replies: std::collections::HashMap::new(),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Add a tool answering with `text`
    pub fn with_tool(mut self, name: &str, description: &str, text: &str) -> Self {
        self.tools.push(RemoteTool {
            name: name.to_string(),
            description: Some(description.to_string()),
        });
        self.replies.insert(
            name.to_string(),
            Ok(ToolReply { text: Some(text.to_string()), is_error: false }),
        );
        self
    }

    /// Add a tool whose invocation raises
    pub fn with_failing_tool(mut self, name: &str, error: &str) -> Self {
        self.tools.push(RemoteTool {
            name: name.to_string(),
            description: None,
        });
        self.replies.insert(name.to_string(), Err(crate::Error::Mcp(error.to_string())));
        self
    }

    pub fn recorded_calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ToolHost for FakeToolHost {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolReply> {
        self.calls.lock().unwrap().push((name.to_string(), arguments));
        match self.replies.get(name) {
            Some(Ok(reply)) => Ok(reply.clone()),
            Some(Err(e)) => Err(crate::Error::Mcp(e.to_string())),
            None => Err(crate::Error::Mcp(format!("Unknown tool: {}", name))),
        }
    }
}
