//! Tool registry - descriptors offered to the model
//!
//! The host's listing supplies names and descriptions; parameter schemas come
//! from a JSON side-file keyed by tool name.

use std::collections::HashMap;
use std::path::Path;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{ToolDescriptor, ToolHost};

/// Schema used for tools the side-file does not describe
pub fn empty_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

/// Parameter schemas loaded from a side-file
#[derive(Debug, Clone, Default)]
pub struct SchemaLookup {
    schemas: HashMap<String, Value>,
}

impl SchemaLookup {
    /// Load schemas from `path`. Never fails: a missing, unreadable or
    /// malformed file yields an empty lookup.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Schema file {:?} not readable ({}), using empty schemas", path, e);
                return Self::default();
            }
        };

        match serde_json::from_str::<HashMap<String, Value>>(&content) {
            Ok(schemas) => {
                debug!("Loaded {} tool schemas from {:?}", schemas.len(), path);
                Self::from_map(schemas)
            }
            Err(e) => {
                warn!("Schema file {:?} is not a JSON object ({}), using empty schemas", path, e);
                Self::default()
            }
        }
    }

    pub fn from_map(schemas: HashMap<String, Value>) -> Self {
        Self { schemas }
    }

    /// Schema for `name`. Non-object and empty-object entries count as absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schemas
            .get(name)
            .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
    }
}

/// Ordered set of tool descriptors
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(tools: Vec<ToolDescriptor>) -> Self {
        Self { tools }
    }

    /// Build from a host listing plus side-file schemas. Never fails: if the
    /// listing fails the registry is empty.
    pub async fn build(host: &dyn ToolHost, schemas: &SchemaLookup) -> Self {
        let listed = match host.list_tools().await {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Listing tools failed, continuing without tools: {}", e);
                return Self::new();
            }
        };

        let tools = listed
            .into_iter()
            .map(|tool| {
                let description = tool
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| format!("MCP tool: {}", tool.name));
                let parameters = match schemas.get(&tool.name) {
                    Some(schema) => schema.clone(),
                    None => {
                        debug!("No schema for tool '{}', advertising no parameters", tool.name);
                        empty_parameters()
                    }
                };
                ToolDescriptor {
                    name: tool.name,
                    description,
                    parameters,
                }
            })
            .collect::<Vec<_>>();

        info!("Tool registry built with {} tools", tools.len());
        Self { tools }
    }

    /// Descriptor for a tool name
    pub fn describe(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// All descriptors, in host listing order
    pub fn all(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// List registered tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}
