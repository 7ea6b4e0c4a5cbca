//! Arithmetic tools - `add` and `multiply`

use async_trait::async_trait;
use serde_json::{json, Value};
use crate::Result;
use crate::error::Error;
use super::Tool;

fn integer_pair_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": {"type": "integer", "description": "First number"},
            "b": {"type": "integer", "description": "Second number"}
        },
        "required": ["a", "b"]
    })
}

fn integer_param(params: &Value, name: &str) -> Result<i64> {
    params
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::Tool(format!("Missing or non-integer '{}' parameter", name)))
}

/// Add two integers
pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str { "add" }
    fn description(&self) -> &str { "Add two integers" }
    fn parameters(&self) -> Value { integer_pair_schema() }

    async fn execute(&self, params: Value) -> Result<String> {
        let a = integer_param(&params, "a")?;
        let b = integer_param(&params, "b")?;
        a.checked_add(b)
            .map(|sum| sum.to_string())
            .ok_or_else(|| Error::Tool(format!("{} + {} overflows", a, b)))
    }
}

/// Multiply two integers
pub struct MultiplyTool;

#[async_trait]
impl Tool for MultiplyTool {
    fn name(&self) -> &str { "multiply" }
    fn description(&self) -> &str { "Multiply two integers" }
    fn parameters(&self) -> Value { integer_pair_schema() }

    async fn execute(&self, params: Value) -> Result<String> {
        let a = integer_param(&params, "a")?;
        let b = integer_param(&params, "b")?;
        a.checked_mul(b)
            .map(|product| product.to_string())
            .ok_or_else(|| Error::Tool(format!("{} * {} overflows", a, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add() {
        assert_eq!(AddTool.execute(json!({"a": 25, "b": 17})).await.unwrap(), "42");
        assert_eq!(AddTool.execute(json!({"a": -5, "b": 15})).await.unwrap(), "10");
    }

    #[tokio::test]
    async fn test_multiply() {
        assert_eq!(MultiplyTool.execute(json!({"a": 6, "b": 7})).await.unwrap(), "42");
    }

    #[tokio::test]
    async fn test_missing_param() {
        assert!(AddTool.execute(json!({"a": 1})).await.is_err());
        assert!(MultiplyTool.execute(json!({"a": 1, "b": "2"})).await.is_err());
    }
}
