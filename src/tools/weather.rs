//! Weather tool - live conditions and forecasts from the AMap weather API

use std::time::Duration;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};
use crate::Result;
use crate::error::Error;
use super::{CityCodes, Tool};

const AMAP_WEATHER_URL: &str = "https://restapi.amap.com/v3/weather/weatherInfo";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Weather lookup by city
pub struct WeatherTool {
    api_key: String,
    endpoint: String,
    cities: CityCodes,
    client: reqwest::Client,
}

impl WeatherTool {
    pub fn new(api_key: &str, cities: CityCodes) -> Result<Self> {
        Self::with_endpoint(api_key, cities, AMAP_WEATHER_URL)
    }

    /// Point the tool at a different weather endpoint
    pub fn with_endpoint(api_key: &str, cities: CityCodes, endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Tool(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
            cities,
            client,
        })
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str { "weather" }

    fn description(&self) -> &str {
        "Get weather information for a city (live conditions, or a forecast with extensions=all)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name (e.g. 深圳市) or six-digit adcode"
                },
                "extensions": {
                    "type": "string",
                    "enum": ["base", "all"],
                    "description": "base for live weather, all for forecast (default base)"
                },
                "output": {
                    "type": "string",
                    "enum": ["JSON", "XML"],
                    "description": "Response format (default JSON)"
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let city = params.get("city")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("Missing 'city' parameter".to_string()))?;

        let extensions = params.get("extensions")
            .and_then(|v| v.as_str())
            .unwrap_or("base");
        if !matches!(extensions, "base" | "all") {
            return Err(Error::Tool(format!("Invalid extensions '{}', expected base or all", extensions)));
        }

        let output = params.get("output")
            .and_then(|v| v.as_str())
            .unwrap_or("JSON")
            .to_ascii_uppercase();
        if !matches!(output.as_str(), "JSON" | "XML") {
            return Err(Error::Tool(format!("Invalid output '{}', expected JSON or XML", output)));
        }

        let code = self.cities.resolve(city);
        info!("Fetching weather for {} ({})", city, code);

        let response = self.client.get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("city", code.as_str()),
                ("extensions", extensions),
                ("output", output.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Weather request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("Weather API HTTP error: {}", status)));
        }

        let body = response.text().await
            .map_err(|e| Error::Tool(format!("Failed to read weather response: {}", e)))?;

        if output == "XML" {
            return Ok(body);
        }

        let api_response: Value = serde_json::from_str(&body)?;
        debug!("Weather API response: {}", api_response);

        if api_response.get("status").and_then(|s| s.as_str()) != Some("1") {
            let info = api_response.get("info")
                .and_then(|i| i.as_str())
                .unwrap_or("unknown error");
            return Err(Error::Tool(format!("Weather API error: {}", info)));
        }

        let field = if extensions == "all" { "forecasts" } else { "lives" };
        let data = api_response.get(field).cloned().unwrap_or(Value::Null);
        Ok(serde_json::to_string(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn fake_amap(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        if q.get("key").map(String::as_str) != Some("good-key") {
            return Json(json!({"status": "0", "info": "INVALID_USER_KEY"}));
        }
        Json(json!({
            "status": "1",
            "lives": [{"adcode": q.get("city"), "weather": "晴", "temperature": "30"}],
            "forecasts": [{"adcode": q.get("city"), "casts": []}]
        }))
    }

    async fn spawn_fake_amap() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/weather", get(fake_amap));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/weather", addr)
    }

    #[tokio::test]
    async fn test_live_weather() {
        let endpoint = spawn_fake_amap().await;
        let tool = WeatherTool::with_endpoint("good-key", CityCodes::builtin(), &endpoint).unwrap();

        let result = tool.execute(json!({"city": "北京市"})).await.unwrap();
        let lives: Value = serde_json::from_str(&result).unwrap();

        assert_eq!(lives[0]["adcode"], "110000");
        assert_eq!(lives[0]["weather"], "晴");
    }

    #[tokio::test]
    async fn test_forecast() {
        let endpoint = spawn_fake_amap().await;
        let tool = WeatherTool::with_endpoint("good-key", CityCodes::builtin(), &endpoint).unwrap();

        let result = tool.execute(json!({"city": "440300", "extensions": "all"})).await.unwrap();
        let forecasts: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(forecasts[0]["adcode"], "440300");
    }

    #[tokio::test]
    async fn test_api_error() {
        let endpoint = spawn_fake_amap().await;
        let tool = WeatherTool::with_endpoint("bad-key", CityCodes::builtin(), &endpoint).unwrap();

        let err = tool.execute(json!({"city": "北京市"})).await.unwrap_err();
        assert!(err.to_string().contains("INVALID_USER_KEY"));
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let tool = WeatherTool::new("k", CityCodes::builtin()).unwrap();
        assert!(tool.execute(json!({})).await.is_err());
        assert!(tool.execute(json!({"city": "北京市", "extensions": "hourly"})).await.is_err());
    }
}
