//! get_weather：转发自然语言天气问题给天气服务

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::WeatherSection;
use crate::tools::http::{http_client, post_json, to_pretty};
use crate::tools::{ParamType, SpecError, Tool, ToolArgs, ToolSpec};

pub struct WeatherTool {
    http: Client,
    endpoint: String,
}

impl WeatherTool {
    pub fn new(section: &WeatherSection) -> Self {
        Self {
            http: http_client(section.timeout_secs),
            endpoint: section.endpoint.clone(),
        }
    }
}

fn weather_result(data: &Value) -> Value {
    json!({
        "weather": data
            .get("response")
            .and_then(|v| v.as_str())
            .unwrap_or("No weather information available"),
        "sentiment": data.get("sentiment").and_then(|v| v.as_f64()).unwrap_or(0.0),
    })
}

#[async_trait]
impl Tool for WeatherTool {
    fn spec(&self) -> Result<ToolSpec, SpecError> {
        ToolSpec::builder("get_weather")
            .description(
                "Get weather information for a location or a weather question, e.g. \
                 \"Will it rain in Dhaka tomorrow?\".",
            )
            .required("query", ParamType::String, "Weather question in natural language")
            .build()
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let query = args.require_str("query")?;
        let data = post_json(&self.http, &self.endpoint, &[], &json!({ "query": query })).await?;
        Ok(to_pretty(&weather_result(&data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_result_shape() {
        let out = weather_result(&json!({"response": "Sunny, 24C", "sentiment": 0.8}));
        assert_eq!(out["weather"], "Sunny, 24C");
        assert_eq!(out["sentiment"], 0.8);

        let empty = weather_result(&json!({}));
        assert_eq!(empty["weather"], "No weather information available");
    }

    #[test]
    fn test_spec() {
        let spec = WeatherTool::new(&WeatherSection::default()).spec().unwrap();
        assert_eq!(spec.name, "get_weather");
        assert!(spec.param("query").unwrap().required);
    }
}
