use tether_core::{ContentBlock, ToolSpec};

use super::{HandlerError, HandlerFuture, ToolHandler};

pub const TOOL_NAME: &str = "get_activity_recommendation";

/// Suggests something to do given a weather condition and temperature.
pub struct ActivityAdvisor;

impl ActivityAdvisor {
    pub fn recommend(condition: &str, temp_celsius: f64) -> &'static str {
        let condition = condition.to_lowercase();
        if condition.contains("rain") || condition.contains("storm") {
            "It is raining! I recommend visiting the Visvesvaraya Museum or a cozy indoor cafe."
        } else if temp_celsius > 30.0 {
            "It is quite hot. Stay hydrated and perhaps visit an air-conditioned mall like Phoenix Marketcity."
        } else if temp_celsius < 15.0 {
            "Brrr! It's chilly. A good day for hot coffee in Indiranagar."
        } else {
            "The weather is lovely! Perfect for a walk in Cubbon Park or a visit to Lalbagh Botanical Garden."
        }
    }
}

impl ToolHandler for ActivityAdvisor {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_NAME.into(),
            description: "Suggest activities based on specific weather condition and temperature."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "condition": {
                        "type": "string",
                        "description": "The weather condition (e.g., Sunny, Rain, Cloudy)"
                    },
                    "temp": {
                        "type": "number",
                        "description": "The temperature in Celsius"
                    }
                },
                "required": ["condition", "temp"]
            }),
        }
    }

    fn call<'a>(&'a self, arguments: &'a serde_json::Value) -> HandlerFuture<'a> {
        Box::pin(async move {
            let condition = arguments
                .get("condition")
                .ok_or(HandlerError::MissingArgument("condition"))?
                .as_str()
                .ok_or_else(|| HandlerError::InvalidArgument {
                    name: "condition",
                    reason: "expected a string".into(),
                })?;

            let temp = arguments
                .get("temp")
                .ok_or(HandlerError::MissingArgument("temp"))?;
            // Models occasionally quote numbers.
            let temp = temp
                .as_f64()
                .or_else(|| temp.as_str().and_then(|s| s.trim().parse().ok()))
                .ok_or_else(|| HandlerError::InvalidArgument {
                    name: "temp",
                    reason: format!("expected a number, got {temp}"),
                })?;

            let recommendation = Self::recommend(condition, temp);
            Ok(vec![ContentBlock::text(format!(
                "Activity Recommendation: {recommendation}"
            ))])
        })
    }
}
