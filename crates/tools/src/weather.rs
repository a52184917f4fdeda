//! Coordinate weather tool: deterministic mock conditions.
//!
//! Temperature is banded by latitude and the condition by longitude, so the
//! geocode → weather chain can be exercised end-to-end without a network.

use async_trait::async_trait;
use clawflow_core::error::ToolError;
use clawflow_core::tool::Tool;
use serde::Serialize;

use crate::geocode::LatLon;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weather {
    pub temperature: i32,
    pub condition: &'static str,
}

/// Mock weather for a coordinate pair.
pub fn weather_at(coords: LatLon) -> Weather {
    let temperature = if coords.lat > 40.0 {
        15
    } else if coords.lat < 20.0 {
        28
    } else {
        20
    };

    let condition = if coords.lon > 0.0 && coords.lon < 120.0 {
        "Cloudy"
    } else if coords.lon < -40.0 {
        "Overcast"
    } else {
        "Sunny"
    };

    Weather {
        temperature,
        condition,
    }
}

pub struct GetWeatherByLatLonTool;

#[async_trait]
impl Tool for GetWeatherByLatLonTool {
    fn name(&self) -> &str {
        "get_weather_by_lat_lon"
    }

    fn description(&self) -> &str {
        "Retrieves the weather information for the given latitude and longitude coordinates."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "lat": { "type": "number", "description": "The latitude" },
                "lon": { "type": "number", "description": "The longitude" }
            },
            "required": ["lat", "lon"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let coords: LatLon = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let weather = weather_at(coords);
        serde_json::to_value(&weather).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "get_weather_by_lat_lon".into(),
            reason: e.to_string(),
        })
    }
}
