//! City geocoder backed by a fixed coordinate table.
//!
//! Unknown cities resolve to San Francisco so the weather chain always has
//! coordinates to work with.

use async_trait::async_trait;
use clawflow_core::error::ToolError;
use clawflow_core::tool::Tool;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

const SAN_FRANCISCO: LatLon = LatLon {
    lat: 37.7749,
    lon: -122.4194,
};

const CITIES: &[(&str, LatLon)] = &[
    ("san francisco", SAN_FRANCISCO),
    ("new york", LatLon { lat: 40.7128, lon: -74.006 }),
    ("london", LatLon { lat: 51.5074, lon: -0.1278 }),
    ("tokyo", LatLon { lat: 35.6895, lon: 139.6917 }),
    ("beijing", LatLon { lat: 39.9042, lon: 116.4074 }),
    ("shanghai", LatLon { lat: 31.2304, lon: 121.4737 }),
];

/// Resolve an English city name (trimmed, case-insensitive).
pub fn lookup(city: &str) -> LatLon {
    let normalized = city.trim().to_lowercase();
    CITIES
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, coords)| *coords)
        .unwrap_or(SAN_FRANCISCO)
}

pub struct GetLatLonTool;

#[derive(Deserialize)]
struct Args {
    city: String,
}

#[async_trait]
impl Tool for GetLatLonTool {
    fn name(&self) -> &str {
        "get_lat_lon"
    }

    fn description(&self) -> &str {
        "Retrieves the latitude and longitude for a given city."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "The English name of the city"
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let coords = lookup(&args.city);
        tracing::debug!(city = %args.city, lat = coords.lat, lon = coords.lon, "Geocoded city");
        serde_json::to_value(coords).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "get_lat_lon".into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_city_is_normalized() {
        assert_eq!(lookup("  Beijing "), LatLon { lat: 39.9042, lon: 116.4074 });
        assert_eq!(lookup("NEW YORK").lon, -74.006);
    }

    #[test]
    fn unknown_city_falls_back_to_san_francisco() {
        assert_eq!(lookup("Atlantis"), SAN_FRANCISCO);
    }

    #[tokio::test]
    async fn tool_returns_lat_lon_object() {
        let out = GetLatLonTool
            .execute(serde_json::json!({"city": "Tokyo"}))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"lat": 35.6895, "lon": 139.6917}));
    }
}
