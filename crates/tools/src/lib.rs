//! Built-in tool implementations for ClawFlow.
//!
//! All tools are deterministic and offline: a letter counter, a city
//! geocoder over a fixed table, and a coordinate-based weather mock. They
//! are enough to drive the tool-call loop end to end without a network.

pub mod count_letter;
pub mod geocode;
pub mod weather;

use clawflow_core::error::RegistryError;
use clawflow_core::tool::{Tool, ToolRegistry, ToolRegistryBuilder};
use std::time::Duration;

/// All built-in tools, in registration order.
pub fn builtin_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(count_letter::CountLetterTool),
        Box::new(geocode::GetLatLonTool),
        Box::new(weather::GetWeatherByLatLonTool),
    ]
}

fn builder() -> Result<ToolRegistryBuilder, RegistryError> {
    builtin_tools()
        .into_iter()
        .try_fold(ToolRegistry::builder(), |builder, tool| builder.register(tool))
}

/// Create a registry with all built-in tools and no execution timeout.
pub fn default_registry() -> Result<ToolRegistry, RegistryError> {
    Ok(builder()?.build())
}

/// Create a registry with all built-in tools, each execution bounded by
/// `timeout`.
pub fn default_registry_with_timeout(timeout: Duration) -> Result<ToolRegistry, RegistryError> {
    Ok(builder()?.with_timeout(timeout).build())
}
