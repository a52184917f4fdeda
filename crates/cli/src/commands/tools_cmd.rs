//! `clawflow tools`: List and run the built-in tools without a model.

use clawflow_config::AppConfig;
use clawflow_core::tool::{ToolCall, ToolRegistry};

fn registry() -> Result<ToolRegistry, Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    Ok(clawflow_tools::default_registry_with_timeout(config.timeouts.tool())?)
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let registry = registry()?;
    println!("🔧 {} tool(s) registered\n", registry.len());
    for def in registry.definitions() {
        println!("  {}", def.name);
        println!("    {}", def.description);
        println!("    parameters: {}", def.parameters);
    }
    Ok(())
}

pub async fn run(name: &str, args: &str) -> Result<(), Box<dyn std::error::Error>> {
    let arguments: serde_json::Value =
        serde_json::from_str(args).map_err(|e| format!("Arguments must be JSON: {e}"))?;
    let registry = registry()?;

    let call = ToolCall::new("cli", name, arguments);
    tracing::debug!(tool = name, "Running tool from the command line");
    let result = registry.execute(&call).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.is_success() {
        Ok(())
    } else {
        Err(format!("Tool '{name}' failed").into())
    }
}
