//! `clawflow config`: Configuration management commands.

use clawflow_agent::{QualityRubric, RoutingTable, WorkerInstructions};
use clawflow_config::AppConfig;
use std::path::{Path, PathBuf};

fn config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if write_default(&path, force)? {
        println!("✅ Created config.toml at: {}", path.display());
    } else {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or re-run with --force.");
    }
    Ok(())
}

/// Write the default config to `path`. Returns `false` if a file was
/// already there and `force` is off.
fn write_default(path: &Path, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    match summarize(&config) {
        Ok(lines) => {
            println!("   ✅ All pattern tables are complete");
            println!();
            for line in lines {
                println!("   {line}");
            }
            Ok(())
        }
        Err(e) => {
            println!("   ❌ {e}");
            Err(e.into())
        }
    }
}

/// Build every table the patterns need from `config`, so a gap surfaces
/// here instead of on first use.
fn summarize(config: &AppConfig) -> Result<Vec<String>, clawflow_core::Error> {
    let routing = RoutingTable::from_config(&config.router)?;
    WorkerInstructions::from_config(&config.orchestrator)?;
    let rubric = QualityRubric::from_config(&config.quality_gate)?;

    Ok(vec![
        format!("Max steps:    {}", config.tool_loop.max_steps),
        format!("Concurrency:  {}", config.concurrency.max_concurrency),
        format!(
            "Timeouts:     model {}s, tool {}s",
            config.timeouts.model_secs, config.timeouts.tool_secs
        ),
        format!("Criteria:     {}", rubric.criteria().len()),
        format!(
            "Tiers:        simple → {}, complex → {}",
            routing.tiers.simple, routing.tiers.complex
        ),
        format!(
            "Planner:      {} (workers on {})",
            config.orchestrator.planner_tier, config.orchestrator.worker_tier
        ),
    ])
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path().display());
    Ok(())
}
