//! ClawFlow CLI: inspect configuration and exercise the built-in tools.
//!
//! Commands:
//! - `config init`        Write the default config file
//! - `config show`        Print the effective configuration
//! - `config validate`    Load the config and build every pattern table
//! - `config path`        Print the config file location
//! - `tools list`         List the built-in tools and their schemas
//! - `tools run`          Execute one tool call through the registry

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "clawflow",
    about = "ClawFlow — agent orchestration patterns",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect and run the built-in tools
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default config to ~/.clawflow/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration and every pattern table it defines
    Validate,
    /// Print the config file path
    Path,
}

#[derive(Subcommand)]
enum ToolsAction {
    /// List registered tools
    List,
    /// Run a tool with JSON arguments
    Run {
        /// Tool name, e.g. `count_letter`
        name: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Tools { action } => match action {
            ToolsAction::List => commands::tools_cmd::list().await?,
            ToolsAction::Run { name, args } => commands::tools_cmd::run(&name, &args).await?,
        },
    }

    Ok(())
}
