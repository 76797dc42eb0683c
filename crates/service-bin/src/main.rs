use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

mod commands;
mod heartbeat;
mod systems;

#[derive(Parser, Debug)]
#[command(name = "servicectl")]
#[command(about = "Install and control a program as a native OS service")]
#[command(version)]
struct Cli {
    /// Path to a JSON service config
    #[arg(long, env = "SERVICECTL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Service name (unit name, launchd label, SCM key)
    #[arg(long, global = true)]
    name: Option<String>,

    #[arg(long, global = true)]
    display_name: Option<String>,

    #[arg(long, global = true)]
    description: Option<String>,

    /// Manage a per-user service instead of a system one
    #[arg(long, global = true)]
    user: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SERVICECTL_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Register the service with the host's service manager
    Install,
    /// Stop the service and remove its registration
    Uninstall,
    Start,
    Stop,
    Restart,
    /// Print whether the service is running
    Status,
    /// Run the heartbeat workload in the foreground (what the manager launches)
    Run,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        "servicectl v{} (os={}, arch={})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    );

    let overrides = commands::Overrides {
        name: cli.name,
        display_name: cli.display_name,
        description: cli.description,
        user: cli.user,
    };
    let config = commands::load_config(cli.config.as_deref(), overrides)?;
    commands::dispatch(cli.command, config)
}
