//! Odin CLI - Command-line interface
//!
//! Runs the media server and exposes the subtitle and torrent helpers
//! directly.

mod commands;

use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use odin_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "odin")]
#[command(about = "Stream torrents and local media to the browser while they download")]
struct Cli {
    /// Console log level
    #[arg(long, global = true, default_value_t = CliLogLevel::default())]
    log_level: CliLogLevel,

    /// Path to the TOML config file (defaults to ./config.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = odin_core::OdinConfig::load(cli.config.as_deref())?;
    init_tracing(cli.log_level.as_tracing_level(), Some(config.logs_dir.as_path()))
        .map_err(|e| anyhow!("Failed to initialize tracing: {e}"))?;

    commands::handle_command(cli.command, config).await
}
