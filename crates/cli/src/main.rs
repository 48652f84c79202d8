// crates/cli/src/main.rs
//! `text2sql` binary.
//!
//! One-shot subcommands run against a freshly activated [`Orchestrator`];
//! `shell` drives the orchestrator's event loop from stdin.

mod commands;
mod format;
mod shell;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use text2sql_core::{create_backend, ClientConfig};
use text2sql_observability::{default_log_dir, init_tracing, LogConfig};

use crate::commands::Command;

/// Ask questions of your data in plain English.
#[derive(Parser, Debug)]
#[command(name = "text2sql", version, about, long_about = None)]
struct Cli {
    /// Backend base URL (overrides the config file and TEXT2SQL_URL)
    #[arg(short = 'u', long, global = true)]
    url: Option<String>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log JSON lines to stderr
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also log to a daily file under the local data directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut log = LogConfig::from_env();
    log.json |= cli.json_logs;
    if cli.log_file && log.file_dir.is_none() {
        log.file_dir = default_log_dir();
    }
    let _guard = init_tracing(&log)?;

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.base_url = url;
    }
    tracing::debug!(base_url = %config.base_url, "Configuration loaded");

    let backend = create_backend(&config)?;

    if matches!(cli.command, Command::Shell) {
        shell::run(backend, &config).await?;
        return Ok(ExitCode::SUCCESS);
    }

    Ok(commands::execute(backend, &config, cli.command).await)
}
