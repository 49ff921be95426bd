//! AppCentral CLI
//!
//! Command-line front end over the file store and the aggregator.

mod cli;
mod commands;
mod error;
mod logging;

use std::path::Path;

use appcentral_core::CancellationToken;
use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use commands::Outcome;
use error::{CliError, Result};

fn main() {
    match run() {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run() -> Result<Outcome> {
    let cli = Cli::parse();

    logging::init(cli.verbose)
        .map_err(|e| CliError::user(format!("failed to initialize logging: {e}")))?;
    tracing::debug!("Verbose mode enabled");

    let config_path = match cli.config {
        Some(path) => path,
        None => appcentral_store::default_config_path()?,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute_command(cli.command, &config_path))
}

async fn execute_command(cmd: Commands, config_path: &Path) -> Result<Outcome> {
    let open = || appcentral_store::open_aggregator(config_path);

    match cmd {
        Commands::List { refresh, json } => {
            let aggregator = open()?;
            commands::run_list(&aggregator, refresh, json, &cancel_on_ctrl_c()).await
        }
        Commands::Find {
            application,
            refresh,
            json,
        } => {
            let aggregator = open()?;
            commands::run_find(&aggregator, &application, refresh, json, &cancel_on_ctrl_c())
                .await
        }
        Commands::Update => {
            let aggregator = open()?;
            commands::run_update(&aggregator, &cancel_on_ctrl_c()).await
        }
        Commands::Servers => commands::run_servers(config_path),
    }
}

/// Token cancelled when the user presses Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupted, cancelling traversal");
            trigger.cancel();
        }
    });
    cancel
}
