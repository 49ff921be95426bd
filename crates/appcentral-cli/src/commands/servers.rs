//! Servers command: the configured registry

use std::path::Path;

use appcentral_store::load_config;
use colored::Colorize;

use super::Outcome;
use crate::error::Result;

/// Run the servers command
pub fn run_servers(config_path: &Path) -> Result<Outcome> {
    let config = load_config(config_path)?;

    if config.servers.is_empty() {
        println!(
            "No servers configured in {}.",
            config_path.display().to_string().cyan()
        );
        return Ok(Outcome::Complete);
    }

    println!("{}", "Configured Servers".bold());
    println!();
    for server in &config.servers {
        let account = server.account.as_deref().unwrap_or("-");
        println!(
            "  {} {} ({})",
            format!("{:<16}", server.id.as_str()).green(),
            account,
            config.catalog_path(server).display().to_string().dimmed()
        );
    }
    println!();
    println!("{} {} servers.", "Total:".dimmed(), config.servers.len());

    Ok(Outcome::Complete)
}
