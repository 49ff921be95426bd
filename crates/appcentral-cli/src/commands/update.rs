//! Update command: refresh every server with per-repository progress

use appcentral_core::{Aggregator, CancellationToken, ProgressHandlers};
use colored::Colorize;

use super::{Outcome, warn_failures};
use crate::error::Result;

/// Run the update command
pub async fn run_update(aggregator: &Aggregator, cancel: &CancellationToken) -> Result<Outcome> {
    let handlers = ProgressHandlers::new()
        .on_entered(|event| {
            println!(
                "{} {}/{} ({})",
                "=>".blue().bold(),
                event.server,
                event.repository,
                event.account
            );
        })
        .on_completed(|event| {
            let mark = if event.success {
                "OK".green().bold()
            } else {
                "FAILED".red().bold()
            };
            println!("   {} {}/{}", mark, event.server, event.repository);
        });

    let report = aggregator
        .update_applications_list_with_cancel(handlers, cancel)
        .await?;

    warn_failures(&report.failures);
    println!();
    println!(
        "{} {} repositories refreshed on {} servers ({} applications, {} versions).",
        "Updated:".dimmed(),
        report.repositories_refreshed,
        report.servers_visited,
        report.applications_seen,
        report.versions_seen,
    );

    Ok(report.status().into())
}
