//! List command: the whole aggregated index

use appcentral_core::{Aggregator, ApplicationIndex, CancellationToken, VersionMap};
use colored::Colorize;
use serde::Serialize;

use super::{FailureView, Outcome, failure_views, warn_failures};
use crate::error::Result;

#[derive(Serialize)]
struct ListOutput<'a> {
    complete: bool,
    servers_visited: usize,
    applications: &'a ApplicationIndex,
    failures: Vec<FailureView<'a>>,
}

/// Run the list command
pub async fn run_list(
    aggregator: &Aggregator,
    refresh: bool,
    json: bool,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let built = aggregator
        .get_available_applications_with_cancel(refresh, cancel)
        .await?;

    if json {
        let output = ListOutput {
            complete: built.is_complete(),
            servers_visited: built.servers_visited,
            applications: &built.value,
            failures: failure_views(&built.failures),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(built.status().into());
    }

    warn_failures(&built.failures);

    if built.value.is_empty() {
        println!("{}", "No applications found.".dimmed());
    } else {
        println!("{}", "Available Applications".bold());
        println!();
        for (application, versions) in &built.value {
            println!("{}", application.as_str().green().bold());
            print_versions(versions);
        }
        println!();
    }

    println!(
        "{} {} applications, {} versions, {} sources from {} servers.",
        "Total:".dimmed(),
        built.value.len(),
        built.value.version_count(),
        built.value.provenance_count(),
        built.servers_visited,
    );

    Ok(built.status().into())
}

/// Print `version  server/repository, ...` lines for one application.
pub(crate) fn print_versions(versions: &VersionMap) {
    for (version, records) in versions {
        let sources: Vec<String> = records.iter().map(ToString::to_string).collect();
        println!(
            "  {} {}",
            format!("{:<14}", version.as_str()).cyan(),
            sources.join(", ").dimmed()
        );
    }
}
