//! Find command: one application's versions and sources

use appcentral_core::{Aggregator, ApplicationId, CancellationToken, VersionMap};
use colored::Colorize;
use serde::Serialize;

use super::list::print_versions;
use super::{FailureView, Outcome, failure_views, warn_failures};
use crate::error::Result;

#[derive(Serialize)]
struct FindOutput<'a> {
    application: &'a str,
    complete: bool,
    versions: &'a VersionMap,
    failures: Vec<FailureView<'a>>,
}

/// Run the find command
pub async fn run_find(
    aggregator: &Aggregator,
    application: &str,
    refresh: bool,
    json: bool,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let id = ApplicationId::new(application);
    let found = aggregator
        .find_application_with_cancel(&id, refresh, cancel)
        .await?;

    if json {
        let output = FindOutput {
            application: id.as_str(),
            complete: found.is_complete(),
            versions: &found.value,
            failures: failure_views(&found.failures),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(found.status().into());
    }

    warn_failures(&found.failures);
    println!(
        "{} ({} versions)",
        id.as_str().green().bold(),
        found.value.len()
    );
    print_versions(&found.value);

    Ok(found.status().into())
}
