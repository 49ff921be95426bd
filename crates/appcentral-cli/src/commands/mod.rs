//! Command implementations for appcentral-cli

pub mod find;
pub mod list;
pub mod servers;
pub mod update;

pub use find::run_find;
pub use list::run_list;
pub use servers::run_servers;
pub use update::run_update;

use appcentral_core::{AggregationStatus, ServerFailure};
use colored::Colorize;
use serde::Serialize;

/// How completely a command could do its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    /// Some servers failed; output covers the rest
    Partial,
    /// Every server failed
    Failed,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Complete => 0,
            Outcome::Failed => 1,
            Outcome::Partial => 2,
        }
    }
}

impl From<AggregationStatus> for Outcome {
    fn from(status: AggregationStatus) -> Self {
        match status {
            AggregationStatus::Complete => Outcome::Complete,
            AggregationStatus::Partial { .. } => Outcome::Partial,
            AggregationStatus::Failed { .. } => Outcome::Failed,
        }
    }
}

/// Serializable view of a [`ServerFailure`].
#[derive(Debug, Serialize)]
pub(crate) struct FailureView<'a> {
    server: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    repository: Option<&'a str>,
    cause: &'a str,
}

impl<'a> From<&'a ServerFailure> for FailureView<'a> {
    fn from(failure: &'a ServerFailure) -> Self {
        Self {
            server: failure.server.as_str(),
            repository: failure.repository.as_ref().map(|r| r.as_str()),
            cause: &failure.cause,
        }
    }
}

pub(crate) fn failure_views(failures: &[ServerFailure]) -> Vec<FailureView<'_>> {
    failures.iter().map(FailureView::from).collect()
}

/// Print one warning line per failed server to stderr.
pub(crate) fn warn_failures(failures: &[ServerFailure]) {
    for failure in failures {
        eprintln!("{} skipped {}", "warning:".yellow().bold(), failure);
    }
}
