//! Progress notifications for [`Aggregator::update_applications_list`].
//!
//! [`Aggregator::update_applications_list`]: crate::Aggregator::update_applications_list

use crate::aggregator::{AggregationStatus, ServerFailure};
use crate::types::{RepositoryId, RepositoryMetadata, ServerId};

/// A repository is about to be refreshed.
#[derive(Debug, Clone, Copy)]
pub struct RepositoryEntered<'a> {
    pub server: &'a ServerId,
    /// Account (owner) name of the server.
    pub account: &'a str,
    pub repository: &'a RepositoryId,
    pub metadata: &'a RepositoryMetadata,
}

/// A repository's applications and versions have all been walked, or the
/// walk stopped with an error.
#[derive(Debug, Clone, Copy)]
pub struct RepositoryCompleted<'a> {
    pub server: &'a ServerId,
    pub repository: &'a RepositoryId,
    pub success: bool,
}

type EnteredHandler<'a> = Box<dyn FnMut(&RepositoryEntered<'_>) + Send + 'a>;
type CompletedHandler<'a> = Box<dyn FnMut(&RepositoryCompleted<'_>) + Send + 'a>;

/// Optional handlers invoked while refreshing.
///
/// Handlers run synchronously on the traversal, one at a time, in traversal
/// order. A missing handler means that notification is not emitted.
///
/// ```
/// use appcentral_core::ProgressHandlers;
///
/// let mut entered = 0;
/// let handlers = ProgressHandlers::new().on_entered(|event| {
///     entered += 1;
///     println!("{} / {}", event.server, event.repository);
/// });
/// # drop(handlers);
/// ```
#[derive(Default)]
pub struct ProgressHandlers<'a> {
    entered: Option<EnteredHandler<'a>>,
    completed: Option<CompletedHandler<'a>>,
}

impl<'a> ProgressHandlers<'a> {
    /// Handlers that emit nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handler fired when a repository is entered.
    pub fn on_entered(mut self, handler: impl FnMut(&RepositoryEntered<'_>) + Send + 'a) -> Self {
        self.entered = Some(Box::new(handler));
        self
    }

    /// Set the handler fired when a repository is completed.
    pub fn on_completed(
        mut self,
        handler: impl FnMut(&RepositoryCompleted<'_>) + Send + 'a,
    ) -> Self {
        self.completed = Some(Box::new(handler));
        self
    }

    pub(crate) fn wants_entered(&self) -> bool {
        self.entered.is_some()
    }

    pub(crate) fn entered(&mut self, event: &RepositoryEntered<'_>) {
        if let Some(handler) = self.entered.as_mut() {
            handler(event);
        }
    }

    pub(crate) fn completed(&mut self, event: &RepositoryCompleted<'_>) {
        if let Some(handler) = self.completed.as_mut() {
            handler(event);
        }
    }
}

impl std::fmt::Debug for ProgressHandlers<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressHandlers")
            .field("entered", &self.entered.is_some())
            .field("completed", &self.completed.is_some())
            .finish()
    }
}

/// Summary of a refresh run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub servers_visited: usize,
    /// Repositories whose walk completed successfully.
    pub repositories_refreshed: usize,
    pub applications_seen: usize,
    pub versions_seen: usize,
    pub failures: Vec<ServerFailure>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn status(&self) -> AggregationStatus {
        AggregationStatus::from_counts(self.servers_visited, self.failures.len())
    }
}
