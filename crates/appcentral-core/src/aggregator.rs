//! Aggregation of every registered server into one application index.
//!
//! The traversal is server, then repository, then application, then
//! version. Each server is folded into its own partial index; partial
//! indices are merged in registry order once every server has been visited,
//! so the result does not depend on how many servers were walked at once.
//!
//! # Failure policy
//!
//! A server that fails partway through keeps the records it reported before
//! the failure, skips the rest of its walk and is reported as a
//! [`ServerFailure`]; the remaining servers are still walked. Registry
//! failures and cancellation abort the whole operation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ClientFactory, RemoteServerClient, ServerRegistry};
use crate::dependency::{DependencyResolver, Requirement, Resolution};
use crate::error::{Error, Result};
use crate::index::{ApplicationIndex, VersionMap};
use crate::progress::{ProgressHandlers, RefreshReport, RepositoryCompleted, RepositoryEntered};
use crate::types::{
    ApplicationId, ApplicationKey, ApplicationMetadata, Listing, ProvenanceRecord, RepositoryId,
    RepositoryMetadata, ServerId, VersionKey, VersionMetadata,
};

/// Tuning for an [`Aggregator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// How many servers an index build may walk at the same time.
    ///
    /// Refreshing with progress is always sequential.
    pub max_concurrent_servers: usize,
    /// Limit for each remote call. An expired call fails its server.
    pub call_timeout: Option<Duration>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_servers: 1,
            call_timeout: None,
        }
    }
}

impl AggregatorConfig {
    pub fn with_max_concurrent_servers(mut self, servers: usize) -> Self {
        self.max_concurrent_servers = servers.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}

/// A server whose walk stopped early during an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFailure {
    pub server: ServerId,
    /// Repository being walked when the failure happened, if any.
    pub repository: Option<RepositoryId>,
    pub cause: String,
}

impl ServerFailure {
    fn new(server: ServerId, repository: Option<RepositoryId>, error: Error) -> Self {
        let cause = match error {
            Error::RemoteServer { cause, .. } => cause,
            other => other.to_string(),
        };
        Self {
            server,
            repository,
            cause,
        }
    }
}

impl fmt::Display for ServerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repository {
            Some(repository) => write!(f, "{}/{}: {}", self.server, repository, self.cause),
            None => write!(f, "{}: {}", self.server, self.cause),
        }
    }
}

/// How much of the registry made it into a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStatus {
    /// Every server was aggregated (including the empty registry).
    Complete,
    /// Some servers failed; the others were aggregated.
    Partial { failed: usize, visited: usize },
    /// Every visited server failed.
    Failed { visited: usize },
}

impl AggregationStatus {
    pub(crate) fn from_counts(visited: usize, failed: usize) -> Self {
        if failed == 0 {
            Self::Complete
        } else if failed >= visited {
            Self::Failed { visited }
        } else {
            Self::Partial { failed, visited }
        }
    }
}

/// An aggregated value together with the servers that could not contribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation<T> {
    pub value: T,
    pub servers_visited: usize,
    pub failures: Vec<ServerFailure>,
}

impl<T> Aggregation<T> {
    /// Whether every registered server contributed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn status(&self) -> AggregationStatus {
        AggregationStatus::from_counts(self.servers_visited, self.failures.len())
    }

    pub fn failed_servers(&self) -> Vec<ServerId> {
        self.failures.iter().map(|f| f.server.clone()).collect()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Builds the aggregated application index from injected collaborators.
///
/// # Example
///
/// ```ignore
/// let aggregator = Aggregator::new(registry, factory)
///     .with_config(AggregatorConfig::default().with_max_concurrent_servers(4));
///
/// let built = aggregator.get_available_applications(false).await?;
/// if !built.is_complete() {
///     eprintln!("{} server(s) failed", built.failures.len());
/// }
/// ```
pub struct Aggregator {
    registry: Arc<dyn ServerRegistry>,
    clients: Arc<dyn ClientFactory>,
    resolver: Option<Arc<dyn DependencyResolver>>,
    config: AggregatorConfig,
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("config", &self.config)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl Aggregator {
    pub fn new(registry: Arc<dyn ServerRegistry>, clients: Arc<dyn ClientFactory>) -> Self {
        Self {
            registry,
            clients,
            resolver: None,
            config: AggregatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Plug in a dependency resolver for [`Self::resolve_dependencies`].
    pub fn with_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Build the index of every application version on every registered
    /// server.
    ///
    /// `refresh` is passed through to every listing call.
    pub async fn get_available_applications(
        &self,
        refresh: bool,
    ) -> Result<Aggregation<ApplicationIndex>> {
        self.get_available_applications_with_cancel(refresh, &CancellationToken::new())
            .await
    }

    /// Like [`Self::get_available_applications`], aborting with
    /// [`Error::Cancelled`] once `cancel` fires.
    pub async fn get_available_applications_with_cancel(
        &self,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<Aggregation<ApplicationIndex>> {
        let servers = self.list_servers(cancel).await?;
        info!(servers = servers.len(), refresh, "Building application index");

        let outcomes: Vec<_> = stream::iter(&servers)
            .map(|server| self.index_server(server, refresh, cancel))
            .buffered(self.config.max_concurrent_servers.max(1))
            .collect()
            .await;

        let mut index = ApplicationIndex::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            let (partial, failure) = outcome?;
            index.merge(partial);
            failures.extend(failure);
        }

        info!(
            applications = index.len(),
            versions = index.version_count(),
            failed = failures.len(),
            "Application index built"
        );

        Ok(Aggregation {
            value: index,
            servers_visited: servers.len(),
            failures,
        })
    }

    /// Versions and provenance of one application.
    ///
    /// Builds the full index and extracts the application from it. Returns
    /// [`Error::ApplicationNotFound`] when the application is absent.
    pub async fn find_application(
        &self,
        application: &ApplicationId,
        refresh: bool,
    ) -> Result<Aggregation<VersionMap>> {
        self.find_application_with_cancel(application, refresh, &CancellationToken::new())
            .await
    }

    pub async fn find_application_with_cancel(
        &self,
        application: &ApplicationId,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<Aggregation<VersionMap>> {
        let Aggregation {
            value,
            servers_visited,
            failures,
        } = self
            .get_available_applications_with_cancel(refresh, cancel)
            .await?;

        match value.into_application(application.as_str()) {
            Some(versions) => Ok(Aggregation {
                value: versions,
                servers_visited,
                failures,
            }),
            None => Err(Error::ApplicationNotFound {
                application: application.clone(),
                unreachable: failures.into_iter().map(|f| f.server).collect(),
            }),
        }
    }

    /// Refresh every server's listings, reporting progress per repository.
    ///
    /// Every listing call is made with `refresh = true`. Nothing is
    /// accumulated: the purpose is to refresh the clients' caches. Servers
    /// and repositories are walked one at a time, and handlers fire in
    /// traversal order: each repository's entered notification precedes its
    /// completed notification, which precedes the next repository's.
    pub async fn update_applications_list(
        &self,
        handlers: ProgressHandlers<'_>,
    ) -> Result<RefreshReport> {
        self.update_applications_list_with_cancel(handlers, &CancellationToken::new())
            .await
    }

    pub async fn update_applications_list_with_cancel(
        &self,
        mut handlers: ProgressHandlers<'_>,
        cancel: &CancellationToken,
    ) -> Result<RefreshReport> {
        let servers = self.list_servers(cancel).await?;
        info!(servers = servers.len(), "Refreshing application lists");

        let mut report = RefreshReport {
            servers_visited: servers.len(),
            ..RefreshReport::default()
        };

        for server in &servers {
            let mut open = None;
            let outcome = self
                .refresh_server(server, cancel, &mut handlers, &mut report, &mut open)
                .await;

            match outcome {
                Ok(()) => {}
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(error) => {
                    if let Some(repository) = &open {
                        handlers.completed(&RepositoryCompleted {
                            server,
                            repository,
                            success: false,
                        });
                    }
                    warn!(server = %server, "Refresh failed: {}", error);
                    report
                        .failures
                        .push(ServerFailure::new(server.clone(), open, error));
                }
            }
        }

        Ok(report)
    }

    /// Resolve requirements against a freshly built index.
    ///
    /// Without a configured [`DependencyResolver`] this returns
    /// [`Error::UnsupportedOperation`] and makes no remote calls. A resolver
    /// is never handed a partial index.
    pub async fn resolve_dependencies(&self, requirements: &[Requirement]) -> Result<Resolution> {
        let Some(resolver) = &self.resolver else {
            return Err(Error::UnsupportedOperation {
                operation: "resolve_dependencies",
            });
        };

        let built = self.get_available_applications(false).await?;
        if !built.is_complete() {
            return Err(Error::IncompleteIndex {
                failed: built.failures.len(),
            });
        }

        resolver.resolve(requirements, &built.value)
    }

    async fn list_servers(&self, cancel: &CancellationToken) -> Result<Vec<ServerId>> {
        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            listed = self.registry.list_server_ids() => listed,
        };

        listed.map_err(|error| match error {
            Error::RegistryUnavailable { .. } | Error::Cancelled => error,
            other => Error::registry(other),
        })
    }

    async fn walk<'a>(
        &self,
        server: &'a ServerId,
        refresh: bool,
        cancel: &'a CancellationToken,
    ) -> Result<ServerWalk<'a>> {
        let client = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            client = self.clients.client_for(server) => client?,
        };
        Ok(ServerWalk {
            server,
            client,
            refresh,
            cancel,
            timeout: self.config.call_timeout,
        })
    }

    /// Fold one server into its own partial index.
    ///
    /// Records folded before a failure are kept alongside the failure.
    /// Only cancellation is returned as an error.
    async fn index_server(
        &self,
        server: &ServerId,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<(ApplicationIndex, Option<ServerFailure>)> {
        let mut partial = ApplicationIndex::new();
        let mut position = None;

        match self
            .fold_server(server, refresh, cancel, &mut partial, &mut position)
            .await
        {
            Ok(()) => Ok((partial, None)),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(error) => {
                warn!(
                    server = %server,
                    kept = partial.version_count(),
                    "Skipping rest of server: {}",
                    error
                );
                let failure = ServerFailure::new(server.clone(), position, error);
                Ok((partial, Some(failure)))
            }
        }
    }

    async fn fold_server(
        &self,
        server: &ServerId,
        refresh: bool,
        cancel: &CancellationToken,
        partial: &mut ApplicationIndex,
        position: &mut Option<RepositoryId>,
    ) -> Result<()> {
        let walk = self.walk(server, refresh, cancel).await?;
        let repositories = walk.repositories().await?;

        for repository in repositories.keys() {
            *position = Some(repository.clone());
            let applications = walk.applications(repository).await?;

            for (key, application) in &applications {
                let versions = walk.versions(repository, key).await?;
                for version in versions.into_keys() {
                    partial.record(
                        application.app_id.clone(),
                        version,
                        ProvenanceRecord::new(server.clone(), repository.clone()),
                    );
                }
            }
        }

        *position = None;
        Ok(())
    }

    async fn refresh_server(
        &self,
        server: &ServerId,
        cancel: &CancellationToken,
        handlers: &mut ProgressHandlers<'_>,
        report: &mut RefreshReport,
        open: &mut Option<RepositoryId>,
    ) -> Result<()> {
        let walk = self.walk(server, true, cancel).await?;
        let repositories = walk.repositories().await?;

        let account = if handlers.wants_entered() && !repositories.is_empty() {
            walk.account_name().await?
        } else {
            String::new()
        };

        for (repository, metadata) in &repositories {
            *open = Some(repository.clone());
            handlers.entered(&RepositoryEntered {
                server,
                account: &account,
                repository,
                metadata,
            });

            let applications = walk.applications(repository).await?;
            for key in applications.keys() {
                let versions = walk.versions(repository, key).await?;
                report.versions_seen += versions.len();
            }
            report.applications_seen += applications.len();

            handlers.completed(&RepositoryCompleted {
                server,
                repository,
                success: true,
            });
            *open = None;
            report.repositories_refreshed += 1;
        }

        Ok(())
    }
}

/// Remote calls for one server, bounded by the timeout and the cancel token.
struct ServerWalk<'a> {
    server: &'a ServerId,
    client: Arc<dyn RemoteServerClient>,
    refresh: bool,
    cancel: &'a CancellationToken,
    timeout: Option<Duration>,
}

impl ServerWalk<'_> {
    async fn account_name(&self) -> Result<String> {
        debug!(server = %self.server, refresh = self.refresh, "Fetching account name");
        self.guard(self.client.account_name(self.refresh)).await
    }

    async fn repositories(&self) -> Result<Listing<RepositoryId, RepositoryMetadata>> {
        debug!(server = %self.server, refresh = self.refresh, "Listing repositories");
        self.guard(self.client.list_repositories(self.refresh)).await
    }

    async fn applications(
        &self,
        repository: &RepositoryId,
    ) -> Result<Listing<ApplicationKey, ApplicationMetadata>> {
        debug!(
            server = %self.server,
            repository = %repository,
            refresh = self.refresh,
            "Listing applications"
        );
        self.guard(self.client.list_applications(repository, self.refresh))
            .await
    }

    async fn versions(
        &self,
        repository: &RepositoryId,
        application: &ApplicationKey,
    ) -> Result<Listing<VersionKey, VersionMetadata>> {
        debug!(
            server = %self.server,
            repository = %repository,
            application = %application,
            refresh = self.refresh,
            "Listing versions"
        );
        self.guard(
            self.client
                .list_versions(repository, application, self.refresh),
        )
        .await
    }

    async fn guard<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| {
                        Err(Error::remote(
                            self.server.clone(),
                            format!("call timed out after {limit:?}"),
                        ))
                    }),
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = bounded => result,
        }
    }
}
