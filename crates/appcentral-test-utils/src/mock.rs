//! In-memory test doubles for the aggregator's collaborators.
//!
//! [`MockServer`] serves a fixed catalog, records every call it receives
//! (with its `refresh` flag) and can be told to fail or stall at any level
//! of the traversal.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use appcentral_core::{
    Aggregator, ApplicationKey, ApplicationMetadata, ClientFactory, Error, Listing,
    RemoteServerClient, RepositoryId, RepositoryMetadata, Result, ServerId, ServerRegistry,
    VersionKey, VersionMetadata,
};
use async_trait::async_trait;

/// A call received by a [`MockServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Account {
        refresh: bool,
    },
    Repositories {
        refresh: bool,
    },
    Applications {
        repository: String,
        refresh: bool,
    },
    Versions {
        repository: String,
        application: String,
        refresh: bool,
    },
}

impl Call {
    /// The `refresh` flag the call was made with.
    pub fn refresh(&self) -> bool {
        match self {
            Call::Account { refresh }
            | Call::Repositories { refresh }
            | Call::Applications { refresh, .. }
            | Call::Versions { refresh, .. } => *refresh,
        }
    }

    pub fn is_account(&self) -> bool {
        matches!(self, Call::Account { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FailurePoint {
    Account,
    Repositories,
    Applications(String),
    Versions(String, String),
}

/// An application listed by a [`MockRepository`].
#[derive(Debug, Clone)]
pub struct MockApplication {
    pub key: String,
    pub app_id: String,
    pub versions: Vec<String>,
}

/// A repository served by a [`MockServer`].
#[derive(Debug, Clone)]
pub struct MockRepository {
    pub id: String,
    pub name: String,
    pub applications: Vec<MockApplication>,
}

impl MockRepository {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            applications: Vec::new(),
        }
    }

    /// Add an application listed under `key`, declaring `app_id`, offering
    /// `versions` in the given order.
    pub fn application(mut self, key: &str, app_id: &str, versions: &[&str]) -> Self {
        self.applications.push(MockApplication {
            key: key.to_string(),
            app_id: app_id.to_string(),
            versions: versions.iter().map(|v| v.to_string()).collect(),
        });
        self
    }
}

/// In-memory AppCentral server.
///
/// # Example
///
/// ```rust
/// use appcentral_test_utils::{MockRepository, MockServer};
///
/// let server = MockServer::new("s1")
///     .account("Acme")
///     .repository(MockRepository::new("stable").application("7", "crm", &["1.0", "2.0"]))
///     .fail_versions("stable", "7");
/// ```
#[derive(Debug)]
pub struct MockServer {
    id: ServerId,
    account: String,
    repositories: Vec<MockRepository>,
    failures: HashSet<FailurePoint>,
    latency: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl MockServer {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            account: format!("{id} account"),
            id: ServerId::new(id),
            repositories: Vec::new(),
            failures: HashSet::new(),
            latency: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn account(mut self, name: impl Into<String>) -> Self {
        self.account = name.into();
        self
    }

    pub fn repository(mut self, repository: MockRepository) -> Self {
        self.repositories.push(repository);
        self
    }

    pub fn fail_account(mut self) -> Self {
        self.failures.insert(FailurePoint::Account);
        self
    }

    pub fn fail_repositories(mut self) -> Self {
        self.failures.insert(FailurePoint::Repositories);
        self
    }

    pub fn fail_applications(mut self, repository: &str) -> Self {
        self.failures
            .insert(FailurePoint::Applications(repository.to_string()));
        self
    }

    pub fn fail_versions(mut self, repository: &str, key: &str) -> Self {
        self.failures.insert(FailurePoint::Versions(
            repository.to_string(),
            key.to_string(),
        ));
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Wrap in an `Arc` for handing to a [`MockFactory`].
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    async fn enter(&self, call: Call, point: FailurePoint) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failures.contains(&point) {
            return Err(Error::remote(
                self.id.clone(),
                format!("injected failure at {point:?}"),
            ));
        }
        Ok(())
    }

    fn find_repository(&self, repository: &RepositoryId) -> Result<&MockRepository> {
        self.repositories
            .iter()
            .find(|r| r.id == repository.as_str())
            .ok_or_else(|| Error::remote(self.id.clone(), format!("unknown repository {repository}")))
    }
}

#[async_trait]
impl RemoteServerClient for MockServer {
    fn server_id(&self) -> &ServerId {
        &self.id
    }

    async fn account_name(&self, refresh: bool) -> Result<String> {
        self.enter(Call::Account { refresh }, FailurePoint::Account).await?;
        Ok(self.account.clone())
    }

    async fn list_repositories(
        &self,
        refresh: bool,
    ) -> Result<Listing<RepositoryId, RepositoryMetadata>> {
        self.enter(Call::Repositories { refresh }, FailurePoint::Repositories)
            .await?;
        Ok(self
            .repositories
            .iter()
            .map(|r| {
                (
                    RepositoryId::new(r.id.clone()),
                    RepositoryMetadata {
                        name: r.name.clone(),
                        description: None,
                    },
                )
            })
            .collect())
    }

    async fn list_applications(
        &self,
        repository: &RepositoryId,
        refresh: bool,
    ) -> Result<Listing<ApplicationKey, ApplicationMetadata>> {
        self.enter(
            Call::Applications {
                repository: repository.to_string(),
                refresh,
            },
            FailurePoint::Applications(repository.to_string()),
        )
        .await?;
        Ok(self
            .find_repository(repository)?
            .applications
            .iter()
            .map(|a| {
                (
                    ApplicationKey::new(a.key.clone()),
                    ApplicationMetadata::new(a.app_id.as_str()),
                )
            })
            .collect())
    }

    async fn list_versions(
        &self,
        repository: &RepositoryId,
        application: &ApplicationKey,
        refresh: bool,
    ) -> Result<Listing<VersionKey, VersionMetadata>> {
        self.enter(
            Call::Versions {
                repository: repository.to_string(),
                application: application.to_string(),
                refresh,
            },
            FailurePoint::Versions(repository.to_string(), application.to_string()),
        )
        .await?;
        let app = self
            .find_repository(repository)?
            .applications
            .iter()
            .find(|a| a.key == application.as_str())
            .ok_or_else(|| {
                Error::remote(self.id.clone(), format!("unknown application {application}"))
            })?;
        Ok(app
            .versions
            .iter()
            .map(|v| (VersionKey::new(v.as_str()), VersionMetadata::default()))
            .collect())
    }
}

/// Registry returning a fixed list of servers, or failing.
#[derive(Debug, Default)]
pub struct MockRegistry {
    servers: Vec<ServerId>,
    unavailable: bool,
    calls: AtomicUsize,
}

impl MockRegistry {
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ServerId>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            unavailable: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A registry whose backing store cannot be reached.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServerRegistry for MockRegistry {
    async fn list_server_ids(&self) -> Result<Vec<ServerId>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Error::registry("mock registry is unavailable"));
        }
        Ok(self.servers.clone())
    }
}

/// Factory handing out registered [`MockServer`]s.
#[derive(Debug, Default)]
pub struct MockFactory {
    servers: HashMap<ServerId, Arc<MockServer>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, server: Arc<MockServer>) -> Self {
        self.servers.insert(server.server_id().clone(), server);
        self
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn client_for(&self, server: &ServerId) -> Result<Arc<dyn RemoteServerClient>> {
        self.servers
            .get(server)
            .map(|s| s.clone() as Arc<dyn RemoteServerClient>)
            .ok_or_else(|| Error::remote(server.clone(), "no mock registered for server"))
    }
}

/// Aggregator over `servers`, registered in the given order.
pub fn mock_aggregator(servers: &[Arc<MockServer>]) -> Aggregator {
    let registry = MockRegistry::new(servers.iter().map(|s| s.server_id().clone()));
    let factory = servers
        .iter()
        .fold(MockFactory::new(), |factory, server| {
            factory.with_server(server.clone())
        });
    Aggregator::new(Arc::new(registry), Arc::new(factory))
}
