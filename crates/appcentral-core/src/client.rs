//! Collaborator traits consumed by the aggregator.
//!
//! The aggregator never reaches into global state: it is handed a
//! [`ServerRegistry`] to enumerate servers and a [`ClientFactory`] to obtain
//! a [`RemoteServerClient`] per server. Tests substitute mocks for both.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::types::{
    ApplicationKey, ApplicationMetadata, Listing, RepositoryId, RepositoryMetadata, ServerId,
    VersionKey, VersionMetadata,
};

/// Source of the registered server identifiers.
#[async_trait]
pub trait ServerRegistry: Send + Sync {
    /// List registered servers in registry order.
    ///
    /// Fails with [`Error::RegistryUnavailable`](crate::Error::RegistryUnavailable)
    /// when the backing store cannot be read.
    async fn list_server_ids(&self) -> Result<Vec<ServerId>>;
}

/// Client for one AppCentral server.
///
/// Every `refresh` flag means the same thing: when `true` the client must
/// bypass any cache it keeps and query the server; when `false` cached data
/// may be returned. The client owns its cache and its consistency.
///
/// Failures are reported as [`Error::RemoteServer`](crate::Error::RemoteServer).
#[async_trait]
pub trait RemoteServerClient: Send + Sync {
    /// The server this client talks to.
    fn server_id(&self) -> &ServerId;

    /// Human-readable account (owner) name for the server.
    async fn account_name(&self, refresh: bool) -> Result<String>;

    /// List the repositories hosted by the server.
    async fn list_repositories(
        &self,
        refresh: bool,
    ) -> Result<Listing<RepositoryId, RepositoryMetadata>>;

    /// List the applications of one repository, keyed by listing key.
    async fn list_applications(
        &self,
        repository: &RepositoryId,
        refresh: bool,
    ) -> Result<Listing<ApplicationKey, ApplicationMetadata>>;

    /// List the versions of one application in one repository.
    async fn list_versions(
        &self,
        repository: &RepositoryId,
        application: &ApplicationKey,
        refresh: bool,
    ) -> Result<Listing<VersionKey, VersionMetadata>>;
}

/// Produces the client for a given server.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Obtain the client for `server`.
    ///
    /// A factory that cannot serve the id should fail with a
    /// [`Error::RemoteServer`](crate::Error::RemoteServer) for that server.
    async fn client_for(&self, server: &ServerId) -> Result<Arc<dyn RemoteServerClient>>;
}

#[async_trait]
impl<T: ServerRegistry + ?Sized> ServerRegistry for Arc<T> {
    async fn list_server_ids(&self) -> Result<Vec<ServerId>> {
        (**self).list_server_ids().await
    }
}

#[async_trait]
impl<T: RemoteServerClient + ?Sized> RemoteServerClient for Arc<T> {
    fn server_id(&self) -> &ServerId {
        (**self).server_id()
    }

    async fn account_name(&self, refresh: bool) -> Result<String> {
        (**self).account_name(refresh).await
    }

    async fn list_repositories(
        &self,
        refresh: bool,
    ) -> Result<Listing<RepositoryId, RepositoryMetadata>> {
        (**self).list_repositories(refresh).await
    }

    async fn list_applications(
        &self,
        repository: &RepositoryId,
        refresh: bool,
    ) -> Result<Listing<ApplicationKey, ApplicationMetadata>> {
        (**self).list_applications(repository, refresh).await
    }

    async fn list_versions(
        &self,
        repository: &RepositoryId,
        application: &ApplicationKey,
        refresh: bool,
    ) -> Result<Listing<VersionKey, VersionMetadata>> {
        (**self).list_versions(repository, application, refresh).await
    }
}
