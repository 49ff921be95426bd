//! Catalog-file backed [`RemoteServerClient`].
//!
//! A catalog is the JSON export of one server:
//!
//! ```json
//! {
//!   "account": "Innomatic Company",
//!   "repositories": [
//!     {
//!       "id": "stable",
//!       "name": "Stable",
//!       "applications": [
//!         {
//!           "key": "7",
//!           "app_id": "crm",
//!           "name": "CRM",
//!           "versions": [ { "version": "1.0", "published": "2024-03-01T00:00:00Z" } ]
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Array order is the server's listing order. When an array repeats a key
//! the first occurrence wins.

use std::path::{Path, PathBuf};

use appcentral_core::{
    ApplicationId, ApplicationKey, ApplicationMetadata, Listing, RemoteServerClient, RepositoryId,
    RepositoryMetadata, ServerId, VersionKey, VersionMetadata,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum accepted catalog file size (16 MiB).
pub const MAX_CATALOG_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default)]
    pub repositories: Vec<CatalogRepository>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRepository {
    pub id: RepositoryId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub applications: Vec<CatalogApplication>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogApplication {
    pub key: ApplicationKey,
    pub app_id: ApplicationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub versions: Vec<CatalogVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogVersion {
    pub version: VersionKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Catalog {
    pub fn repository(&self, id: &RepositoryId) -> Option<&CatalogRepository> {
        self.repositories.iter().find(|r| &r.id == id)
    }

    pub fn repository_listing(&self) -> Listing<RepositoryId, RepositoryMetadata> {
        let mut listing = Listing::new();
        for repository in &self.repositories {
            listing
                .entry(repository.id.clone())
                .or_insert_with(|| RepositoryMetadata {
                    name: repository.name.clone(),
                    description: repository.description.clone(),
                });
        }
        listing
    }
}

impl CatalogRepository {
    pub fn application(&self, key: &ApplicationKey) -> Option<&CatalogApplication> {
        self.applications.iter().find(|a| &a.key == key)
    }

    pub fn application_listing(&self) -> Listing<ApplicationKey, ApplicationMetadata> {
        let mut listing = Listing::new();
        for application in &self.applications {
            listing
                .entry(application.key.clone())
                .or_insert_with(|| ApplicationMetadata {
                    app_id: application.app_id.clone(),
                    name: application.name.clone(),
                    description: application.description.clone(),
                    category: application.category.clone(),
                });
        }
        listing
    }
}

impl CatalogApplication {
    pub fn version_listing(&self) -> Listing<VersionKey, VersionMetadata> {
        let mut listing = Listing::new();
        for version in &self.versions {
            listing
                .entry(version.version.clone())
                .or_insert_with(|| VersionMetadata {
                    published: version.published,
                    notes: version.notes.clone(),
                });
        }
        listing
    }
}

/// Read and parse a catalog file.
pub async fn read_catalog(path: &Path) -> Result<Catalog> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    if metadata.len() > MAX_CATALOG_SIZE {
        return Err(Error::InvalidCatalog {
            path: path.to_path_buf(),
            message: format!(
                "file is {} bytes (max {})",
                metadata.len(),
                MAX_CATALOG_SIZE
            ),
        });
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| Error::InvalidCatalog {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Client for one server, reading its catalog file on every call.
///
/// The file is the server: reads never go stale, so `refresh` has nothing
/// to bypass. Wrap in [`CachingClient`](appcentral_core::CachingClient) to
/// avoid re-reading.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    server: ServerId,
    path: PathBuf,
    account: Option<String>,
}

impl CatalogClient {
    pub fn new(server: impl Into<ServerId>, path: impl Into<PathBuf>) -> Self {
        Self {
            server: server.into(),
            path: path.into(),
            account: None,
        }
    }

    /// Report `account` instead of the catalog's own account name.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> appcentral_core::Result<Catalog> {
        tracing::trace!(server = %self.server, path = %self.path.display(), "Reading catalog");
        read_catalog(&self.path)
            .await
            .map_err(|e| appcentral_core::Error::remote(self.server.clone(), e))
    }

    fn missing(&self, what: String) -> appcentral_core::Error {
        appcentral_core::Error::remote(self.server.clone(), what)
    }
}

#[async_trait]
impl RemoteServerClient for CatalogClient {
    fn server_id(&self) -> &ServerId {
        &self.server
    }

    async fn account_name(&self, _refresh: bool) -> appcentral_core::Result<String> {
        if let Some(account) = &self.account {
            return Ok(account.clone());
        }
        let catalog = self.load().await?;
        Ok(catalog.account.unwrap_or_else(|| self.server.to_string()))
    }

    async fn list_repositories(
        &self,
        _refresh: bool,
    ) -> appcentral_core::Result<Listing<RepositoryId, RepositoryMetadata>> {
        Ok(self.load().await?.repository_listing())
    }

    async fn list_applications(
        &self,
        repository: &RepositoryId,
        _refresh: bool,
    ) -> appcentral_core::Result<Listing<ApplicationKey, ApplicationMetadata>> {
        let catalog = self.load().await?;
        catalog
            .repository(repository)
            .map(CatalogRepository::application_listing)
            .ok_or_else(|| self.missing(format!("repository '{repository}' not found")))
    }

    async fn list_versions(
        &self,
        repository: &RepositoryId,
        application: &ApplicationKey,
        _refresh: bool,
    ) -> appcentral_core::Result<Listing<VersionKey, VersionMetadata>> {
        let catalog = self.load().await?;
        let listed = catalog
            .repository(repository)
            .ok_or_else(|| self.missing(format!("repository '{repository}' not found")))?;
        listed
            .application(application)
            .map(CatalogApplication::version_listing)
            .ok_or_else(|| {
                self.missing(format!(
                    "application '{application}' not found in repository '{repository}'"
                ))
            })
    }
}
