//! Configuration types and loading for AppCentral
//!
//! This module provides types for loading and working with the
//! `appcentral.toml` configuration file:
//!
//! ```toml
//! [aggregator]
//! max_concurrent_servers = 4
//! call_timeout_secs = 30
//!
//! [cache]
//! enabled = true
//! ttl_secs = 300
//!
//! [[servers]]
//! id = "innomatic"
//! account = "Innomatic Company"
//! catalog = "catalogs/innomatic.json"
//! ```
//!
//! The `[[servers]]` array is the repository registry: its order is the
//! registry order. Catalog paths are relative to the configuration file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use appcentral_core::{AggregatorConfig, ServerId};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum accepted configuration file size (1 MiB).
pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Traversal settings, mapped onto [`AggregatorConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorSection {
    /// Servers walked at once while building an index
    #[serde(default = "default_max_concurrent_servers")]
    pub max_concurrent_servers: usize,
    /// Per remote call timeout, unset for none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
}

fn default_max_concurrent_servers() -> usize {
    1
}

impl Default for AggregatorSection {
    fn default() -> Self {
        Self {
            max_concurrent_servers: default_max_concurrent_servers(),
            call_timeout_secs: None,
        }
    }
}

/// Catalog caching settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Entry lifetime; unset entries live until refreshed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

impl CacheSection {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: None,
        }
    }
}

/// One registered server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: ServerId,
    /// Account name override; when unset the catalog's own is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Path to the server's exported catalog
    pub catalog: PathBuf,
}

/// The parsed `appcentral.toml`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppCentralConfig {
    #[serde(default)]
    pub aggregator: AggregatorSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl AppCentralConfig {
    /// Directory relative catalog paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Registered server ids, in registry order.
    pub fn server_ids(&self) -> Vec<ServerId> {
        self.servers.iter().map(|s| s.id.clone()).collect()
    }

    pub fn server(&self, id: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.id.as_str() == id)
    }

    pub fn catalog_path(&self, server: &ServerEntry) -> PathBuf {
        if server.catalog.is_absolute() {
            server.catalog.clone()
        } else {
            self.base_dir.join(&server.catalog)
        }
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache.ttl()
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        let config = AggregatorConfig::default()
            .with_max_concurrent_servers(self.aggregator.max_concurrent_servers);
        match self.aggregator.call_timeout_secs {
            Some(secs) => config.with_call_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: String| Error::InvalidConfig {
            path: path.to_path_buf(),
            message,
        };

        if self.aggregator.max_concurrent_servers == 0 {
            return Err(invalid(
                "aggregator.max_concurrent_servers must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (position, server) in self.servers.iter().enumerate() {
            if server.id.as_str().trim().is_empty() {
                return Err(invalid(format!("server #{} has an empty id", position + 1)));
            }
            if server.catalog.as_os_str().is_empty() {
                return Err(invalid(format!("server '{}' has an empty catalog path", server.id)));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(invalid(format!("duplicate server id '{}'", server.id)));
            }
        }
        Ok(())
    }
}

/// Default location: `<config dir>/appcentral/appcentral.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("appcentral").join("appcentral.toml"))
        .ok_or(Error::NoConfigDir)
}

/// Load and validate the configuration at `path`.
pub fn load_config(path: &Path) -> Result<AppCentralConfig> {
    let metadata = std::fs::metadata(path).map_err(|e| not_found_or_io(path, e))?;
    check_size(path, metadata.len())?;
    let content = std::fs::read_to_string(path).map_err(|e| not_found_or_io(path, e))?;
    parse_config(path, &content)
}

/// Async variant of [`load_config`] for use inside the runtime.
pub async fn load_config_async(path: &Path) -> Result<AppCentralConfig> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| not_found_or_io(path, e))?;
    check_size(path, metadata.len())?;
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| not_found_or_io(path, e))?;
    parse_config(path, &content)
}

fn not_found_or_io(path: &Path, error: std::io::Error) -> Error {
    if error.kind() == std::io::ErrorKind::NotFound {
        Error::ConfigNotFound {
            path: path.to_path_buf(),
        }
    } else {
        Error::io(path, error)
    }
}

fn check_size(path: &Path, size: u64) -> Result<()> {
    if size > MAX_CONFIG_SIZE {
        return Err(Error::ConfigTooLarge {
            path: path.to_path_buf(),
            size,
            max: MAX_CONFIG_SIZE,
        });
    }
    Ok(())
}

fn parse_config(path: &Path, content: &str) -> Result<AppCentralConfig> {
    let mut config: AppCentralConfig =
        toml::from_str(content).map_err(|e| Error::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    config.validate(path)?;
    config.base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    tracing::debug!(
        path = %path.display(),
        servers = config.servers.len(),
        "Loaded configuration"
    );
    Ok(config)
}
