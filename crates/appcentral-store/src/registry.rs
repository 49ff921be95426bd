//! Server registry backed by the configuration file.

use std::path::{Path, PathBuf};

use appcentral_core::{ServerId, ServerRegistry};
use async_trait::async_trait;

use crate::config::load_config_async;

/// [`ServerRegistry`] reading the `[[servers]]` array of `appcentral.toml`.
///
/// The file is read on every call, so edits take effect on the next
/// traversal. Any failure to read or validate it is reported as
/// [`RegistryUnavailable`](appcentral_core::Error::RegistryUnavailable).
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ServerRegistry for FileRegistry {
    async fn list_server_ids(&self) -> appcentral_core::Result<Vec<ServerId>> {
        let config = load_config_async(&self.path)
            .await
            .map_err(appcentral_core::Error::registry)?;
        Ok(config.server_ids())
    }
}
