//! File-backed collaborators for the AppCentral aggregator.
//!
//! - [`FileRegistry`] enumerates the servers listed in `appcentral.toml`
//! - [`CatalogClient`] answers for one server from its exported JSON catalog
//! - [`CatalogClientFactory`] builds (and optionally caches) those clients
//!
//! [`open_aggregator`] wires all three into an [`Aggregator`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod factory;
pub mod registry;

use std::path::Path;
use std::sync::Arc;

use appcentral_core::Aggregator;

pub use catalog::{Catalog, CatalogApplication, CatalogClient, CatalogRepository, CatalogVersion};
pub use config::{
    AggregatorSection, AppCentralConfig, CacheSection, MAX_CONFIG_SIZE, ServerEntry,
    default_config_path, load_config, load_config_async,
};
pub use error::{Error, Result};
pub use factory::CatalogClientFactory;
pub use registry::FileRegistry;

/// Load the configuration at `path` and build an [`Aggregator`] over it.
pub fn open_aggregator(path: &Path) -> Result<Aggregator> {
    let config = load_config(path)?;
    let aggregator_config = config.aggregator_config();
    tracing::info!(
        path = %path.display(),
        servers = config.servers.len(),
        cache = config.cache.enabled,
        "Opening aggregator"
    );

    let registry = Arc::new(FileRegistry::new(path));
    let factory = Arc::new(CatalogClientFactory::new(config).with_source(path));
    Ok(Aggregator::new(registry, factory).with_config(aggregator_config))
}
