//! Client factory over the configured servers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use appcentral_core::{CacheStats, CachingClient, ClientFactory, RemoteServerClient, ServerId};
use async_trait::async_trait;

use crate::catalog::CatalogClient;
use crate::config::{AppCentralConfig, CacheSection, ServerEntry, load_config_async};

/// Settings a memoized client was built from.
#[derive(Debug, Clone, PartialEq)]
struct ClientSettings {
    entry: ServerEntry,
    catalog: PathBuf,
    cache: CacheSection,
}

impl ClientSettings {
    fn resolve(config: &AppCentralConfig, server: &ServerId) -> Option<Self> {
        let entry = config.server(server.as_str())?;
        Some(Self {
            entry: entry.clone(),
            catalog: config.catalog_path(entry),
            cache: config.cache.clone(),
        })
    }
}

struct BuiltClient {
    settings: ClientSettings,
    client: Arc<dyn RemoteServerClient>,
    cache: Option<Arc<CachingClient<CatalogClient>>>,
}

impl BuiltClient {
    fn build(settings: ClientSettings) -> Self {
        let mut client = CatalogClient::new(settings.entry.id.clone(), settings.catalog.clone());
        if let Some(account) = &settings.entry.account {
            client = client.with_account(account.clone());
        }

        if !settings.cache.enabled {
            return Self {
                settings,
                client: Arc::new(client),
                cache: None,
            };
        }

        let mut cached = CachingClient::new(client);
        if let Some(ttl) = settings.cache.ttl() {
            cached = cached.with_ttl(ttl);
        }
        let cached = Arc::new(cached);
        Self {
            settings,
            client: cached.clone(),
            cache: Some(cached),
        }
    }
}

/// [`ClientFactory`] building one [`CatalogClient`] per configured server.
///
/// Clients are memoized so their caches outlive a single traversal. With
/// `[cache] enabled` each client is wrapped in a [`CachingClient`]. When
/// built [`with_source`](Self::with_source) the configuration is re-read on
/// every request, and a client whose server entry changed is rebuilt.
pub struct CatalogClientFactory {
    config: RwLock<AppCentralConfig>,
    source: Option<PathBuf>,
    clients: Mutex<HashMap<ServerId, BuiltClient>>,
}

impl CatalogClientFactory {
    pub fn new(config: AppCentralConfig) -> Self {
        Self {
            config: RwLock::new(config),
            source: None,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Follow the configuration file at `path` instead of a fixed snapshot.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Snapshot of the configuration clients are built from.
    pub fn config(&self) -> AppCentralConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Combined statistics of every cache built so far.
    pub fn cache_stats(&self) -> CacheStats {
        let clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients
            .values()
            .filter_map(|built| built.cache.as_ref())
            .map(|cache| cache.cache_stats())
            .fold(CacheStats::default(), |total, stats| CacheStats {
                hits: total.hits + stats.hits,
                misses: total.misses + stats.misses,
                entries: total.entries + stats.entries,
            })
    }

    pub fn invalidate_all(&self) {
        let clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        for cache in clients.values().filter_map(|built| built.cache.as_ref()) {
            cache.invalidate_all();
        }
    }

    /// Current configuration, re-read from the source when there is one.
    ///
    /// A source that cannot be read leaves the last good snapshot in place.
    async fn current_config(&self) -> AppCentralConfig {
        let Some(source) = &self.source else {
            return self.config();
        };

        match load_config_async(source).await {
            Ok(reloaded) => {
                let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
                if *config != reloaded {
                    tracing::debug!(path = %source.display(), "Reloaded configuration");
                    *config = reloaded.clone();
                }
                reloaded
            }
            Err(error) => {
                tracing::warn!(path = %source.display(), %error, "Failed to reload configuration");
                self.config()
            }
        }
    }
}

#[async_trait]
impl ClientFactory for CatalogClientFactory {
    async fn client_for(
        &self,
        server: &ServerId,
    ) -> appcentral_core::Result<Arc<dyn RemoteServerClient>> {
        let config = self.current_config().await;
        let settings = ClientSettings::resolve(&config, server).ok_or_else(|| {
            appcentral_core::Error::remote(server.clone(), "server is not configured")
        })?;

        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(built) = clients.get(server) {
            if built.settings == settings {
                return Ok(built.client.clone());
            }
            tracing::debug!(server = %server, "Server entry changed, rebuilding client");
        }

        let built = BuiltClient::build(settings);
        tracing::debug!(server = %server, cached = built.cache.is_some(), "Built catalog client");
        let client = built.client.clone();
        clients.insert(server.clone(), built);
        Ok(client)
    }
}
