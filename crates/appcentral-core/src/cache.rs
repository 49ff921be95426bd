//! Caching layer for remote server listings.
//!
//! [`CachingClient`] wraps any [`RemoteServerClient`] and honours the
//! `refresh` flag: cached listings are served when `refresh` is `false`,
//! and the inner client is always queried (and the cache overwritten) when
//! it is `true`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::client::RemoteServerClient;
use crate::error::Result;
use crate::types::{
    ApplicationKey, ApplicationMetadata, Listing, RepositoryId, RepositoryMetadata, ServerId,
    VersionKey, VersionMetadata,
};

#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.fetched_at.elapsed() > ttl)
    }
}

/// One keyed cache. The lock is never held across an await.
struct CacheSlot<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K: Eq + Hash, V: Clone> CacheSlot<K, V> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, key: &K, ttl: Option<Duration>) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(ttl))
            .map(|entry| entry.value.clone())
    }

    fn put(&self, key: K, value: V) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, CacheEntry::new(value));
    }

    fn retain(&self, mut keep: impl FnMut(&K) -> bool) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|key, _| keep(key));
    }

    fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: usize,
    /// Lookups that reached the inner client (including forced refreshes).
    pub misses: usize,
    /// Listings currently cached.
    pub entries: usize,
}

/// Caching wrapper for a [`RemoteServerClient`].
///
/// Failed fetches are never cached. A fetched repository listing evicts
/// the listings of repositories it no longer contains, and a fetched
/// application listing does the same for its versions.
///
/// ```ignore
/// let client = CachingClient::new(http_client).with_ttl(Duration::from_secs(300));
///
/// // First call reaches the server, the second is served from cache.
/// client.list_repositories(false).await?;
/// client.list_repositories(false).await?;
///
/// // A refresh always reaches the server.
/// client.list_repositories(true).await?;
/// ```
pub struct CachingClient<C> {
    inner: C,
    ttl: Option<Duration>,
    account: CacheSlot<(), String>,
    repositories: CacheSlot<(), Listing<RepositoryId, RepositoryMetadata>>,
    applications: CacheSlot<RepositoryId, Listing<ApplicationKey, ApplicationMetadata>>,
    versions: CacheSlot<(RepositoryId, ApplicationKey), Listing<VersionKey, VersionMetadata>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<C: RemoteServerClient> CachingClient<C> {
    /// Wrap `inner` with a cache that never expires on its own.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            ttl: None,
            account: CacheSlot::new(),
            repositories: CacheSlot::new(),
            applications: CacheSlot::new(),
            versions: CacheSlot::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Expire cached listings after `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Drop every cached listing.
    pub fn invalidate_all(&self) {
        self.account.clear();
        self.repositories.clear();
        self.applications.clear();
        self.versions.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.account.len()
                + self.repositories.len()
                + self.applications.len()
                + self.versions.len(),
        }
    }

    fn cached<K: Eq + Hash, V: Clone>(
        &self,
        slot: &CacheSlot<K, V>,
        key: &K,
        refresh: bool,
    ) -> Option<V> {
        if refresh {
            return None;
        }
        let hit = slot.get(key, self.ttl);
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl<C: RemoteServerClient> RemoteServerClient for CachingClient<C> {
    fn server_id(&self) -> &ServerId {
        self.inner.server_id()
    }

    async fn account_name(&self, refresh: bool) -> Result<String> {
        if let Some(name) = self.cached(&self.account, &(), refresh) {
            return Ok(name);
        }
        self.miss();
        let name = self.inner.account_name(refresh).await?;
        self.account.put((), name.clone());
        Ok(name)
    }

    async fn list_repositories(
        &self,
        refresh: bool,
    ) -> Result<Listing<RepositoryId, RepositoryMetadata>> {
        if let Some(listing) = self.cached(&self.repositories, &(), refresh) {
            tracing::debug!(server = %self.server_id(), "Cache hit for repositories");
            return Ok(listing);
        }
        self.miss();
        let listing = self.inner.list_repositories(refresh).await?;
        self.applications.retain(|repository| listing.contains_key(repository));
        self.versions.retain(|(repository, _)| listing.contains_key(repository));
        self.repositories.put((), listing.clone());
        Ok(listing)
    }

    async fn list_applications(
        &self,
        repository: &RepositoryId,
        refresh: bool,
    ) -> Result<Listing<ApplicationKey, ApplicationMetadata>> {
        if let Some(listing) = self.cached(&self.applications, repository, refresh) {
            tracing::debug!(
                server = %self.server_id(),
                repository = %repository,
                "Cache hit for applications"
            );
            return Ok(listing);
        }
        self.miss();
        let listing = self.inner.list_applications(repository, refresh).await?;
        self.versions.retain(|(listed_in, application)| {
            listed_in != repository || listing.contains_key(application)
        });
        self.applications.put(repository.clone(), listing.clone());
        Ok(listing)
    }

    async fn list_versions(
        &self,
        repository: &RepositoryId,
        application: &ApplicationKey,
        refresh: bool,
    ) -> Result<Listing<VersionKey, VersionMetadata>> {
        let key = (repository.clone(), application.clone());
        if let Some(listing) = self.cached(&self.versions, &key, refresh) {
            tracing::debug!(
                server = %self.server_id(),
                repository = %repository,
                application = %application,
                "Cache hit for versions"
            );
            return Ok(listing);
        }
        self.miss();
        let listing = self
            .inner
            .list_versions(repository, application, refresh)
            .await?;
        self.versions.put(key, listing.clone());
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Arc;

    /// Inner client that counts calls and can be told to fail.
    struct CountingClient {
        server: ServerId,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CountingClient {
        fn new() -> Self {
            Self {
                server: ServerId::new("s1"),
                calls: Arc::new(AtomicUsize::new(0)),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn bump(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::remote(self.server.clone(), "offline"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RemoteServerClient for CountingClient {
        fn server_id(&self) -> &ServerId {
            &self.server
        }

        async fn account_name(&self, _refresh: bool) -> Result<String> {
            self.bump()?;
            Ok(format!("Acme {}", self.calls.load(Ordering::SeqCst)))
        }

        async fn list_repositories(
            &self,
            _refresh: bool,
        ) -> Result<Listing<RepositoryId, RepositoryMetadata>> {
            self.bump()?;
            let mut listing = Listing::new();
            listing.insert(RepositoryId::new("stable"), RepositoryMetadata::default());
            Ok(listing)
        }

        async fn list_applications(
            &self,
            _repository: &RepositoryId,
            _refresh: bool,
        ) -> Result<Listing<ApplicationKey, ApplicationMetadata>> {
            self.bump()?;
            let mut listing = Listing::new();
            listing.insert(ApplicationKey::new("7"), ApplicationMetadata::new("crm"));
            Ok(listing)
        }

        async fn list_versions(
            &self,
            _repository: &RepositoryId,
            _application: &ApplicationKey,
            _refresh: bool,
        ) -> Result<Listing<VersionKey, VersionMetadata>> {
            self.bump()?;
            let mut listing = Listing::new();
            listing.insert(VersionKey::new("1.0"), VersionMetadata::default());
            Ok(listing)
        }
    }

    #[tokio::test]
    async fn test_cached_listing_served_without_refresh() {
        let inner = CountingClient::new();
        let calls = inner.calls.clone();
        let client = CachingClient::new(inner);

        client.list_repositories(false).await.unwrap();
        client.list_repositories(false).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = client.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_cache() {
        let inner = CountingClient::new();
        let calls = inner.calls.clone();
        let client = CachingClient::new(inner);

        client.list_repositories(false).await.unwrap();
        client.list_repositories(true).await.unwrap();
        client.list_repositories(true).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(client.cache_stats().hits, 0);
    }

    #[tokio::test]
    async fn test_account_name_refresh_bypasses_cache() {
        let inner = CountingClient::new();
        let calls = inner.calls.clone();
        let client = CachingClient::new(inner);

        assert_eq!(client.account_name(false).await.unwrap(), "Acme 1");
        assert_eq!(client.account_name(false).await.unwrap(), "Acme 1");
        assert_eq!(client.account_name(true).await.unwrap(), "Acme 2");
        assert_eq!(client.account_name(false).await.unwrap(), "Acme 2");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.cache_stats().hits, 2);
    }

    #[tokio::test]
    async fn test_refresh_updates_cache_for_later_reads() {
        let inner = CountingClient::new();
        let calls = inner.calls.clone();
        let client = CachingClient::new(inner);
        let repository = RepositoryId::new("stable");

        client.list_applications(&repository, true).await.unwrap();
        client.list_applications(&repository, false).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_versions_cached_per_application() {
        let inner = CountingClient::new();
        let calls = inner.calls.clone();
        let client = CachingClient::new(inner);
        let repository = RepositoryId::new("stable");

        client
            .list_versions(&repository, &ApplicationKey::new("7"), false)
            .await
            .unwrap();
        client
            .list_versions(&repository, &ApplicationKey::new("8"), false)
            .await
            .unwrap();
        client
            .list_versions(&repository, &ApplicationKey::new("7"), false)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = CountingClient::failing();
        let calls = inner.calls.clone();
        let client = CachingClient::new(inner);

        assert!(client.list_repositories(false).await.is_err());
        assert!(client.list_repositories(false).await.is_err());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let inner = CountingClient::new();
        let calls = inner.calls.clone();
        let client = CachingClient::new(inner).with_ttl(Duration::ZERO);

        client.account_name(false).await.unwrap();
        std::thread::sleep(Duration::from_millis(2));
        client.account_name(false).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fresh_listings_evict_vanished_entries() {
        let client = CachingClient::new(CountingClient::new());
        let stable = RepositoryId::new("stable");
        let gone = RepositoryId::new("gone");

        client.list_applications(&stable, false).await.unwrap();
        client.list_applications(&gone, false).await.unwrap();
        for key in ["7", "8"] {
            client
                .list_versions(&stable, &ApplicationKey::new(key), false)
                .await
                .unwrap();
        }
        client
            .list_versions(&gone, &ApplicationKey::new("7"), false)
            .await
            .unwrap();
        assert_eq!(client.cache_stats().entries, 5);

        client.list_repositories(true).await.unwrap();
        assert_eq!(client.cache_stats().entries, 4);

        client.list_applications(&stable, true).await.unwrap();
        assert_eq!(client.cache_stats().entries, 3);
        assert!(client.applications.get(&gone, None).is_none());
        assert!(
            client
                .versions
                .get(&(stable.clone(), ApplicationKey::new("8")), None)
                .is_none()
        );
        assert!(
            client
                .versions
                .get(&(stable, ApplicationKey::new("7")), None)
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let inner = CountingClient::new();
        let calls = inner.calls.clone();
        let client = CachingClient::new(inner);

        client.list_repositories(false).await.unwrap();
        client.invalidate_all();
        assert_eq!(client.cache_stats().entries, 0);

        client.list_repositories(false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
