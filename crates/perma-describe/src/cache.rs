//! Materialized view cache using moka
//!
//! Entries remember the [`ViewVersion`] they were computed at: how many
//! claims their permanode had and which authorization policy generation
//! filtered them. A lookup at any other version is a miss, so a view
//! computed before a concurrent append or a grant/revoke is never served
//! after it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use perma_blob::BlobRef;
use perma_resolve::PermanodeView;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
}

/// Inputs a cached view was derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ViewVersion {
    /// Claims indexed for the permanode
    pub claim_count: usize,
    /// [`AuthorizationPolicy::generation`](perma_resolve::AuthorizationPolicy::generation)
    pub policy_generation: u64,
}

impl ViewVersion {
    /// Version from a claim count and policy generation
    #[inline]
    #[must_use]
    pub const fn new(claim_count: usize, policy_generation: u64) -> Self {
        Self {
            claim_count,
            policy_generation,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedView {
    version: ViewVersion,
    view: Arc<PermanodeView>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Permanode view cache keyed by permanode reference
///
/// Never a source of truth: dropping every entry only costs recomputation.
#[derive(Debug, Clone)]
pub struct ViewCache {
    inner: Cache<BlobRef, CachedView>,
    counters: Arc<Counters>,
}

impl ViewCache {
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
            counters: Arc::default(),
        }
    }

    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            counters: Arc::default(),
        }
    }

    /// Cached view of `permanode`, if it was computed at exactly `version`
    pub async fn get(&self, permanode: &BlobRef, version: ViewVersion) -> Option<PermanodeView> {
        let found = self
            .inner
            .get(permanode)
            .await
            .filter(|entry| entry.version == version);

        match found {
            Some(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(permanode = %permanode, "view cache hit");
                Some(PermanodeView::clone(&entry.view))
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a view computed at `version`
    pub async fn insert(&self, permanode: BlobRef, version: ViewVersion, view: PermanodeView) {
        self.inner
            .insert(
                permanode,
                CachedView {
                    version,
                    view: Arc::new(view),
                },
            )
            .await;
    }

    /// Invalidate cache entry
    #[inline]
    pub async fn invalidate(&self, permanode: &BlobRef) {
        self.inner.invalidate(permanode).await;
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    /// Run pending maintenance so `entry_count` is exact
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

impl Default for ViewCache {
    /// Create cache with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permanode() -> BlobRef {
        BlobRef::compute(b"permanode")
    }

    #[tokio::test]
    async fn hit_requires_matching_claim_count() {
        let cache = ViewCache::new(100);
        cache.insert(permanode(), ViewVersion::new(3, 0), PermanodeView::new()).await;

        assert!(cache.get(&permanode(), ViewVersion::new(3, 0)).await.is_some());
        assert!(cache.get(&permanode(), ViewVersion::new(4, 0)).await.is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn hit_requires_matching_policy_generation() {
        let cache = ViewCache::new(100);
        cache.insert(permanode(), ViewVersion::new(2, 5), PermanodeView::new()).await;

        assert!(cache.get(&permanode(), ViewVersion::new(2, 6)).await.is_none());
        assert!(cache.get(&permanode(), ViewVersion::new(2, 5)).await.is_some());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = ViewCache::default();
        cache.insert(permanode(), ViewVersion::new(1, 0), PermanodeView::new()).await;
        cache.invalidate(&permanode()).await;
        assert!(cache.get(&permanode(), ViewVersion::new(1, 0)).await.is_none());
    }

    #[tokio::test]
    async fn entry_count_after_sync() {
        let cache = ViewCache::new(100);
        for n in 0..3u8 {
            cache
                .insert(BlobRef::compute(&[n]), ViewVersion::default(), PermanodeView::new())
                .await;
        }
        cache.sync().await;
        assert_eq!(cache.stats().entry_count, 3);

        cache.invalidate_all();
        cache.sync().await;
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[tokio::test]
    async fn ttl_expires_entries() {
        let cache = ViewCache::with_ttl(100, Duration::from_millis(50));
        cache.insert(permanode(), ViewVersion::default(), PermanodeView::new()).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get(&permanode(), ViewVersion::default()).await.is_none());
    }
}
