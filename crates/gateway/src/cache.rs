//! In-memory response cache with per-entry TTL and an optional LRU bound.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use mikareads_core::{
    traits::ResponseCache,
    types::{CacheKey, UpstreamResponse},
};

/// Cache entry with absolute expiry. Never mutated once stored.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: UpstreamResponse,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// LRU-ordered entries plus a lower bound on their earliest expiry.
///
/// `earliest_expiry` may lag behind removals; it only has to be no later than
/// the true minimum so a purge scan is skipped when nothing can have expired.
struct Entries {
    lru: LruCache<CacheKey, CacheEntry>,
    earliest_expiry: Option<Instant>,
}

impl Entries {
    fn new() -> Self {
        Self {
            lru: LruCache::unbounded(),
            earliest_expiry: None,
        }
    }

    fn may_hold_expired(&self, now: Instant) -> bool {
        self.earliest_expiry.is_some_and(|at| at <= now)
    }

    fn purge(&mut self, now: Instant) -> usize {
        let expired: Vec<CacheKey> = self
            .lru
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.lru.pop(key);
        }
        self.earliest_expiry = self.lru.iter().map(|(_, entry)| entry.expires_at).min();
        expired.len()
    }
}

/// Process-local response cache.
///
/// Every operation runs under one lock, so a store is published atomically
/// and a racing lookup sees either the old or the new value. Expired entries
/// are dropped lazily on lookup, by [`ResponseCache::purge_expired`], or when
/// the size bound is exceeded. Live entries are only evicted, least recently
/// used first, once the bound is exceeded after expired ones are gone.
pub struct InMemoryResponseCache {
    entries: Mutex<Entries>,
    max_entries: Option<usize>,
}

impl InMemoryResponseCache {
    /// Create an unbounded cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries::new()),
            max_entries: None,
        }
    }

    /// Create a cache holding at most `max_entries` entries; 0 means unbounded.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::new()),
            max_entries: (max_entries > 0).then_some(max_entries),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache for InMemoryResponseCache {
    fn lookup(&self, key: &CacheKey) -> Option<UpstreamResponse> {
        let now = Instant::now();
        let mut entries = self.lock();

        let found = entries
            .lru
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));

        match found {
            Some(Some(value)) => Some(value),
            Some(None) => {
                entries.lru.pop(key);
                tracing::debug!(key = %key, "Dropped expired cache entry");
                None
            }
            None => None,
        }
    }

    fn store(&self, key: CacheKey, value: UpstreamResponse, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let now = Instant::now();
        let expires_at = now + ttl;

        let mut entries = self.lock();
        entries.lru.put(key, CacheEntry { value, expires_at });
        entries.earliest_expiry = Some(
            entries
                .earliest_expiry
                .map_or(expires_at, |at| at.min(expires_at)),
        );

        if let Some(max) = self.max_entries {
            if entries.lru.len() > max && entries.may_hold_expired(now) {
                entries.purge(now);
            }
            while entries.lru.len() > max {
                match entries.lru.pop_lru() {
                    Some((evicted, _)) => {
                        tracing::debug!(key = %evicted, "Evicted least recently used cache entry");
                    }
                    None => break,
                }
            }
        }
    }

    fn purge_expired(&self) -> usize {
        self.lock().purge(Instant::now())
    }

    fn len(&self) -> usize {
        self.lock().lru.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(id: &str) -> CacheKey {
        CacheKey::for_resource("manga", id, &[])
    }

    fn value(n: u64) -> UpstreamResponse {
        UpstreamResponse::json(json!({ "n": n }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_then_lookup_until_ttl() {
        let cache = InMemoryResponseCache::new();
        cache.store(key("a"), value(1), Duration::from_secs(600));

        assert_eq!(cache.lookup(&key("a")), Some(value(1)));

        tokio::time::advance(Duration::from_secs(599)).await;
        assert_eq!(cache.lookup(&key("a")), Some(value(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.lookup(&key("a")), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_isolated() {
        let cache = InMemoryResponseCache::new();
        cache.store(key("a"), value(1), Duration::from_secs(60));

        assert_eq!(cache.lookup(&key("b")), None);
        cache.store(key("b"), value(2), Duration::from_secs(60));
        assert_eq!(cache.lookup(&key("a")), Some(value(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_overwrites() {
        let cache = InMemoryResponseCache::new();
        cache.store(key("a"), value(1), Duration::from_secs(5));
        cache.store(key("a"), value(2), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.lookup(&key("a")), Some(value(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_bypasses_cache() {
        let cache = InMemoryResponseCache::new();
        cache.store(key("a"), value(1), Duration::ZERO);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_prefers_expired_entries() {
        let cache = InMemoryResponseCache::with_max_entries(2);
        cache.store(key("short"), value(1), Duration::from_secs(1));
        cache.store(key("long"), value(2), Duration::from_secs(600));

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.store(key("new"), value(3), Duration::from_secs(600));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(&key("long")), Some(value(2)));
        assert_eq!(cache.lookup(&key("new")), Some(value(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_evicts_least_recently_used() {
        let cache = InMemoryResponseCache::with_max_entries(2);
        cache.store(key("a"), value(1), Duration::from_secs(600));
        cache.store(key("b"), value(2), Duration::from_secs(600));

        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.lookup(&key("a")).is_some());
        cache.store(key("c"), value(3), Duration::from_secs(600));

        assert_eq!(cache.lookup(&key("b")), None);
        assert!(cache.lookup(&key("a")).is_some());
        assert!(cache.lookup(&key("c")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_still_purges_after_lagging_expiry() {
        let cache = InMemoryResponseCache::with_max_entries(2);
        cache.store(key("a"), value(1), Duration::from_secs(1));
        cache.store(key("b"), value(2), Duration::from_secs(600));
        // Nothing has expired yet, so "a" goes as the LRU victim
        cache.store(key("c"), value(3), Duration::from_secs(5));
        assert_eq!(cache.lookup(&key("a")), None);

        // "c" becomes most recently used, then expires
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.lookup(&key("c")).is_some());
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.store(key("d"), value(4), Duration::from_secs(600));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(&key("b")), Some(value(2)));
        assert_eq!(cache.lookup(&key("d")), Some(value(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = InMemoryResponseCache::new();
        cache.store(key("a"), value(1), Duration::from_secs(1));
        cache.store(key("b"), value(2), Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
