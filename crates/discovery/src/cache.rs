//! In-process TTL cache for expensive discovery results
//!
//! Entries are shared as `Arc<V>`: a reader holding an entry keeps it alive even
//! if the entry expires or is replaced concurrently. An expired entry stays in
//! the map until a refresh replaces it, and is served when the refresh fails.
//!
//! Entries older than [`STALE_RETENTION_FACTOR`] TTLs are purged on insert, and
//! the oldest entries are evicted once a cache holds more than its capacity.

use dashmap::DashMap;
use novel_hub_core::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const PREFIX_RANKING: &str = "ranking";
pub const PREFIX_POPULAR: &str = "popular";
pub const PREFIX_NEW_BOOKS: &str = "new_books";
pub const PREFIX_HOT_WORDS: &str = "hot_words";
pub const PREFIX_PROFILE: &str = "profile";

/// Default entry capacity of one cache
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Expired entries stay servable as stale values for this many TTLs
pub const STALE_RETENTION_FACTOR: u32 = 4;

struct CacheEntry<V> {
    value: Arc<V>,
    inserted_at: Instant,
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            inserted_at: self.inserted_at,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    max_entries: usize,
    entries: DashMap<String, CacheEntry<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Send + Sync> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    fn retention(&self) -> Duration {
        self.ttl.saturating_mul(STALE_RETENTION_FACTOR)
    }

    /// Cache key in format `{prefix}:{sha256(json(data))}`
    pub fn generate_key<T: Serialize>(prefix: &str, data: &T) -> String {
        let json = serde_json::to_vec(data).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        format!("{}:{}", prefix, hex::encode(hasher.finalize()))
    }

    /// Fresh entry, if any
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let entry = self.entries.get(key).map(|e| e.value().clone());
        match entry {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, key, "Cache hit");
                Some(entry.value)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, key, "Cache miss");
                None
            }
        }
    }

    pub fn insert(&self, key: String, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                inserted_at: Instant::now(),
            },
        );
        self.evict();
        value
    }

    /// Drops entries past stale retention, then the oldest beyond capacity
    fn evict(&self) {
        let before = self.entries.len();
        let retention = self.retention();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < retention);

        let overflow = self.entries.len().saturating_sub(self.max_entries);
        if overflow > 0 {
            let mut by_age: Vec<(String, Instant)> = self
                .entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().inserted_at))
                .collect();
            by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
            for (key, _) in by_age.into_iter().take(overflow) {
                self.entries.remove(&key);
            }
        }

        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(cache = self.name, evicted, "Evicted cache entries");
        }
    }

    /// Returns the fresh entry or computes and stores a new one.
    ///
    /// When the computation fails and an expired entry exists, the expired
    /// value is served instead of the error.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: String, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        match compute().await {
            Ok(value) => Ok(self.insert(key, value)),
            Err(e) => {
                let retention = self.retention();
                let stale = self
                    .entries
                    .get(&key)
                    .filter(|entry| entry.inserted_at.elapsed() < retention)
                    .map(|entry| Arc::clone(&entry.value));
                match stale {
                    Some(value) => {
                        warn!(cache = self.name, key = %key, error = %e, "Refresh failed, serving stale entry");
                        Ok(value)
                    }
                    None => Err(e),
                }
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
        debug!(cache = self.name, "Cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novel_hub_core::DiscoveryError;

    #[test]
    fn test_generate_key_is_stable() {
        let a = TtlCache::<u32>::generate_key(PREFIX_RANKING, &("week", 10));
        let b = TtlCache::<u32>::generate_key(PREFIX_RANKING, &("week", 10));
        let c = TtlCache::<u32>::generate_key(PREFIX_RANKING, &("week", 11));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("ranking:"));
        assert_eq!(a.len(), "ranking:".len() + 64);
    }

    #[test]
    fn test_hit_and_miss_are_counted() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        assert!(cache.get("k").is_none());
        cache.insert("k".to_string(), 5);
        assert_eq!(*cache.get("k").unwrap(), 5);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = TtlCache::new("test", Duration::from_millis(0));
        cache.insert("k".to_string(), 1);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_held_value_survives_replacement() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        let held = cache.insert("k".to_string(), vec![1, 2, 3]);
        cache.insert("k".to_string(), vec![4]);
        assert_eq!(*held, vec![1, 2, 3]);
        assert_eq!(*cache.get("k").unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn test_compute_once_while_fresh() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        let first = cache
            .get_or_try_insert_with("k".to_string(), || async { Ok(1) })
            .await
            .unwrap();
        let second = cache
            .get_or_try_insert_with("k".to_string(), || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(*first, 1);
        assert_eq!(*second, 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_entries() {
        let cache = TtlCache::new("test", Duration::from_secs(60)).with_max_entries(2);
        cache.insert("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".to_string(), 2);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c".to_string(), 3);

        assert!(cache.get("a").is_none());
        assert_eq!(*cache.get("b").unwrap(), 2);
        assert_eq!(*cache.get("c").unwrap(), 3);
        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_entries_past_retention_are_purged_on_insert() {
        let cache = TtlCache::new("test", Duration::from_millis(5));
        for user in 0..100 {
            cache.insert(format!("profile:{}", user), user);
        }
        std::thread::sleep(Duration::from_millis(30));
        cache.insert("profile:fresh".to_string(), 0);

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.evictions, 100);
    }

    #[tokio::test]
    async fn test_stale_value_served_when_refresh_fails() {
        let cache = TtlCache::new("test", Duration::from_millis(50));
        cache.insert("k".to_string(), 7);
        tokio::time::sleep(Duration::from_millis(60)).await;

        let value = cache
            .get_or_try_insert_with("k".to_string(), || async {
                Err(DiscoveryError::internal("store down"))
            })
            .await
            .unwrap();
        assert_eq!(*value, 7);
    }

    #[tokio::test]
    async fn test_error_without_stale_value_propagates() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        let result = cache
            .get_or_try_insert_with("k".to_string(), || async {
                Err(DiscoveryError::internal("store down"))
            })
            .await;
        assert!(result.is_err());
    }
}
