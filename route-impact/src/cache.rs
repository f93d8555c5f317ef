//! Bounded cache for coordinate match results.
//!
//! Keys are coordinates rounded to a fixed number of decimal places plus the
//! search radius, so repeated alerts at the same spot share one entry while
//! cardinality stays bounded. Hit and miss counters accumulate until the cache
//! is cleared.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache as MokaCache;
use moka::policy::EvictionPolicy;
use serde::Serialize;

/// Which entry goes when the cache is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eviction {
    /// Least recently used.
    #[default]
    Lru,
    /// Frequency-aware admission (TinyLFU).
    TinyLfu,
}

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries.
    pub max_capacity: u64,

    /// Decimal places kept when rounding coordinates into keys.
    pub coordinate_precision: u32,

    pub eviction: Eviction,

    /// Optional TTL. Entries otherwise live until evicted or the feed reloads.
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    /// Set the capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Set the eviction policy.
    pub fn with_eviction(mut self, eviction: Eviction) -> Self {
        self.eviction = eviction;
        self
    }

    /// Set the key rounding precision.
    pub fn with_coordinate_precision(mut self, places: u32) -> Self {
        self.coordinate_precision = places;
        self
    }

    /// Expire entries after `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1000,
            coordinate_precision: 6,
            eviction: Eviction::Lru,
            ttl: None,
        }
    }
}

/// Cache key for coordinate queries: rounded latitude, longitude and radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lat: i64,
    lng: i64,
    radius_m: i64,
}

impl CacheKey {
    /// Round a query into a key. Radius is kept to the metre.
    pub fn new(lat: f64, lng: f64, radius_m: f64, precision: u32) -> Self {
        let scale = 10f64.powi(precision as i32);
        Self {
            lat: (lat * scale).round() as i64,
            lng: (lng * scale).round() as i64,
            radius_m: radius_m.round() as i64,
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 when there were no lookups.
    pub hit_rate: f64,
}

/// A bounded concurrent cache with hit/miss accounting.
pub struct ResultCache<K, V> {
    entries: MokaCache<K, V>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> ResultCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let policy = match config.eviction {
            Eviction::Lru => EvictionPolicy::lru(),
            Eviction::TinyLfu => EvictionPolicy::tiny_lfu(),
        };
        let mut builder = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .eviction_policy(policy);
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            entries: builder.build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up an entry, counting a hit or a miss.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.get_valid(key, |_| true).await
    }

    /// Look up an entry that must also pass `is_valid`.
    ///
    /// An entry failing the check is dropped and counted as a miss.
    pub async fn get_valid(&self, key: &K, is_valid: impl Fn(&V) -> bool) -> Option<V> {
        match self.entries.get(key).await {
            Some(value) if is_valid(&value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(_) => {
                self.entries.invalidate(key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace an entry.
    pub async fn insert(&self, key: K, value: V) {
        self.entries.insert(key, value).await;
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Current counters. Applies pending maintenance first so the entry count
    /// is up to date.
    pub async fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks().await;
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            entries: self.entries.entry_count(),
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_capacity, 1000);
        assert_eq!(config.coordinate_precision, 6);
        assert_eq!(config.eviction, Eviction::Lru);
        assert_eq!(config.ttl, None);
    }

    #[test]
    fn key_rounding() {
        let a = CacheKey::new(54.900_000_1, -1.569_531_4, 500.0, 6);
        let b = CacheKey::new(54.900_000_4, -1.569_531_2, 500.2, 6);
        assert_eq!(a, b);

        let c = CacheKey::new(54.900_001, -1.569_531, 500.0, 6);
        assert_ne!(a, c);

        // Coarser precision merges nearby points
        let d = CacheKey::new(54.9001, -1.5696, 300.0, 3);
        let e = CacheKey::new(54.9004, -1.5704, 300.0, 3);
        assert_eq!(d, e);

        assert_ne!(
            CacheKey::new(54.9, -1.57, 300.0, 6),
            CacheKey::new(54.9, -1.57, 500.0, 6)
        );
    }

    #[tokio::test]
    async fn counts_hits_and_misses() {
        let cache: ResultCache<CacheKey, u32> = ResultCache::new(&CacheConfig::default());
        let key = CacheKey::new(54.9, -1.57, 500.0, 6);

        assert_eq!(cache.get(&key).await, None);
        cache.insert(key, 7).await;
        assert_eq!(cache.get(&key).await, Some(7));
        assert_eq!(cache.get(&key).await, Some(7));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn invalid_entries_are_dropped() {
        let cache: ResultCache<u32, i32> = ResultCache::new(&CacheConfig::default());
        cache.insert(1, -5).await;

        assert_eq!(cache.get_valid(&1, |v| *v >= 0).await, None);
        assert_eq!(cache.get(&1).await, None);
        assert_eq!(cache.stats().await.misses, 2);
    }

    #[tokio::test]
    async fn clear_resets_counters() {
        let cache: ResultCache<u32, u32> = ResultCache::new(&CacheConfig::default());
        cache.insert(1, 1).await;
        cache.get(&1).await;
        cache.clear();

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(cache.get(&1).await, None);
    }

    #[tokio::test]
    async fn capacity_is_bounded() {
        let config = CacheConfig::default().with_max_capacity(2);
        let cache: ResultCache<u32, u32> = ResultCache::new(&config);

        for i in 0..10 {
            cache.insert(i, i).await;
        }
        assert!(cache.stats().await.entries <= 2);
    }

    #[tokio::test]
    async fn lru_evicts_least_recently_used() {
        let config = CacheConfig::default().with_max_capacity(2);
        let cache: ResultCache<u32, u32> = ResultCache::new(&config);

        cache.insert(1, 1).await;
        cache.insert(2, 2).await;
        cache.stats().await;
        cache.get(&1).await;
        cache.stats().await;
        cache.insert(3, 3).await;
        cache.stats().await;

        assert_eq!(cache.get(&1).await, Some(1));
        assert_eq!(cache.get(&2).await, None);
        assert_eq!(cache.get(&3).await, Some(3));
    }
}
