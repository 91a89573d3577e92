// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Caching layer for URL classifications
//!
//! Entries are keyed by artifact id and URL, so results produced by a
//! replaced model are never returned for the model that replaced it.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use shared_types::PredictionResult;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Default number of cached predictions
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Cache key for prediction results
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredictionCacheKey {
    /// Artifact that produced the prediction
    pub artifact_id: Uuid,
    /// URL exactly as it was classified
    pub url: String,
}

impl PredictionCacheKey {
    /// Create a new cache key
    pub fn new(artifact_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            artifact_id,
            url: url.into(),
        }
    }
}

/// Cached prediction with bookkeeping for expiry and eviction
#[derive(Debug, Clone)]
pub struct CachedPrediction {
    /// The cached classification
    pub result: PredictionResult,
    /// When the entry was stored
    pub cached_at: Instant,
    /// Last cache hit, or the store time
    pub last_accessed: Instant,
    /// Number of cache hits
    pub access_count: u64,
}

impl CachedPrediction {
    /// Create a new cache entry
    pub fn new(result: PredictionResult) -> Self {
        let now = Instant::now();
        Self {
            result,
            cached_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    /// Whether the entry is still fresh; entries never expire without a TTL
    pub fn is_valid(&self, ttl: Option<Duration>) -> bool {
        ttl.is_none_or(|ttl| self.cached_at.elapsed() < ttl)
    }

    fn accessed(&mut self) {
        self.access_count += 1;
        self.last_accessed = Instant::now();
    }
}

/// Counter names tracked in [`PredictionCache`] statistics
const HITS: &str = "cache_hits";
const MISSES: &str = "cache_misses";
const STORES: &str = "cache_stores";
const EVICTIONS: &str = "cache_evictions";
const EXPIRED: &str = "cache_expired";

/// Bounded, concurrent cache of classification results
#[derive(Debug)]
pub struct PredictionCache {
    predictions: DashMap<PredictionCacheKey, CachedPrediction>,
    ttl: Option<Duration>,
    capacity: usize,
    stats: DashMap<&'static str, u64>,
}

impl Default for PredictionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionCache {
    /// Cache with the default capacity and no expiry
    pub fn new() -> Self {
        Self::with_settings(None, DEFAULT_CAPACITY)
    }

    /// Cache with a custom TTL and capacity
    ///
    /// A capacity of zero disables caching.
    pub fn with_settings(ttl: Option<Duration>, capacity: usize) -> Self {
        Self {
            predictions: DashMap::new(),
            ttl,
            capacity,
            stats: DashMap::new(),
        }
    }

    /// Get the number of cached predictions
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    /// Check if the cache holds no predictions
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Get a cached prediction
    pub fn get(&self, key: &PredictionCacheKey) -> Option<PredictionResult> {
        if let Some(mut cached) = self.predictions.get_mut(key) {
            if cached.is_valid(self.ttl) {
                cached.accessed();
                self.increment_stat(HITS);
                trace!(artifact_id = %key.artifact_id, url = %key.url, "cache hit");
                return Some(cached.result.clone());
            }

            drop(cached);
            self.predictions.remove(key);
            self.increment_stat(EXPIRED);
            debug!(artifact_id = %key.artifact_id, url = %key.url, "removed expired cache entry");
        }

        self.increment_stat(MISSES);
        None
    }

    /// Store a prediction, evicting the least recently used entries when full
    ///
    /// Eviction runs after the insert, so concurrent stores never leave the
    /// cache above its capacity once they return.
    pub fn insert(&self, key: PredictionCacheKey, result: PredictionResult) {
        if self.capacity == 0 {
            return;
        }

        trace!(
            artifact_id = %key.artifact_id,
            url = %key.url,
            prediction = %result.prediction,
            size = self.predictions.len(),
            capacity = self.capacity,
            "storing prediction"
        );
        let replaced = self
            .predictions
            .insert(key.clone(), CachedPrediction::new(result))
            .is_some();
        self.increment_stat(STORES);

        if replaced || self.predictions.len() <= self.capacity {
            return;
        }

        // Expired entries go first; fall back to LRU when none were stale
        self.cleanup_expired();
        while self.predictions.len() > self.capacity {
            if !self.evict_least_recently_used(&key) {
                break;
            }
        }
    }

    fn evict_least_recently_used(&self, keep: &PredictionCacheKey) -> bool {
        let victim = self
            .predictions
            .iter()
            .filter(|item| item.key() != keep)
            .min_by(|a, b| {
                a.value()
                    .last_accessed
                    .cmp(&b.value().last_accessed)
                    .then(a.value().access_count.cmp(&b.value().access_count))
            })
            .map(|item| item.key().clone());

        let Some(victim) = victim else {
            return false;
        };

        // Another store may have evicted the same entry already
        if let Some((key, entry)) = self.predictions.remove(&victim) {
            self.increment_stat(EVICTIONS);
            info!(
                artifact_id = %key.artifact_id,
                url = %key.url,
                access_count = entry.access_count,
                age_ms = entry.cached_at.elapsed().as_millis(),
                remaining_predictions = self.predictions.len(),
                "evicted lru cache entry due to capacity limit"
            );
        }
        true
    }

    /// Drop entries produced by any artifact other than `artifact_id`
    pub fn retain_artifact(&self, artifact_id: Uuid) -> usize {
        let before = self.predictions.len();
        self.predictions.retain(|key, _| key.artifact_id == artifact_id);
        before.saturating_sub(self.predictions.len())
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }

        let before = self.predictions.len();
        self.predictions.retain(|_, cached| cached.is_valid(self.ttl));
        let removed = before.saturating_sub(self.predictions.len());

        if removed > 0 {
            *self.stats.entry(EXPIRED).or_insert(0) += removed as u64;
            debug!("Cleaned up {} expired cache entries", removed);
        }

        removed
    }

    /// Snapshot of the cache statistics
    pub fn stats(&self) -> CacheStats {
        let cache_hits = self.get_stat(HITS);
        let cache_misses = self.get_stat(MISSES);
        let lookups = cache_hits + cache_misses;
        let entries = self.predictions.len();

        CacheStats {
            entries,
            cache_hits,
            cache_misses,
            cache_stores: self.get_stat(STORES),
            cache_evictions: self.get_stat(EVICTIONS),
            cache_expired: self.get_stat(EXPIRED),
            hit_rate: if lookups > 0 {
                cache_hits as f64 / lookups as f64
            } else {
                0.0
            },
            utilization_rate: if self.capacity > 0 {
                entries as f64 / self.capacity as f64
            } else {
                0.0
            },
            capacity: self.capacity,
        }
    }

    fn increment_stat(&self, key: &'static str) {
        *self.stats.entry(key).or_insert(0) += 1;
    }

    fn get_stat(&self, key: &str) -> u64 {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Current number of entries
    pub entries: usize,
    /// Lookups answered from the cache
    pub cache_hits: u64,
    /// Lookups that found nothing usable
    pub cache_misses: u64,
    /// Predictions stored
    pub cache_stores: u64,
    /// Entries evicted for capacity
    pub cache_evictions: u64,
    /// Entries dropped after their TTL
    pub cache_expired: u64,
    /// Hits over lookups (0.0 to 1.0)
    pub hit_rate: f64,
    /// Entries over capacity (0.0 to 1.0)
    pub utilization_rate: f64,
    /// Maximum number of entries
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use std::thread;

    use shared_types::UrlLabel;

    use super::*;

    fn result(url: &str, p: f64) -> PredictionResult {
        PredictionResult::from_probability(url, p)
    }

    #[test]
    fn store_and_hit() {
        let cache = PredictionCache::new();
        let key = PredictionCacheKey::new(Uuid::new_v4(), "http://a.example");

        assert_eq!(cache.get(&key), None);
        cache.insert(key.clone(), result("http://a.example", 0.9));

        let cached = cache.get(&key).unwrap();
        assert_eq!(cached.prediction, UrlLabel::Malicious);

        let stats = cache.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_stores, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn keys_are_scoped_by_artifact() {
        let cache = PredictionCache::new();
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();

        cache.insert(PredictionCacheKey::new(old, "u"), result("u", 0.1));
        assert!(cache.get(&PredictionCacheKey::new(new, "u")).is_none());

        cache.insert(PredictionCacheKey::new(new, "u"), result("u", 0.8));
        assert_eq!(cache.retain_artifact(new), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&PredictionCacheKey::new(new, "u")).is_some());
    }

    #[test]
    fn entries_expire() {
        let cache = PredictionCache::with_settings(Some(Duration::from_millis(10)), 100);
        let key = PredictionCacheKey::new(Uuid::new_v4(), "u");
        cache.insert(key.clone(), result("u", 0.2));
        assert!(cache.get(&key).is_some());

        thread::sleep(Duration::from_millis(15));

        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().cache_expired, 1);
    }

    #[test]
    fn cleanup_removes_expired() {
        let cache = PredictionCache::with_settings(Some(Duration::from_millis(10)), 100);
        let id = Uuid::new_v4();
        cache.insert(PredictionCacheKey::new(id, "a"), result("a", 0.2));
        cache.insert(PredictionCacheKey::new(id, "b"), result("b", 0.7));

        thread::sleep(Duration::from_millis(15));

        assert_eq!(cache.cleanup_expired(), 2);
        assert!(cache.is_empty());
        assert_eq!(PredictionCache::new().cleanup_expired(), 0);
    }

    #[test]
    fn lru_eviction() {
        let cache = PredictionCache::with_settings(None, 2);
        let id = Uuid::new_v4();
        let first = PredictionCacheKey::new(id, "first");
        let second = PredictionCacheKey::new(id, "second");
        let third = PredictionCacheKey::new(id, "third");

        cache.insert(first.clone(), result("first", 0.9));
        thread::sleep(Duration::from_millis(2));
        cache.insert(second.clone(), result("second", 0.1));
        thread::sleep(Duration::from_millis(2));

        // Touch the first entry so the second becomes least recently used
        assert!(cache.get(&first).is_some());
        cache.insert(third.clone(), result("third", 0.4));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&first).is_some());
        assert!(cache.get(&second).is_none());
        assert!(cache.get(&third).is_some());

        let stats = cache.stats();
        assert_eq!(stats.cache_evictions, 1);
        assert_eq!(stats.utilization_rate, 1.0);
    }

    #[test]
    fn concurrent_inserts_respect_capacity() {
        let cache = PredictionCache::with_settings(None, 8);
        let id = Uuid::new_v4();

        thread::scope(|scope| {
            for worker in 0..4 {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..50 {
                        let url = format!("http://w{}.example/{}", worker, i);
                        cache.insert(PredictionCacheKey::new(id, url.as_str()), result(&url, 0.3));
                    }
                });
            }
        });

        assert!(cache.len() <= 8, "len {}", cache.len());
        assert_eq!(cache.stats().cache_stores, 200);
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = PredictionCache::with_settings(None, 0);
        let key = PredictionCacheKey::new(Uuid::new_v4(), "u");
        cache.insert(key.clone(), result("u", 0.9));
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().utilization_rate, 0.0);
    }
}
