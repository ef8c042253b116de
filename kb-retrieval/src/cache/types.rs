//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Cache key type - a namespaced, digest-based string
pub type CacheKey = String;

/// Point-in-time snapshot of cache counters
///
/// `hits`, `misses`, `evictions`, `expirations` and `invalidations` only ever
/// grow; `size` is the live entry count at the time of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Number of entries currently in cache
    pub size: usize,

    /// Hard upper bound on entry count
    pub max_size: usize,

    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses (including reads of expired entries)
    pub misses: u64,

    /// Number of entries evicted by LRU pressure
    pub evictions: u64,

    /// Number of entries removed because their TTL ran out
    pub expirations: u64,

    /// Number of entries removed by explicit invalidation
    pub invalidations: u64,

    /// Default time-to-live applied by the owning retriever
    pub ttl: Duration,
}

impl CacheStats {
    /// Fraction of lookups served from cache, in `0.0..=1.0`
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total number of lookups
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ size: {}/{}, hits: {}, misses: {}, evictions: {}, \
             hit_rate: {:.2}%, ttl: {}s }}",
            self.size,
            self.max_size,
            self.hits,
            self.misses,
            self.evictions,
            self.hit_rate() * 100.0,
            self.ttl.as_secs()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };

        assert_eq!(stats.hit_rate(), 0.8);
        assert_eq!(stats.requests(), 100);
    }

    #[test]
    fn test_cache_stats_zero_requests() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_cache_stats_display() {
        let stats = CacheStats {
            size: 75,
            max_size: 1000,
            hits: 100,
            misses: 50,
            evictions: 10,
            expirations: 5,
            invalidations: 3,
            ttl: Duration::from_secs(300),
        };

        let display = format!("{}", stats);
        assert!(display.contains("size: 75/1000"));
        assert!(display.contains("hits: 100"));
        assert!(display.contains("hit_rate: 66.67%"));
        assert!(display.contains("ttl: 300s"));
    }
}
