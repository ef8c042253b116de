//! Cache entry management with TTL support

use crate::cache::types::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A cache entry with TTL and metadata
///
/// Entries are immutable once stored: a `put` for an existing key builds a
/// fresh entry and swaps it in.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cache key
    pub key: CacheKey,

    /// The cached value
    pub value: V,

    /// Collection the cached value was computed from
    pub collection: String,

    /// Entry metadata
    pub metadata: CacheMetadata,

    /// Monotonic insertion instant, used for expiry
    inserted: Instant,
}

impl<V> CacheEntry<V> {
    /// Create a new cache entry
    pub fn new(
        key: CacheKey,
        value: V,
        collection: impl Into<String>,
        ttl: Duration,
        tick: u64,
    ) -> Self {
        let now = Utc::now();

        Self {
            key,
            value,
            collection: collection.into(),
            metadata: CacheMetadata {
                created_at: now,
                accessed_at: now,
                ttl,
                access_count: 0,
                last_used: tick,
            },
            inserted: Instant::now(),
        }
    }

    /// Check if the entry has expired
    ///
    /// A zero TTL counts as expired immediately.
    pub fn is_expired(&self) -> bool {
        self.metadata.ttl.is_zero() || self.inserted.elapsed() >= self.metadata.ttl
    }

    /// Get time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        if self.is_expired() {
            None
        } else {
            self.metadata.ttl.checked_sub(self.inserted.elapsed())
        }
    }

    /// Get the age of the entry
    pub fn age(&self) -> Duration {
        self.inserted.elapsed()
    }

    /// Mark the entry as accessed at the given recency tick
    pub fn mark_accessed(&mut self, tick: u64) {
        self.metadata.accessed_at = Utc::now();
        self.metadata.access_count += 1;
        self.metadata.last_used = tick;
    }

    /// Check if the entry belongs to a collection
    pub fn belongs_to(&self, collection: &str) -> bool {
        self.collection == collection
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last access time
    pub accessed_at: DateTime<Utc>,

    /// Time-to-live the entry was stored with
    pub ttl: Duration,

    /// Number of times this entry has been read
    pub access_count: u64,

    /// Recency tick of the last insert or hit (for LRU ordering)
    pub last_used: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_cache_entry_creation() {
        let entry = CacheEntry::new(
            "test_key".to_string(),
            vec![1, 2, 3],
            "kb1",
            Duration::from_secs(300),
            7,
        );

        assert_eq!(entry.key, "test_key");
        assert_eq!(entry.value, vec![1, 2, 3]);
        assert!(entry.belongs_to("kb1"));
        assert!(!entry.belongs_to("kb2"));
        assert!(!entry.is_expired());
        assert_eq!(entry.metadata.last_used, 7);
        assert_eq!(entry.metadata.access_count, 0);
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new("test".to_string(), (), "kb", Duration::from_millis(50), 0);

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(80));
        assert!(entry.is_expired());
        assert!(entry.time_until_expiration().is_none());
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let entry = CacheEntry::new("test".to_string(), (), "kb", Duration::ZERO, 0);
        assert!(entry.is_expired());
    }

    #[test]
    fn test_mark_accessed() {
        let mut entry = CacheEntry::new("test".to_string(), (), "kb", Duration::from_secs(60), 1);

        let initial_time = entry.metadata.accessed_at;
        sleep(Duration::from_millis(5));
        entry.mark_accessed(9);

        assert_eq!(entry.metadata.access_count, 1);
        assert_eq!(entry.metadata.last_used, 9);
        assert!(entry.metadata.accessed_at > initial_time);
    }

    #[test]
    fn test_time_until_expiration() {
        let entry = CacheEntry::new("test".to_string(), (), "kb", Duration::from_secs(60), 0);

        let time_left = entry.time_until_expiration();
        assert!(time_left.is_some());
        assert!(time_left.unwrap() <= Duration::from_secs(60));
    }

    #[test]
    fn test_age() {
        let entry = CacheEntry::new("test".to_string(), (), "kb", Duration::from_secs(60), 0);

        sleep(Duration::from_millis(10));
        assert!(entry.age() >= Duration::from_millis(10));
    }
}
