//! Main cache store implementation with TTL expiry and LRU eviction

use crate::cache::{
    config::CacheConfig,
    entry::CacheEntry,
    invalidation::{InvalidationEvent, InvalidationReason},
    types::{CacheKey, CacheStats},
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Bounded key/value cache with per-entry TTL and LRU eviction
///
/// - Thread-safe async access via a single `RwLock` that guards the entry
///   map and the recency index together
/// - Expiry is checked lazily on read; `cleanup_expired` is an optional sweep
/// - Capacity is a hard bound on entry count, enforced on every `put`
/// - Never returns errors: a miss is a normal outcome
pub struct CacheStore<V> {
    /// Cache configuration
    config: CacheConfig,

    /// Internal storage
    inner: RwLock<StoreInner<V>>,
}

/// State guarded by the store lock
struct StoreInner<V> {
    /// Main storage: key -> entry
    entries: HashMap<CacheKey, CacheEntry<V>>,

    /// LRU tracking: recency tick -> key, oldest first
    recency: BTreeMap<u64, CacheKey>,

    /// Monotonic recency counter
    tick: u64,

    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    invalidations: u64,
}

impl<V> StoreInner<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Remove an entry from both the map and the recency index
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.metadata.last_used);
        Some(entry)
    }

    /// Evict the least recently used entry
    fn evict_lru(&mut self) -> Option<CacheKey> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        self.evictions += 1;
        Some(key)
    }

    fn remove_matching<F>(&mut self, predicate: F) -> Vec<CacheKey>
    where
        F: Fn(&CacheEntry<V>) -> bool,
    {
        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            self.remove_entry(key);
        }
        keys
    }
}

impl<V: Clone> CacheStore<V> {
    /// Create a new cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        info!(
            "Initializing query cache (ttl: {:?}, max_entries: {})",
            config.default_ttl, config.max_entries
        );

        Self {
            config,
            inner: RwLock::new(StoreInner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
                invalidations: 0,
            }),
        }
    }

    /// Cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a live entry
    ///
    /// An expired entry is removed and reported as a miss. A hit refreshes
    /// the entry's recency.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.inner.write().await;
        let store = &mut *guard;

        let expired = match store.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                debug!("Cache miss: {}", key);
                store.misses += 1;
                return None;
            }
        };

        if expired {
            debug!("Cache entry expired: {}", key);
            store.remove_entry(key);
            store.misses += 1;
            store.expirations += 1;
            return None;
        }

        let tick = store.next_tick();
        let entry = store.entries.get_mut(key)?;
        store.recency.remove(&entry.metadata.last_used);
        entry.mark_accessed(tick);
        store.recency.insert(tick, key.to_string());
        store.hits += 1;

        debug!("Cache hit: {}", key);
        Some(entry.value.clone())
    }

    /// Insert a value with the configured default TTL
    pub async fn insert(&self, key: CacheKey, value: V, collection: &str) {
        let ttl = self.config.ttl_with_jitter();
        self.put(key, value, collection, ttl).await;
    }

    /// Insert or replace a value with an explicit TTL
    ///
    /// When the store is full and `key` is new, the single least recently
    /// used entry is evicted first.
    pub async fn put(&self, key: CacheKey, value: V, collection: &str, ttl: Duration) {
        let mut guard = self.inner.write().await;
        let store = &mut *guard;

        if store.remove_entry(&key).is_some() {
            debug!("Replacing cache entry: {}", key);
        } else {
            while store.entries.len() >= self.config.max_entries {
                match store.evict_lru() {
                    Some(evicted) => debug!("Evicting LRU cache entry: {}", evicted),
                    None => break,
                }
            }
            debug!("Inserting cache entry: {}", key);
        }

        if self.config.max_entries == 0 {
            return;
        }

        let tick = store.next_tick();
        let entry = CacheEntry::new(key.clone(), value, collection, ttl, tick);
        store.recency.insert(tick, key.clone());
        store.entries.insert(key, entry);
    }

    /// Check if a key is present (without updating recency or counters)
    pub async fn contains_key(&self, key: &str) -> bool {
        let store = self.inner.read().await;
        store.entries.contains_key(key)
    }

    /// Remove every entry matching the predicate; returns the removed count
    pub async fn invalidate<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CacheEntry<V>) -> bool + Send,
    {
        let mut store = self.inner.write().await;
        let removed = store.remove_matching(predicate).len();
        store.invalidations += removed as u64;
        removed
    }

    /// Remove every entry computed from `collection`
    pub async fn invalidate_collection(
        &self,
        collection: &str,
        reason: InvalidationReason,
    ) -> InvalidationEvent {
        let mut store = self.inner.write().await;
        let keys = store.remove_matching(|entry| entry.belongs_to(collection));
        store.invalidations += keys.len() as u64;
        drop(store);

        info!(
            "Invalidated {} cache entries for collection {} ({})",
            keys.len(),
            collection,
            reason
        );
        InvalidationEvent::new(reason, keys)
    }

    /// Clear all entries from the cache
    pub async fn clear(&self) -> usize {
        let mut store = self.inner.write().await;

        let count = store.entries.len();
        store.entries.clear();
        store.recency.clear();
        store.invalidations += count as u64;

        info!("Cleared {} entries from cache", count);
        count
    }

    /// Remove all expired entries
    pub async fn cleanup_expired(&self) -> Option<InvalidationEvent> {
        let mut store = self.inner.write().await;
        let keys = store.remove_matching(|entry| entry.is_expired());
        if keys.is_empty() {
            return None;
        }

        store.expirations += keys.len() as u64;
        debug!("Cleaned up {} expired entries", keys.len());

        let context = format!("Cleaned up {} expired entries", keys.len());
        Some(InvalidationEvent::new(InvalidationReason::Expired, keys).with_context(context))
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let store = self.inner.read().await;
        CacheStats {
            size: store.entries.len(),
            max_size: self.config.max_entries,
            hits: store.hits,
            misses: store.misses,
            evictions: store.evictions,
            expirations: store.expirations,
            invalidations: store.invalidations,
            ttl: self.config.default_ttl,
        }
    }

    /// Get number of entries in cache (expired-but-unread entries included)
    pub async fn len(&self) -> usize {
        let store = self.inner.read().await;
        store.entries.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        let store = self.inner.read().await;
        store.entries.is_empty()
    }
}

/// Spawn the background sweep when the cache config asks for it
///
/// Returns `None` when auto cleanup is disabled or no tokio runtime is
/// running. The sweep is an optimization only; expiry is still enforced on
/// every read.
pub fn spawn_auto_cleanup<V>(cache: Arc<CacheStore<V>>) -> Option<JoinHandle<()>>
where
    V: Clone + Send + Sync + 'static,
{
    if !cache.config.enable_auto_cleanup {
        return None;
    }

    let handle = tokio::runtime::Handle::try_current().ok()?;
    let interval = cache.config.cleanup_interval;
    info!("Starting automatic cache cleanup task (interval: {:?})", interval);

    Some(handle.spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if let Some(event) = cache.cleanup_expired().await {
                debug!("Auto cleanup removed {} entries", event.count());
            }
        }
    }))
}
