//! # Query Result Cache
//!
//! Read-through cache for processed retrieval results.
//!
//! ## Features
//!
//! - **TTL-Based Expiration**: checked lazily on every read, with an optional background sweep
//! - **LRU Eviction**: hard entry-count bound, least recently used entry goes first
//! - **Collection-Scoped Invalidation**: drop every result computed from one collection
//! - **Deterministic Keys**: SHA-256 digest over the normalized request
//!
//! ## Example
//!
//! ```rust
//! use kb_retrieval::cache::{CacheConfig, CacheStore};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = CacheConfig::builder()
//!     .default_ttl(Duration::from_secs(300))
//!     .max_entries(1_000)
//!     .build();
//!
//! let cache: CacheStore<Vec<String>> = CacheStore::new(config);
//!
//! cache.insert("retrieval:kb1:abc".to_string(), vec!["passage".to_string()], "kb1").await;
//!
//! if let Some(value) = cache.get("retrieval:kb1:abc").await {
//!     println!("Cache hit: {:?}", value);
//! }
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod invalidation;
pub mod key;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata};
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use key::CacheKeyBuilder;
pub use store::{spawn_auto_cleanup, CacheStore};
pub use types::{CacheKey, CacheStats};
