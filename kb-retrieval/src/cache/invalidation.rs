//! Cache invalidation reasons and events
//!
//! Entries leave the cache in four ways:
//! - TTL expiry, detected lazily on read or by an optional sweep
//! - LRU eviction under capacity pressure
//! - Collection-scoped invalidation when a collection is deleted or rebuilt
//! - Manual clearing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason for cache invalidation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Entry expired based on TTL
    Expired,

    /// Manual invalidation
    Manual,

    /// The collection was deleted
    CollectionDeleted { collection: String },

    /// The collection went back to `building`
    CollectionRebuilt { collection: String },

    /// The collection moved to `error`
    CollectionFailed { collection: String },
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "TTL expired"),
            InvalidationReason::Manual => write!(f, "manual invalidation"),
            InvalidationReason::CollectionDeleted { collection } => {
                write!(f, "collection deleted: {}", collection)
            }
            InvalidationReason::CollectionRebuilt { collection } => {
                write!(f, "collection rebuilt: {}", collection)
            }
            InvalidationReason::CollectionFailed { collection } => {
                write!(f, "collection failed: {}", collection)
            }
        }
    }
}

/// Record of one invalidation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Reason for invalidation
    pub reason: InvalidationReason,

    /// When the invalidation occurred
    pub timestamp: DateTime<Utc>,

    /// Keys that were removed
    pub keys: Vec<String>,

    /// Additional context
    pub context: Option<String>,
}

impl InvalidationEvent {
    /// Create a new invalidation event
    pub fn new(reason: InvalidationReason, keys: Vec<String>) -> Self {
        Self {
            reason,
            timestamp: Utc::now(),
            keys,
            context: None,
        }
    }

    /// Add context to the event
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }

    /// Number of entries removed
    pub fn count(&self) -> usize {
        self.keys.len()
    }
}
