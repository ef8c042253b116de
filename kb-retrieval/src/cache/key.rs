//! Deterministic cache key construction
//!
//! Keys have the shape `<namespace>:<collection>:<sha256 hex>`. The collection
//! stays readable so keys can be matched per collection; everything else is
//! folded into the digest in the order the parameters were added.

use crate::cache::types::CacheKey;
use sha2::{Digest, Sha256};

/// Separator between digest fields; cannot appear in a JSON string unescaped
const FIELD_SEPARATOR: u8 = 0x1f;

/// Cache key builder
pub struct CacheKeyBuilder {
    namespace: String,
    collection: String,
    params: Vec<(String, String)>,
}

impl CacheKeyBuilder {
    /// Create a new cache key builder
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            collection: String::new(),
            params: Vec::new(),
        }
    }

    /// Set the collection the key is scoped to
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Add a parameter to the digest
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Build the cache key
    pub fn build(self) -> CacheKey {
        let mut hasher = Sha256::new();
        hasher.update(self.collection.as_bytes());
        for (key, value) in &self.params {
            hasher.update([FIELD_SEPARATOR]);
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }

        format!(
            "{}:{}:{}",
            self.namespace,
            self.collection,
            hex::encode(hasher.finalize())
        )
    }
}
