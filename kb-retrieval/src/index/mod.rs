//! Vector index boundary
//!
//! The similarity index itself lives outside this crate. [`VectorIndex`] is
//! the seam: the retriever only calls `search`; the collection manager calls
//! `delete_collection`; ingestion calls `upsert`.

pub mod memory;

pub use memory::InMemoryVectorIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Free-form metadata attached to chunks and hits
pub type Metadata = HashMap<String, serde_json::Value>;

/// Metadata equality filter
///
/// A `BTreeMap` so that iteration and serialization order are canonical.
pub type MetadataFilter = BTreeMap<String, serde_json::Value>;

/// Errors reported by a vector index backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// The backend could not be reached or refused the request
    #[error("index backend unavailable: {0}")]
    Unavailable(String),

    /// The backend has no collection with this id
    #[error("collection missing from index: {0}")]
    CollectionMissing(String),

    /// Any other backend failure
    #[error("index backend error: {0}")]
    Backend(String),
}

/// One retrievable unit of text, as written by the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique within its collection
    pub chunk_id: String,
    pub collection_id: String,
    pub text: String,
    /// URL or path the text was taken from
    pub source: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentChunk {
    pub fn new(
        chunk_id: impl Into<String>,
        collection_id: impl Into<String>,
        text: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            collection_id: collection_id.into(),
            text: text.into(),
            source: source.into(),
            metadata: Metadata::new(),
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A raw similarity hit as returned by the index
///
/// `text` and `score` are optional because backends do not always fill
/// them; hits missing either are dropped during post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub chunk_id: String,
    pub text: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Distance to the query; lower is more similar
    pub score: Option<f64>,
}

impl RawHit {
    pub fn new(chunk_id: impl Into<String>, text: impl Into<String>, score: f64) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text: Some(text.into()),
            metadata: Metadata::new(),
            score: Some(score),
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Approximate nearest-neighbor index partitioned by collection
///
/// Implementations must be `Send + Sync`; the retriever shares one instance
/// across all concurrent callers. Timeouts are applied by the caller.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `limit` hits for `query`, honoring the metadata filter
    async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RawHit>, IndexError>;

    /// Insert or replace chunks; returns how many were written
    async fn upsert(
        &self,
        collection: &str,
        chunks: Vec<DocumentChunk>,
    ) -> Result<usize, IndexError>;

    /// Drop a collection and all its chunks; returns whether it existed
    async fn delete_collection(&self, collection: &str) -> Result<bool, IndexError>;

    async fn collection_exists(&self, collection: &str) -> Result<bool, IndexError>;
}

/// Check a metadata map against an equality filter
///
/// Every filter pair must be present with an equal value; a missing key is
/// a non-match.
pub fn metadata_matches(metadata: &Metadata, filter: &MetadataFilter) -> bool {
    filter
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}
