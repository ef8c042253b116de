//! Retrieval request and result types

use crate::cache::{CacheKey, CacheKeyBuilder};
use crate::error::{Result, RetrievalError};
use crate::index::{Metadata, MetadataFilter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace prefix of every retrieval cache key
pub const CACHE_NAMESPACE: &str = "retrieval";

/// Number of passages returned when the caller does not say
pub const DEFAULT_TOP_K: usize = 3;

/// How processed hits are ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    /// Ascending raw distance
    #[default]
    ByScore,
    /// Ascending distance weighted by text length and keyword misses
    ByRelevance,
}

impl SortStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortStrategy::ByScore => "by_score",
            SortStrategy::ByRelevance => "by_relevance",
        }
    }
}

impl fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortStrategy {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "score" | "by_score" => Ok(SortStrategy::ByScore),
            "relevance" | "by_relevance" => Ok(SortStrategy::ByRelevance),
            other => Err(RetrievalError::InvalidRequest(format!(
                "unknown sort strategy: {}",
                other
            ))),
        }
    }
}

/// One query against one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    pub collection: String,
    pub top_k: usize,
    /// Hits scoring below this are dropped; 0.0 disables the threshold
    pub min_score: f64,
    /// Key/value equality filter on hit metadata
    pub filter: Option<MetadataFilter>,
    pub sort: SortStrategy,
    pub use_cache: bool,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            collection: collection.into(),
            top_k: DEFAULT_TOP_K,
            min_score: 0.0,
            filter: None,
            sort: SortStrategy::default(),
            use_cache: true,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add one key/value pair to the metadata filter
    pub fn with_filter_entry(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.filter
            .get_or_insert_with(MetadataFilter::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_sort(mut self, sort: SortStrategy) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Check caller-supplied fields
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "collection id must not be empty".to_string(),
            ));
        }
        if !self.min_score.is_finite() {
            return Err(RetrievalError::InvalidRequest(format!(
                "min_score must be finite, got {}",
                self.min_score
            )));
        }
        Ok(())
    }

    /// Deterministic cache key for this request
    ///
    /// Covers every field that changes the processed result. The filter is
    /// a sorted map, so insertion order does not matter.
    pub fn cache_key(&self) -> CacheKey {
        let filter = self
            .filter
            .as_ref()
            .filter(|f| !f.is_empty())
            .map(|f| serde_json::to_string(f).unwrap_or_default())
            .unwrap_or_default();

        CacheKeyBuilder::new(CACHE_NAMESPACE)
            .collection(&self.collection)
            .param("query", &self.query)
            .param("top_k", self.top_k.to_string())
            .param("min_score", self.min_score.to_string())
            .param("filter", filter)
            .param("sort", self.sort.as_str())
            .build()
    }
}

/// One post-processed result, in consumer-visible order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub chunk_id: String,
    pub text: String,
    /// Source reference taken from the hit's `source` metadata, if any
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Raw distance from the index; lower is better
    pub score: f64,
    /// Weighted distance, set only when sorted by relevance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}
