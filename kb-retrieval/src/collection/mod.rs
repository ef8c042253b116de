//! Knowledge collection metadata and lifecycle
//!
//! A collection is one independently built knowledge store. Its status
//! follows a small state machine:
//!
//! ```text
//! building ──> ready ──> error
//!    │  ^        │
//!    │  └────────┘ (rebuild)
//!    └─────────────> error
//! ```
//!
//! `error` is terminal; a failed collection has to be deleted and created
//! again.

pub mod manager;

pub use manager::CollectionManager;

use crate::index::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Collection status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    /// Ingestion in progress; not queryable
    Building,
    /// Fully indexed and queryable
    Ready,
    /// Ingestion failed
    Error,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Building => "building",
            CollectionStatus::Ready => "ready",
            CollectionStatus::Error => "error",
        }
    }

    /// Parse status from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "building" => Some(CollectionStatus::Building),
            "ready" => Some(CollectionStatus::Ready),
            "error" | "failed" => Some(CollectionStatus::Error),
            _ => None,
        }
    }

    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// Staying in the same status is always allowed.
    pub fn can_transition_to(&self, next: CollectionStatus) -> bool {
        use CollectionStatus::*;
        matches!(
            (self, next),
            (Building, Building)
                | (Ready, Ready)
                | (Error, Error)
                | (Building, Ready)
                | (Building, Error)
                | (Ready, Error)
                | (Ready, Building)
        )
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata record for one knowledge collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category tag (e.g. "game", "docs")
    pub category: String,
    /// Where the collection's documents come from (URL or path)
    pub source: String,
    pub status: CollectionStatus,
    /// Maintained by ingestion; the retrieval path never touches it
    pub chunk_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Collection {
    /// New collection in `building` status
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            source: source.into(),
            status: CollectionStatus::Building,
            chunk_count: 0,
            created_at: now,
            updated_at: now,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.status == CollectionStatus::Ready
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Collection: {} ({})", self.name, self.id)?;
        writeln!(f, "  Category: {}", self.category)?;
        writeln!(f, "  Status:   {}", self.status)?;
        writeln!(f, "  Chunks:   {}", self.chunk_count)?;
        writeln!(f, "  Source:   {}", self.source)?;
        writeln!(f, "  Created:  {}", self.created_at.format("%Y-%m-%d %H:%M:%S"))?;
        write!(f, "  Updated:  {}", self.updated_at.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Partial update applied by [`CollectionManager::update`]
///
/// Unset fields are left as they are; metadata entries are merged key by
/// key into the existing map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionUpdate {
    pub status: Option<CollectionStatus>,
    pub chunk_count: Option<u64>,
    pub metadata: Option<Metadata>,
}

impl CollectionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: CollectionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn chunk_count(mut self, count: u64) -> Self {
        self.chunk_count = Some(count);
        self
    }

    /// Merge one metadata entry
    pub fn metadata_entry(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.chunk_count.is_none() && self.metadata.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CollectionStatus::*;

    #[test]
    fn test_status_transitions() {
        assert!(Building.can_transition_to(Ready));
        assert!(Building.can_transition_to(Error));
        assert!(Ready.can_transition_to(Error));
        assert!(Ready.can_transition_to(Building));
        assert!(Ready.can_transition_to(Ready));

        assert!(!Error.can_transition_to(Ready));
        assert!(!Error.can_transition_to(Building));
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&Ready).unwrap(), "\"ready\"");
        let parsed: CollectionStatus = serde_json::from_str("\"building\"").unwrap();
        assert_eq!(parsed, Building);
        assert_eq!(CollectionStatus::parse("ERROR"), Some(Error));
        assert_eq!(CollectionStatus::parse("unknown"), None);
    }

    #[test]
    fn test_new_collection() {
        let collection = Collection::new("genshin", "Genshin Wiki", "game", "https://wiki");
        assert_eq!(collection.status, Building);
        assert_eq!(collection.chunk_count, 0);
        assert!(!collection.is_ready());
        assert_eq!(collection.created_at, collection.updated_at);

        let report = collection.to_string();
        assert!(report.contains("Genshin Wiki (genshin)"));
        assert!(report.contains("Status:   building"));
    }

    #[test]
    fn test_collection_json_round_trip() {
        let mut collection = Collection::new("kb", "KB", "docs", "/data/kb");
        collection.metadata.insert("lang".to_string(), serde_json::json!("en"));

        let json = serde_json::to_string(&collection).unwrap();
        let back: Collection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, collection);
    }

    #[test]
    fn test_update_builder() {
        assert!(CollectionUpdate::new().is_empty());

        let update = CollectionUpdate::new()
            .status(Ready)
            .chunk_count(42)
            .metadata_entry("pages", 7);
        assert_eq!(update.status, Some(Ready));
        assert_eq!(update.chunk_count, Some(42));
        assert_eq!(update.metadata.unwrap().get("pages"), Some(&serde_json::json!(7)));
    }
}
