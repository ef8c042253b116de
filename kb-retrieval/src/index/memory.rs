//! In-memory [`VectorIndex`] for tests, demos and benches.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. "Similarity" is
//! term overlap: the distance of a chunk is `1 - matched/total` over the
//! query's lowercase whitespace-separated terms, so lower is better, the
//! same orientation a real distance-based index reports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{metadata_matches, DocumentChunk, IndexError, MetadataFilter, RawHit, VectorIndex};

/// In-memory index keyed by collection id.
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, Vec<DocumentChunk>>>,
    search_calls: AtomicUsize,
    latency_ms: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            search_calls: AtomicUsize::new(0),
            latency_ms: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of `search` calls served so far (including failed ones).
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Delay every `search` by `latency`, to exercise caller timeouts.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make every operation fail with [`IndexError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of chunks stored for a collection.
    pub fn chunk_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), IndexError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable(
                "index marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> IndexError {
    IndexError::Backend("index lock poisoned".to_string())
}

fn query_terms(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

fn term_distance(terms: &[String], text: &str) -> f64 {
    if terms.is_empty() {
        return 1.0;
    }
    let text = text.to_lowercase();
    let matched = terms.iter().filter(|t| text.contains(t.as_str())).count();
    1.0 - matched as f64 / terms.len() as f64
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RawHit>, IndexError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        self.check_available()?;

        let terms = query_terms(query);
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let chunks = collections
            .get(collection)
            .ok_or_else(|| IndexError::CollectionMissing(collection.to_string()))?;

        let mut hits: Vec<RawHit> = chunks
            .iter()
            .filter(|chunk| filter.map_or(true, |f| metadata_matches(&chunk.metadata, f)))
            .map(|chunk| {
                let mut metadata = chunk.metadata.clone();
                metadata
                    .entry("source".to_string())
                    .or_insert_with(|| chunk.source.clone().into());
                RawHit {
                    chunk_id: chunk.chunk_id.clone(),
                    text: Some(chunk.text.clone()),
                    metadata,
                    score: Some(term_distance(&terms, &chunk.text)),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            a.score
                .unwrap_or(f64::INFINITY)
                .total_cmp(&b.score.unwrap_or(f64::INFINITY))
        });
        hits.truncate(limit);

        debug!(
            "In-memory search in {}: {} hits (limit {})",
            collection,
            hits.len(),
            limit
        );
        Ok(hits)
    }

    async fn upsert(
        &self,
        collection: &str,
        chunks: Vec<DocumentChunk>,
    ) -> Result<usize, IndexError> {
        self.check_available()?;
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let stored = collections.entry(collection.to_string()).or_default();

        let written = chunks.len();
        for chunk in chunks {
            match stored.iter_mut().find(|c| c.chunk_id == chunk.chunk_id) {
                Some(existing) => *existing = chunk,
                None => stored.push(chunk),
            }
        }
        Ok(written)
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool, IndexError> {
        self.check_available()?;
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        Ok(collections.remove(collection).is_some())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, IndexError> {
        self.check_available()?;
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.contains_key(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(id: &str, text: &str, source: &str, page: &str) -> DocumentChunk {
        DocumentChunk::new(id, "wiki", text, source).with_metadata("page", page)
    }

    async fn seeded() -> InMemoryVectorIndex {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(
                "wiki",
                vec![
                    chunk("c1", "Diluc wields a claymore", "https://wiki/diluc", "Diluc"),
                    chunk("c2", "Claymore weapons are heavy", "https://wiki/weapons", "Weapons"),
                    chunk("c3", "Fishing spots in Mondstadt", "https://wiki/fishing", "Fishing"),
                ],
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let index = seeded().await;

        let hits = index.search("wiki", "diluc claymore", 10, None).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk_id, "c1");
        assert_eq!(hits[0].score, Some(0.0));
        assert_eq!(hits[1].chunk_id, "c2");
        assert_eq!(hits[1].score, Some(0.5));
        assert_eq!(hits[2].score, Some(1.0));
        assert_eq!(hits[0].metadata.get("source"), Some(&json!("https://wiki/diluc")));
        assert_eq!(index.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_search_limit_and_filter() {
        let index = seeded().await;

        let hits = index.search("wiki", "claymore", 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);

        let filter = MetadataFilter::from([("page".to_string(), json!("Weapons"))]);
        let hits = index.search("wiki", "claymore", 10, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c2");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_chunk_id() {
        let index = seeded().await;
        index
            .upsert("wiki", vec![DocumentChunk::new("c1", "wiki", "rewritten", "src")])
            .await
            .unwrap();

        assert_eq!(index.chunk_count("wiki"), 3);
        let hits = index.search("wiki", "rewritten", 1, None).await.unwrap();
        assert_eq!(hits[0].chunk_id, "c1");
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let index = InMemoryVectorIndex::new();
        let err = index.search("nope", "q", 3, None).await.unwrap_err();
        assert_eq!(err, IndexError::CollectionMissing("nope".to_string()));
        assert!(!index.collection_exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_collection() {
        let index = seeded().await;
        assert!(index.collection_exists("wiki").await.unwrap());
        assert!(index.delete_collection("wiki").await.unwrap());
        assert!(!index.delete_collection("wiki").await.unwrap());
        assert_eq!(index.chunk_count("wiki"), 0);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let index = seeded().await;
        index.set_unavailable(true);
        assert!(matches!(
            index.search("wiki", "q", 3, None).await,
            Err(IndexError::Unavailable(_))
        ));
        assert!(index.delete_collection("wiki").await.is_err());

        index.set_unavailable(false);
        assert!(index.collection_exists("wiki").await.unwrap());
    }
}
