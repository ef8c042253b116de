//! End-to-end tests for the read-through retriever
//!
//! These tests verify:
//! - Request validation and collection readiness checks
//! - Post-processing of scripted index hits
//! - Cache hits bypassing the index and the processor
//! - Index failures and timeouts surfacing as `IndexUnavailable`
//! - Concurrent retrieval

use async_trait::async_trait;
use kb_retrieval::{
    CacheConfig, CollectionStatus, CollectionUpdate, DocumentChunk, InMemoryVectorIndex,
    IndexError, MetadataFilter, RawHit, RetrievalError, RetrievalRequest, Retriever,
    RetrieverConfig, SortStrategy, VectorIndex,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Index that returns a fixed list of hits and records each call's limit
struct ScriptedIndex {
    hits: Vec<RawHit>,
    calls: AtomicUsize,
    limits: Mutex<Vec<usize>>,
}

impl ScriptedIndex {
    fn new(hits: Vec<RawHit>) -> Self {
        Self {
            hits,
            calls: AtomicUsize::new(0),
            limits: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    async fn search(
        &self,
        _collection: &str,
        _query: &str,
        limit: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RawHit>, IndexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.limits.lock().unwrap().push(limit);
        Ok(self.hits.clone())
    }

    async fn upsert(
        &self,
        _collection: &str,
        chunks: Vec<DocumentChunk>,
    ) -> Result<usize, IndexError> {
        Ok(chunks.len())
    }

    async fn delete_collection(&self, _collection: &str) -> Result<bool, IndexError> {
        Ok(true)
    }

    async fn collection_exists(&self, _collection: &str) -> Result<bool, IndexError> {
        Ok(true)
    }
}

async fn ready(retriever: &Retriever, id: &str) {
    retriever
        .create_collection(id, id, "docs", "/data")
        .await
        .unwrap();
    retriever
        .update_collection(id, CollectionUpdate::new().status(CollectionStatus::Ready))
        .await
        .unwrap();
}

async fn wiki_retriever(config: RetrieverConfig) -> (Retriever, Arc<InMemoryVectorIndex>) {
    let index = Arc::new(InMemoryVectorIndex::new());
    index
        .upsert(
            "genshin",
            vec![
                DocumentChunk::new("c1", "genshin", "Diluc wields a claymore", "wiki/diluc")
                    .with_metadata("page", "Characters"),
                DocumentChunk::new("c2", "genshin", "Claymore weapons are heavy", "wiki/weapons")
                    .with_metadata("page", "Weapons"),
                DocumentChunk::new("c3", "genshin", "Fishing spots in Mondstadt", "wiki/fishing")
                    .with_metadata("page", "Fishing"),
            ],
        )
        .await
        .unwrap();

    let retriever = Retriever::new(config, index.clone()).unwrap();
    ready(&retriever, "genshin").await;
    (retriever, index)
}

#[tokio::test]
async fn test_end_to_end_dedup_scenario() {
    let index = Arc::new(ScriptedIndex::new(vec![
        RawHit::new("1", "A", 0.2),
        RawHit::new("2", "B", 0.8),
        RawHit::new("3", "A", 0.3),
    ]));
    let retriever = Retriever::new(RetrieverConfig::default(), index.clone()).unwrap();
    ready(&retriever, "kb").await;

    let passages = retriever
        .retrieve(&RetrievalRequest::new("query", "kb").with_top_k(2))
        .await
        .unwrap();

    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].text, "A");
    assert_eq!(passages[0].score, 0.2);
    // over-fetch: top_k * 2
    assert_eq!(*index.limits.lock().unwrap(), vec![4]);
}

#[tokio::test]
async fn test_cache_hit_bypasses_index_and_processing() {
    let (retriever, index) = wiki_retriever(RetrieverConfig::default()).await;
    let request = RetrievalRequest::new("diluc claymore", "genshin");

    let first = retriever.retrieve(&request).await.unwrap();
    let second = retriever.retrieve(&request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].chunk_id, "c1");
    assert_eq!(first[0].source.as_deref(), Some("wiki/diluc"));
    assert_eq!(index.search_calls(), 1);
    assert_eq!(retriever.processed_batches(), 1);

    let stats = retriever.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 1);
}

#[tokio::test]
async fn test_cache_opt_out() {
    let (retriever, index) = wiki_retriever(RetrieverConfig::default()).await;
    let request = RetrievalRequest::new("diluc", "genshin").with_cache(false);

    retriever.retrieve(&request).await.unwrap();
    retriever.retrieve(&request).await.unwrap();

    assert_eq!(index.search_calls(), 2);
    assert_eq!(retriever.cache_stats().await.size, 0);
}

#[tokio::test]
async fn test_filter_and_sort_options() {
    let (retriever, _) = wiki_retriever(RetrieverConfig::default()).await;

    let filtered = retriever
        .retrieve(
            &RetrievalRequest::new("claymore", "genshin").with_filter_entry("page", "Weapons"),
        )
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].chunk_id, "c2");

    let by_relevance = retriever
        .retrieve(
            &RetrievalRequest::new("diluc claymore", "genshin")
                .with_top_k(2)
                .with_sort(SortStrategy::ByRelevance),
        )
        .await
        .unwrap();
    assert_eq!(by_relevance[0].chunk_id, "c1");
    assert!(by_relevance[0].relevance.is_some());
}

#[tokio::test]
async fn test_validation_errors() {
    let (retriever, index) = wiki_retriever(RetrieverConfig::default()).await;

    assert!(matches!(
        retriever.retrieve(&RetrievalRequest::new("  ", "genshin")).await,
        Err(RetrievalError::InvalidRequest(_))
    ));
    assert!(matches!(
        retriever.retrieve(&RetrievalRequest::new("q", "missing")).await,
        Err(RetrievalError::CollectionNotFound(_))
    ));

    retriever
        .create_collection("building", "Building", "docs", "/data")
        .await
        .unwrap();
    assert!(matches!(
        retriever.retrieve(&RetrievalRequest::new("q", "building")).await,
        Err(RetrievalError::CollectionNotReady {
            status: CollectionStatus::Building,
            ..
        })
    ));

    assert_eq!(index.search_calls(), 0);
}

#[tokio::test]
async fn test_zero_top_k_returns_empty_without_search() {
    let (retriever, index) = wiki_retriever(RetrieverConfig::default()).await;

    let passages = retriever
        .retrieve(&RetrievalRequest::new("diluc", "genshin").with_top_k(0))
        .await
        .unwrap();

    assert!(passages.is_empty());
    assert_eq!(index.search_calls(), 0);
    assert_eq!(retriever.cache_stats().await.size, 0);
}

#[tokio::test]
async fn test_index_timeout_is_not_cached() {
    let config = RetrieverConfig::builder()
        .index_timeout(Duration::from_millis(20))
        .build();
    let (retriever, index) = wiki_retriever(config).await;
    index.set_latency(Duration::from_millis(200));

    let request = RetrievalRequest::new("diluc", "genshin");
    let err = retriever.retrieve(&request).await.unwrap_err();
    assert!(matches!(err, RetrievalError::IndexUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(retriever.cache_stats().await.size, 0);

    // recovers once the index is fast again
    index.set_latency(Duration::ZERO);
    assert!(!retriever.retrieve(&request).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_index_failure_is_not_cached() {
    let (retriever, index) = wiki_retriever(RetrieverConfig::default()).await;
    index.set_unavailable(true);

    let request = RetrievalRequest::new("diluc", "genshin");
    assert!(matches!(
        retriever.retrieve(&request).await,
        Err(RetrievalError::IndexUnavailable(_))
    ));
    assert_eq!(retriever.cache_stats().await.size, 0);

    index.set_unavailable(false);
    retriever.retrieve(&request).await.unwrap();
    assert_eq!(index.search_calls(), 2);
}

#[tokio::test]
async fn test_ready_collection_without_chunks_returns_empty() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let retriever = Retriever::new(RetrieverConfig::default(), index.clone()).unwrap();
    ready(&retriever, "empty").await;

    assert!(retriever.get_collection("empty").await.is_some());
    let passages = retriever
        .retrieve(&RetrievalRequest::new("q", "empty"))
        .await
        .unwrap();
    assert!(passages.is_empty());
    assert_eq!(index.search_calls(), 1);

    // later upserts become visible once the empty result is dropped
    index
        .upsert("empty", vec![DocumentChunk::new("c1", "empty", "q answer", "src")])
        .await
        .unwrap();
    retriever.clear_cache(Some("empty")).await;
    let passages = retriever
        .retrieve(&RetrievalRequest::new("q", "empty"))
        .await
        .unwrap();
    assert_eq!(passages.len(), 1);
}

#[tokio::test]
async fn test_expired_results_are_recomputed() {
    let config = RetrieverConfig::builder()
        .cache(CacheConfig::builder().default_ttl(Duration::from_millis(1)).build())
        .build();
    let (retriever, index) = wiki_retriever(config).await;
    let request = RetrievalRequest::new("diluc", "genshin");

    retriever.retrieve(&request).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    retriever.retrieve(&request).await.unwrap();

    assert_eq!(index.search_calls(), 2);
    assert_eq!(retriever.cache_stats().await.expirations, 1);
}

#[tokio::test]
async fn test_clear_cache() {
    let (retriever, _) = wiki_retriever(RetrieverConfig::default()).await;
    ready(&retriever, "other").await;

    retriever
        .retrieve(&RetrievalRequest::new("diluc", "genshin"))
        .await
        .unwrap();
    retriever
        .retrieve(&RetrievalRequest::new("fishing", "genshin"))
        .await
        .unwrap();
    assert_eq!(retriever.cache_stats().await.size, 2);

    assert_eq!(retriever.clear_cache(Some("other")).await, 0);
    assert_eq!(retriever.clear_cache(Some("genshin")).await, 2);
    assert_eq!(retriever.clear_cache(None).await, 0);
}

#[tokio::test]
async fn test_concurrent_retrieval() {
    let (retriever, index) = wiki_retriever(RetrieverConfig::default()).await;
    let retriever = Arc::new(retriever);

    let queries = ["diluc", "claymore", "fishing", "mondstadt"];
    let tasks = (0..32).map(|i| {
        let retriever = retriever.clone();
        let query = queries[i % queries.len()];
        tokio::spawn(async move {
            retriever
                .retrieve(&RetrievalRequest::new(query, "genshin"))
                .await
        })
    });

    for result in futures::future::join_all(tasks).await {
        let passages = result.unwrap().unwrap();
        assert!(!passages.is_empty());
    }

    let stats = retriever.cache_stats().await;
    assert_eq!(stats.size, queries.len());
    assert_eq!(stats.hits + stats.misses, 32);
    // without single-flight, concurrent identical misses may each search
    assert!(index.search_calls() >= queries.len());
    assert_eq!(index.search_calls() as u64, stats.misses);
}

#[tokio::test]
async fn test_search_uses_configured_top_k() {
    let config = RetrieverConfig::builder().default_top_k(1).build();
    let (retriever, _) = wiki_retriever(config).await;

    let passages = retriever.search("claymore", "genshin").await.unwrap();
    assert_eq!(passages.len(), 1);
}
