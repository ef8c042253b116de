//! Retrieval orchestrator

use crate::cache::{spawn_auto_cleanup, CacheStats, CacheStore, InvalidationReason};
use crate::collection::{Collection, CollectionManager, CollectionUpdate};
use crate::config::RetrieverConfig;
use crate::error::{Result, RetrievalError};
use crate::index::{IndexError, VectorIndex};
use crate::retrieval::processor::ResultProcessor;
use crate::retrieval::request::{Passage, RetrievalRequest};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read-through retriever with collection lifecycle management
///
/// Everything is injected at construction; there is no global state. Safe
/// to share behind an `Arc` across any number of concurrent callers.
/// Concurrent identical misses may each search the index; the last write
/// to the cache wins.
pub struct Retriever {
    config: RetrieverConfig,
    cache: Arc<CacheStore<Vec<Passage>>>,
    index: Arc<dyn VectorIndex>,
    collections: CollectionManager,
    processor: ResultProcessor,
    cleanup_task: Option<JoinHandle<()>>,
}

impl Retriever {
    /// Retriever with in-memory collection metadata
    pub fn new(config: RetrieverConfig, index: Arc<dyn VectorIndex>) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(CacheStore::new(config.cache.clone()));
        let collections = CollectionManager::in_memory(cache.clone(), index.clone());
        Ok(Self::assemble(config, cache, index, collections))
    }

    /// Retriever whose collection metadata is persisted under `base_dir`
    pub async fn open(
        config: RetrieverConfig,
        index: Arc<dyn VectorIndex>,
        base_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(CacheStore::new(config.cache.clone()));
        let collections = CollectionManager::open(base_dir, cache.clone(), index.clone()).await?;
        Ok(Self::assemble(config, cache, index, collections))
    }

    fn assemble(
        config: RetrieverConfig,
        cache: Arc<CacheStore<Vec<Passage>>>,
        index: Arc<dyn VectorIndex>,
        collections: CollectionManager,
    ) -> Self {
        let cleanup_task = spawn_auto_cleanup(cache.clone());
        Self {
            config,
            cache,
            index,
            collections,
            processor: ResultProcessor::new(),
            cleanup_task,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Request for `query` against `collection` with the configured `top_k`
    pub fn request(
        &self,
        query: impl Into<String>,
        collection: impl Into<String>,
    ) -> RetrievalRequest {
        RetrievalRequest::new(query, collection).with_top_k(self.config.default_top_k)
    }

    /// Retrieve with default options
    pub async fn search(&self, query: &str, collection: &str) -> Result<Vec<Passage>> {
        self.retrieve(&self.request(query, collection)).await
    }

    /// Retrieve the ranked passages for a request
    ///
    /// Served from the cache when possible. On a miss the index is asked
    /// for `top_k * overfetch_multiplier` hits, which are processed and
    /// cached. Errors are never cached.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<Vec<Passage>> {
        request.validate()?;
        self.collections.ensure_ready(&request.collection).await?;

        if request.top_k == 0 {
            return Ok(Vec::new());
        }

        let key = request.use_cache.then(|| request.cache_key());
        if let Some(key) = &key {
            if let Some(passages) = self.cache.get(key).await {
                debug!("Serving {} passages from cache for {}", passages.len(), request.collection);
                return Ok(passages);
            }
        }

        let start = Instant::now();
        let limit = request.top_k.saturating_mul(self.config.overfetch_multiplier);
        let search = self.index.search(
            &request.collection,
            &request.query,
            limit,
            request.filter.as_ref(),
        );

        let hits = match tokio::time::timeout(self.config.index_timeout, search).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(IndexError::CollectionMissing(collection))) => {
                if !self.collections.exists(&request.collection).await {
                    return Err(RetrievalError::CollectionNotFound(collection));
                }
                // Ready but nothing upserted yet
                debug!("Index has no chunks for ready collection {}", collection);
                Vec::new()
            }
            Ok(Err(e)) => {
                warn!("Index search failed for {}: {}", request.collection, e);
                return Err(RetrievalError::IndexUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!(
                    "Index search timed out for {} after {:?}",
                    request.collection, self.config.index_timeout
                );
                return Err(RetrievalError::IndexUnavailable(format!(
                    "search timed out after {:?}",
                    self.config.index_timeout
                )));
            }
        };

        let raw_count = hits.len();
        let passages = self.processor.process(hits, request);

        if let Some(key) = key {
            self.cache
                .insert(key.clone(), passages.clone(), &request.collection)
                .await;

            // The collection may have been deleted or rebuilt while the
            // index call was in flight.
            if !self.collections.is_ready(&request.collection).await {
                self.cache.invalidate(|entry| entry.key == key).await;
            }
        }

        info!(
            "Retrieved {} passages from {} ({} raw hits, {:?})",
            passages.len(),
            request.collection,
            raw_count,
            start.elapsed()
        );
        Ok(passages)
    }

    pub async fn create_collection(
        &self,
        id: &str,
        name: &str,
        category: &str,
        source: &str,
    ) -> Result<Collection> {
        self.collections.create(id, name, category, source).await
    }

    pub async fn get_collection(&self, id: &str) -> Option<Collection> {
        self.collections.get(id).await
    }

    pub async fn list_collections(&self) -> Vec<Collection> {
        self.collections.list().await
    }

    pub async fn update_collection(
        &self,
        id: &str,
        update: CollectionUpdate,
    ) -> Result<Collection> {
        self.collections.update(id, update).await
    }

    pub async fn delete_collection(&self, id: &str) -> Result<Collection> {
        self.collections.delete(id).await
    }

    /// Full lifecycle API, including convenience queries
    pub fn collections(&self) -> &CollectionManager {
        &self.collections
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Drop cached results, for one collection or all of them
    ///
    /// Returns the number of entries removed.
    pub async fn clear_cache(&self, collection: Option<&str>) -> usize {
        match collection {
            Some(collection) => {
                self.cache
                    .invalidate_collection(collection, InvalidationReason::Manual)
                    .await
                    .count()
            }
            None => self.cache.clear().await,
        }
    }

    /// Number of raw hit batches run through the result processor
    pub fn processed_batches(&self) -> u64 {
        self.processor.processed_batches()
    }
}

impl Drop for Retriever {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.take() {
            task.abort();
        }
    }
}
