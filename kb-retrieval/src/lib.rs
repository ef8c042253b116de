//! # Knowledge-base retrieval cache (kb-retrieval)
//!
//! Read-through retrieval of ranked passages from per-topic knowledge
//! collections stored in an external vector index.
//!
//! ## Features
//!
//! - Bounded query cache with per-entry TTL and LRU eviction
//! - Deterministic cache keys over the whole request
//! - Post-processing pipeline: score threshold, metadata filter, sort,
//!   truncate and deduplicate
//! - Collection lifecycle (`building` / `ready` / `error`) with cache
//!   invalidation on rebuild and delete
//! - Pluggable [`VectorIndex`] behind `async-trait`
//!
//! ## Example
//!
//! ```no_run
//! use kb_retrieval::{
//!     CollectionStatus, CollectionUpdate, DocumentChunk, InMemoryVectorIndex, RetrievalRequest,
//!     Retriever, RetrieverConfig, VectorIndex,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let index = Arc::new(InMemoryVectorIndex::new());
//!     let retriever = Retriever::new(RetrieverConfig::default(), index.clone())?;
//!
//!     retriever
//!         .create_collection("genshin", "Genshin Wiki", "game", "https://wiki.example")
//!         .await?;
//!     index
//!         .upsert(
//!             "genshin",
//!             vec![DocumentChunk::new("c1", "genshin", "Diluc wields a claymore", "wiki/diluc")],
//!         )
//!         .await?;
//!     retriever
//!         .update_collection(
//!             "genshin",
//!             CollectionUpdate::new().status(CollectionStatus::Ready).chunk_count(1),
//!         )
//!         .await?;
//!
//!     let request = RetrievalRequest::new("diluc claymore", "genshin").with_top_k(3);
//!     for passage in retriever.retrieve(&request).await? {
//!         println!("{:.3} {}", passage.score, passage.text);
//!     }
//!
//!     println!("{}", retriever.cache_stats().await);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod index;
pub mod retrieval;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheKey, CacheStats, CacheStore, InvalidationReason,
};
pub use collection::{Collection, CollectionManager, CollectionStatus, CollectionUpdate};
pub use config::{RetrieverConfig, RetrieverConfigBuilder};
pub use error::{Result, RetrievalError};
pub use index::{
    DocumentChunk, InMemoryVectorIndex, IndexError, Metadata, MetadataFilter, RawHit, VectorIndex,
};
pub use retrieval::{Passage, ResultProcessor, RetrievalRequest, Retriever, SortStrategy};
