//! Retrieval Demo Application
//!
//! Seeds an in-memory index, walks a collection through its lifecycle and
//! shows cache behavior on repeated queries.
//!
//! Usage:
//!   cargo run --example retrieval_demo
//!
//! Environment variables (also read from `.env`):
//!   RUST_LOG                - log filter (default: info)
//!   KB_CACHE_TTL_SECS       - result cache TTL (default: 300)
//!   KB_CACHE_MAX_ENTRIES    - result cache capacity (default: 1000)
//!   KB_INDEX_TIMEOUT_MS     - index search timeout (default: 10000)
//!   KB_OVERFETCH_MULTIPLIER - index over-fetch factor (default: 2)
//!   KB_DATA_DIR             - persist collection metadata here (default: in memory)

use kb_retrieval::{
    CollectionStatus, CollectionUpdate, DocumentChunk, InMemoryVectorIndex, RetrievalRequest,
    Retriever, RetrieverConfig, SortStrategy, VectorIndex,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== Knowledge Base Retrieval Demo ===");

    let config = RetrieverConfig::from_env()?;
    let index = Arc::new(InMemoryVectorIndex::new());
    let retriever = match std::env::var("KB_DATA_DIR") {
        Ok(dir) => Retriever::open(config, index.clone(), dir).await?,
        Err(_) => Retriever::new(config, index.clone())?,
    };

    info!("\n--- Create collection ---");
    if retriever.get_collection("genshin").await.is_none() {
        retriever
            .create_collection("genshin", "Genshin Wiki", "game", "https://wiki.example/genshin")
            .await?;
    }

    let pages = [
        ("c1", "Diluc is a pyro claymore user from Mondstadt", "wiki/diluc", "Characters"),
        ("c2", "Claymores are heavy two-handed weapons", "wiki/weapons", "Weapons"),
        ("c3", "Claymores are heavy two-handed weapons", "wiki/weapons-mirror", "Weapons"),
        ("c4", "The best fishing spots are near Mondstadt", "wiki/fishing", "Fishing"),
    ];
    let chunks = pages
        .iter()
        .map(|(id, text, source, page)| {
            DocumentChunk::new(*id, "genshin", *text, *source).with_metadata("page", *page)
        })
        .collect();
    let written = index.upsert("genshin", chunks).await?;

    let collection = retriever
        .update_collection(
            "genshin",
            CollectionUpdate::new()
                .status(CollectionStatus::Ready)
                .chunk_count(written as u64),
        )
        .await?;
    info!("\n{}", collection);

    info!("\n--- Retrieve (by score) ---");
    let request = RetrievalRequest::new("claymore weapons", "genshin").with_top_k(3);
    for passage in retriever.retrieve(&request).await? {
        info!("  {:.3}  {}  ({:?})", passage.score, passage.text, passage.source);
    }

    info!("\n--- Same query again (served from cache) ---");
    retriever.retrieve(&request).await?;
    info!("{}", retriever.cache_stats().await);

    info!("\n--- Retrieve (by relevance, filtered) ---");
    let request = RetrievalRequest::new("mondstadt", "genshin")
        .with_sort(SortStrategy::ByRelevance)
        .with_filter_entry("page", "Characters");
    for passage in retriever.retrieve(&request).await? {
        info!(
            "  {:.3} (relevance {:.3})  {}",
            passage.score,
            passage.relevance.unwrap_or(passage.score),
            passage.text
        );
    }

    info!("\n--- Delete collection ---");
    retriever.delete_collection("genshin").await?;
    match retriever.search("claymore", "genshin").await {
        Ok(_) => warn!("Unexpected result after delete"),
        Err(e) => info!("Retrieval after delete: {}", e),
    }
    info!("{}", retriever.cache_stats().await);

    info!("\n=== Demo Complete ===");
    Ok(())
}
