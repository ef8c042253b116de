//! Collection lifecycle manager
//!
//! Owns collection metadata (optionally persisted as one JSON file per
//! collection under `<base>/metadata/`) and keeps the query cache and the
//! vector index consistent with it on status changes and deletion.

use crate::cache::{CacheStore, InvalidationReason};
use crate::collection::{Collection, CollectionStatus, CollectionUpdate};
use crate::error::{Result, RetrievalError};
use crate::index::{Metadata, VectorIndex};
use crate::retrieval::Passage;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const METADATA_DIR: &str = "metadata";

/// CRUD over knowledge collections
///
/// The metadata map has its own lock. It is always released before the
/// cache is touched, so the two locks are never held together.
pub struct CollectionManager {
    collections: RwLock<HashMap<String, Collection>>,
    /// Deleted collections whose index cleanup failed
    pending_cleanup: Mutex<HashMap<String, Collection>>,
    metadata_dir: Option<PathBuf>,
    cache: Arc<CacheStore<Vec<Passage>>>,
    index: Arc<dyn VectorIndex>,
}

impl CollectionManager {
    /// Manager that keeps metadata in memory only
    pub fn in_memory(
        cache: Arc<CacheStore<Vec<Passage>>>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            pending_cleanup: Mutex::new(HashMap::new()),
            metadata_dir: None,
            cache,
            index,
        }
    }

    /// Manager persisting metadata under `base_dir/metadata`
    ///
    /// Existing `*.json` files are loaded; unreadable ones are logged and
    /// skipped.
    pub async fn open(
        base_dir: impl AsRef<Path>,
        cache: Arc<CacheStore<Vec<Passage>>>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let metadata_dir = base_dir.as_ref().join(METADATA_DIR);
        tokio::fs::create_dir_all(&metadata_dir).await?;

        let collections = load_collections(&metadata_dir).await?;
        info!(
            "Loaded {} collections from {}",
            collections.len(),
            metadata_dir.display()
        );

        Ok(Self {
            collections: RwLock::new(collections),
            pending_cleanup: Mutex::new(HashMap::new()),
            metadata_dir: Some(metadata_dir),
            cache,
            index,
        })
    }

    /// Register a new collection in `building` status
    pub async fn create(
        &self,
        id: &str,
        name: &str,
        category: &str,
        source: &str,
    ) -> Result<Collection> {
        self.create_with_metadata(id, name, category, source, Metadata::new())
            .await
    }

    pub async fn create_with_metadata(
        &self,
        id: &str,
        name: &str,
        category: &str,
        source: &str,
        metadata: Metadata,
    ) -> Result<Collection> {
        validate_id(id)?;
        if self.exists(id).await {
            return Err(RetrievalError::AlreadyExists(id.to_string()));
        }

        // A previous incarnation must be fully gone from the index and the
        // cache before the id is reused.
        let pending = self.pending_cleanup.lock().await.remove(id);
        if let Some(previous) = pending {
            self.purge(previous).await?;
        }
        let stale = self.cache.invalidate(|entry| entry.belongs_to(id)).await;
        if stale > 0 {
            warn!("Dropped {} stale cached results tagged {}", stale, id);
        }

        let mut collections = self.collections.write().await;
        if collections.contains_key(id) {
            return Err(RetrievalError::AlreadyExists(id.to_string()));
        }

        let collection = Collection::new(id, name, category, source).with_metadata(metadata);
        self.persist(&collection).await?;
        collections.insert(id.to_string(), collection.clone());

        info!("Created collection {} ({})", id, name);
        Ok(collection)
    }

    pub async fn get(&self, id: &str) -> Option<Collection> {
        self.collections.read().await.get(id).cloned()
    }

    /// All collections, ordered by id
    pub async fn list(&self) -> Vec<Collection> {
        let collections = self.collections.read().await;
        let mut all: Vec<Collection> = collections.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.collections.read().await.contains_key(id)
    }

    pub async fn status(&self, id: &str) -> Option<CollectionStatus> {
        self.collections.read().await.get(id).map(|c| c.status)
    }

    pub async fn is_ready(&self, id: &str) -> bool {
        self.status(id).await == Some(CollectionStatus::Ready)
    }

    /// Fail unless the collection exists and is `ready`
    pub async fn ensure_ready(&self, id: &str) -> Result<()> {
        match self.status(id).await {
            None => Err(RetrievalError::CollectionNotFound(id.to_string())),
            Some(CollectionStatus::Ready) => Ok(()),
            Some(status) => Err(RetrievalError::CollectionNotReady {
                id: id.to_string(),
                status,
            }),
        }
    }

    /// Apply a partial update (last writer wins)
    ///
    /// Leaving `ready` invalidates every cached result of the collection.
    pub async fn update(&self, id: &str, update: CollectionUpdate) -> Result<Collection> {
        let (updated, invalidation) = {
            let mut collections = self.collections.write().await;
            let current = collections
                .get(id)
                .ok_or_else(|| RetrievalError::CollectionNotFound(id.to_string()))?;

            let mut next = current.clone();
            let mut invalidation = None;

            if let Some(status) = update.status {
                if !current.status.can_transition_to(status) {
                    return Err(RetrievalError::InvalidTransition {
                        id: id.to_string(),
                        from: current.status,
                        to: status,
                    });
                }
                invalidation = match (current.status, status) {
                    (CollectionStatus::Ready, CollectionStatus::Building) => {
                        Some(InvalidationReason::CollectionRebuilt {
                            collection: id.to_string(),
                        })
                    }
                    (CollectionStatus::Ready, CollectionStatus::Error) => {
                        Some(InvalidationReason::CollectionFailed {
                            collection: id.to_string(),
                        })
                    }
                    _ => None,
                };
                if current.status != status {
                    info!("Collection {} status: {} -> {}", id, current.status, status);
                }
                next.status = status;
            }
            if let Some(count) = update.chunk_count {
                next.chunk_count = count;
            }
            if let Some(metadata) = update.metadata {
                next.metadata.extend(metadata);
            }
            next.updated_at = Utc::now();

            self.persist(&next).await?;
            collections.insert(id.to_string(), next.clone());
            (next, invalidation)
        };

        if let Some(reason) = invalidation {
            self.cache.invalidate_collection(id, reason).await;
        }

        debug!("Updated collection {}", id);
        Ok(updated)
    }

    /// Delete a collection
    ///
    /// The metadata file goes first; if it cannot be removed nothing else
    /// changes. Then the in-memory entry, the collection's cached results
    /// and finally the index data are dropped.
    ///
    /// An index failure is reported as [`RetrievalError::IndexUnavailable`]
    /// and the collection stays pending: it is no longer listed, but calling
    /// `delete` again retries the index cleanup.
    pub async fn delete(&self, id: &str) -> Result<Collection> {
        let removed = {
            let mut collections = self.collections.write().await;
            if collections.contains_key(id) {
                self.remove_file(id).await?;
                collections.remove(id)
            } else {
                None
            }
        };

        let removed = match removed {
            Some(collection) => collection,
            None => {
                let pending = self.pending_cleanup.lock().await.remove(id);
                match pending {
                    Some(collection) => {
                        info!("Retrying index cleanup for deleted collection {}", id);
                        collection
                    }
                    None => return Err(RetrievalError::CollectionNotFound(id.to_string())),
                }
            }
        };

        self.purge(removed).await
    }

    /// Ids of deleted collections whose index data is still to be removed
    pub async fn pending_cleanup(&self) -> Vec<String> {
        let pending = self.pending_cleanup.lock().await;
        let mut ids: Vec<String> = pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop cached results and index data of a collection whose metadata
    /// is already gone
    async fn purge(&self, removed: Collection) -> Result<Collection> {
        let id = removed.id.clone();
        let event = self
            .cache
            .invalidate_collection(
                &id,
                InvalidationReason::CollectionDeleted {
                    collection: id.clone(),
                },
            )
            .await;

        match self.index.delete_collection(&id).await {
            Ok(existed) => {
                info!(
                    "Deleted collection {} ({} cached results dropped, index data present: {})",
                    id,
                    event.count(),
                    existed
                );
                Ok(removed)
            }
            Err(e) => {
                warn!("Collection {} removed but index cleanup failed: {}", id, e);
                self.pending_cleanup.lock().await.insert(id, removed);
                Err(RetrievalError::IndexUnavailable(e.to_string()))
            }
        }
    }

    fn metadata_path(&self, id: &str) -> Option<PathBuf> {
        self.metadata_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", id)))
    }

    async fn persist(&self, collection: &Collection) -> Result<()> {
        let Some(path) = self.metadata_path(&collection.id) else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(collection)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove_file(&self, id: &str) -> Result<()> {
        let Some(path) = self.metadata_path(id) else {
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Ids double as file names, so path separators are rejected
fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(RetrievalError::InvalidRequest(
            "collection id must not be empty".to_string(),
        ));
    }
    if id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(RetrievalError::InvalidRequest(format!(
            "collection id contains a path separator: {}",
            id
        )));
    }
    Ok(())
}

async fn load_collections(dir: &Path) -> Result<HashMap<String, Collection>> {
    let mut collections = HashMap::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping unreadable metadata file {}: {}", path.display(), e);
                continue;
            }
        };
        match serde_json::from_str::<Collection>(&raw) {
            Ok(collection) => {
                collections.insert(collection.id.clone(), collection);
            }
            Err(e) => warn!("Skipping malformed metadata file {}: {}", path.display(), e),
        }
    }

    Ok(collections)
}
