//! Error types for retrieval and collection operations
//!
//! Only the retriever and the collection manager surface these to callers.
//! The cache store never fails and the result processor drops bad hits
//! instead of erroring.

use crate::collection::CollectionStatus;
use thiserror::Error;

/// Main error type for the retrieval subsystem
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Bad input from the caller; retrying the same request will fail again
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The referenced collection does not exist
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// The collection exists but cannot serve queries yet
    #[error("Collection {id} is not ready (status: {status})")]
    CollectionNotReady { id: String, status: CollectionStatus },

    /// The vector index failed or timed out
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// A collection with this id already exists
    #[error("Collection already exists: {0}")]
    AlreadyExists(String),

    /// Status change not allowed by the collection state machine
    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: CollectionStatus,
        to: CollectionStatus,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Collection metadata could not be read from or written to disk
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl RetrievalError {
    /// Whether the caller may retry the same request later (with backoff)
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetrievalError::IndexUnavailable(_))
    }
}

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, RetrievalError>;

impl From<serde_json::Error> for RetrievalError {
    fn from(e: serde_json::Error) -> Self {
        RetrievalError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for RetrievalError {
    fn from(e: std::io::Error) -> Self {
        RetrievalError::PersistenceError(e.to_string())
    }
}
