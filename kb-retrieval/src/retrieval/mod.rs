//! Read-through retrieval over the vector index
//!
//! [`Retriever`] ties the query cache, the vector index and the
//! [`ResultProcessor`] together behind one `retrieve` call.

pub mod processor;
pub mod request;
pub mod retriever;

pub use processor::{relevance_score, ResultProcessor};
pub use request::{Passage, RetrievalRequest, SortStrategy, CACHE_NAMESPACE, DEFAULT_TOP_K};
pub use retriever::Retriever;
