//! Local knowledge base
//!
//! Everything behind the retrieval and ingestion ports: an in-memory
//! cosine-similarity store, the [`LocalKnowledgeBase`] that keeps ingested
//! documents and their per-embedding indexes, and the filesystem
//! [`FsDocumentLoader`].

mod base;
mod loader;
mod store;

pub use base::LocalKnowledgeBase;
pub use loader::{FsDocumentLoader, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use store::InMemoryVectorStore;

use kbchat_application::{Embedder, RetrievalError};
use kbchat_domain::EmbeddingModel;
use std::sync::Arc;

/// Creates embedders for a given embedding model.
///
/// Creation must not contact the backend; failures such as a missing API
/// key surface on the first embed call.
pub trait EmbedderFactory: Send + Sync {
    fn create(&self, model: &EmbeddingModel) -> Result<Arc<dyn Embedder>, RetrievalError>;
}
