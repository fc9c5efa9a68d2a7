//! Infrastructure layer for kb-chat
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the OpenAI-compatible chat and embedding provider,
//! the local knowledge base and document loader, the JSONL transcript
//! logger, and configuration file loading.

pub mod config;
pub mod knowledge;
pub mod logging;
pub mod providers;

// Re-export commonly used types
pub use config::{ConfigLoader, FileConfig};
pub use knowledge::{EmbedderFactory, FsDocumentLoader, InMemoryVectorStore, LocalKnowledgeBase};
pub use logging::JsonlConversationLogger;
pub use providers::openai::{
    ChatEndpoints, EmbeddingEndpoints, OpenAiEmbeddingProvider, OpenAiModelProvider,
};
