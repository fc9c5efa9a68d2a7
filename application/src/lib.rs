//! Application layer for kb-chat
//!
//! This crate contains the conversation chain use case, its port
//! definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::ChainOptions;
pub use ports::{
    chat_model::{ChatModel, ChatModelProvider, ModelError, StreamHandle},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    document_loader::{DocumentLoader, IngestError},
    progress::{ChainProgressNotifier, NoProgress},
    retriever::{Embedder, KnowledgeBackend, RetrievalError, Retriever, VectorStore},
};
pub use use_cases::conversation_chain::{
    ChainAdapters, ChainError, ConversationChain, SendRequest,
};
