//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod chat_model;
pub mod conversation_logger;
pub mod document_loader;
pub mod progress;
pub mod retriever;
