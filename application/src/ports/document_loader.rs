//! Document loader port
//!
//! Turns user-supplied file paths into passages ready for indexing.

use async_trait::async_trait;
use kbchat_domain::Passage;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading documents for ingestion
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported file type: {}", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("Failed to read {}: {reason}", path.display())]
    ReadFailed { path: PathBuf, reason: String },

    #[error("No documents to ingest")]
    Empty,
}

/// Loads files into passages.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load every path. Fails as a whole if any path cannot be loaded.
    async fn load(&self, paths: &[PathBuf]) -> Result<Vec<Passage>, IngestError>;
}
