//! Knowledge base configuration from TOML (`[knowledge]` section)

use crate::knowledge::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, FsDocumentLoader};
use kbchat_application::ports::retriever::DEFAULT_RETRIEVAL_TIMEOUT;
use kbchat_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ingestion and retrieval settings.
///
/// # Example
///
/// ```toml
/// [knowledge]
/// chunk_size = 1000
/// chunk_overlap = 100
/// extensions = ["txt", "md", "rst"]
/// retrieval_timeout_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileKnowledgeConfig {
    /// Characters per chunk
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
    /// File extensions accepted by `/upload`
    pub extensions: Vec<String>,
    pub retrieval_timeout_secs: u64,
}

impl Default for FileKnowledgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            extensions: vec!["txt".to_string(), "md".to_string()],
            retrieval_timeout_secs: DEFAULT_RETRIEVAL_TIMEOUT.as_secs(),
        }
    }
}

impl FileKnowledgeConfig {
    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval_timeout_secs)
    }

    /// Build the document loader, warning about chunking values it had to clamp.
    pub fn to_loader(&self) -> (FsDocumentLoader, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ChunkOverlapTooLarge,
                format!(
                    "knowledge: chunk_overlap ({}) must be smaller than chunk_size ({}); clamping",
                    self.chunk_overlap, self.chunk_size
                ),
            ));
        }
        let loader = FsDocumentLoader::new()
            .with_chunking(self.chunk_size, self.chunk_overlap)
            .with_extensions(self.extensions.clone());
        (loader, issues)
    }
}
