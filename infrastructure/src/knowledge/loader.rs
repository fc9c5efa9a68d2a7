//! Filesystem document loader

use async_trait::async_trait;
use kbchat_application::{DocumentLoader, IngestError};
use kbchat_domain::Passage;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Reads UTF-8 text files and splits them into overlapping chunks.
///
/// Paths may be files, directories (walked recursively, unsupported files
/// skipped) or glob patterns. An explicitly named file with an unsupported
/// extension is an error.
#[derive(Debug, Clone)]
pub struct FsDocumentLoader {
    chunk_size: usize,
    chunk_overlap: usize,
    extensions: Vec<String>,
}

impl Default for FsDocumentLoader {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            extensions: vec!["txt".to_string(), "md".to_string()],
        }
    }
}

impl FsDocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set chunk size and overlap, both in characters.
    ///
    /// An overlap that does not leave room for progress is clamped to
    /// `chunk_size - 1`.
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.chunk_overlap = chunk_overlap.min(self.chunk_size - 1);
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    /// Expand one user-supplied path into the files to read.
    async fn expand(&self, path: &Path) -> Result<Vec<PathBuf>, IngestError> {
        let raw = path.to_string_lossy();
        if raw.contains(['*', '?', '[']) {
            let entries = glob::glob(&raw).map_err(|e| IngestError::ReadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            let files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .filter(|p| p.is_file() && self.accepts(p))
                .collect();
            if files.is_empty() {
                return Err(IngestError::NotFound(path.to_path_buf()));
            }
            return Ok(files);
        }

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| IngestError::NotFound(path.to_path_buf()))?;
        if metadata.is_dir() {
            return self.walk(path).await;
        }
        if !self.accepts(path) {
            return Err(IngestError::UnsupportedFile(path.to_path_buf()));
        }
        Ok(vec![path.to_path_buf()])
    }

    async fn walk(&self, root: &Path) -> Result<Vec<PathBuf>, IngestError> {
        let read_failed = |path: &Path, e: std::io::Error| IngestError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| read_failed(&dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| read_failed(&dir, e))?
            {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| read_failed(&path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if self.accepts(&path) {
                    files.push(path);
                } else {
                    debug!("Skipping unsupported file: {:?}", path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Split `text` into chunks of at most `chunk_size` characters, each
    /// starting `chunk_size - chunk_overlap` characters after the last.
    fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

#[async_trait]
impl DocumentLoader for FsDocumentLoader {
    async fn load(&self, paths: &[PathBuf]) -> Result<Vec<Passage>, IngestError> {
        let mut files = Vec::new();
        for path in paths {
            files.extend(self.expand(path).await?);
        }

        let mut passages = Vec::new();
        for file in files {
            let text = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| IngestError::ReadFailed {
                    path: file.clone(),
                    reason: e.to_string(),
                })?;
            if text.trim().is_empty() {
                warn!("Skipping empty document: {:?}", file);
                continue;
            }

            let source = file.to_string_lossy().into_owned();
            let chunks = self.chunk(&text);
            debug!(source = %source, chunks = chunks.len(), "Loaded document");
            passages.extend(chunks.into_iter().enumerate().map(|(i, chunk)| {
                Passage::new(chunk)
                    .with_metadata("source", source.clone())
                    .with_metadata("chunk", i.to_string())
            }));
        }

        if passages.is_empty() {
            return Err(IngestError::Empty);
        }
        Ok(passages)
    }
}
