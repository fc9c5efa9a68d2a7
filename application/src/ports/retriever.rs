//! Retrieval ports
//!
//! The embedding and vector-store boundary, plus [`Retriever`], the
//! top-k query adapter the conversation chain holds.

use async_trait::async_trait;
use kbchat_domain::{EmbeddingModel, Passage};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default bound on a single retrieval call.
pub const DEFAULT_RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the embedding or vector-store backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("Retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("Retrieval timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported embedding model: {0}")]
    UnsupportedEmbedding(String),
}

/// Turns text into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding model this embedder was built for
    fn model(&self) -> &EmbeddingModel;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;

    /// Embed several texts. The default embeds them one at a time.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Nearest-neighbour search over indexed passages.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return at most `k` passages, most relevant first.
    async fn similarity_search(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError>;
}

/// Source of embedders and vector stores.
///
/// The chain asks for a fresh store whenever the embedding model or `k`
/// changes, and for a re-indexed store on upload.
#[async_trait]
pub trait KnowledgeBackend: Send + Sync {
    /// Build an embedder for `embedding`.
    fn embedder(&self, embedding: &EmbeddingModel) -> Result<Arc<dyn Embedder>, RetrievalError>;

    /// Open a store over everything ingested so far, embedded with `embedder`.
    async fn open_store(
        &self,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Arc<dyn VectorStore>, RetrievalError>;

    /// Index `documents` and return a store that includes them.
    ///
    /// Nothing is retained if indexing fails.
    async fn index(
        &self,
        documents: Vec<Passage>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Arc<dyn VectorStore>, RetrievalError>;
}

/// Top-k passage retrieval for a query string.
///
/// Binds one embedder, one store and one `k`. A change to either the
/// embedding model or `k` means building a new retriever.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
    timeout: Duration,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, top_k: usize) -> Self {
        Self {
            embedder,
            store,
            top_k,
            timeout: DEFAULT_RETRIEVAL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn embedding_model(&self) -> &EmbeddingModel {
        self.embedder.model()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Fetch at most `top_k` passages for `query`.
    ///
    /// An empty result is a valid outcome; only backend failures are errors.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RetrievalError> {
        let search = async {
            let vector = self.embedder.embed(query).await?;
            let mut passages = self.store.similarity_search(&vector, self.top_k).await?;
            passages.truncate(self.top_k);
            Ok::<_, RetrievalError>(passages)
        };

        let passages = tokio::time::timeout(self.timeout, search)
            .await
            .map_err(|_| RetrievalError::Timeout(self.timeout))??;

        debug!(
            embedding = %self.embedder.model(),
            top_k = self.top_k,
            found = passages.len(),
            "Retrieved passages"
        );
        Ok(passages)
    }
}
