//! Knowledge base that retains documents across embedding changes

use super::EmbedderFactory;
use super::store::InMemoryVectorStore;
use async_trait::async_trait;
use kbchat_application::{Embedder, KnowledgeBackend, RetrievalError, VectorStore};
use kbchat_domain::{EmbeddingModel, Passage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Default)]
struct KnowledgeState {
    documents: Vec<Passage>,
    /// Vectors per embedding model, aligned with a prefix of `documents`
    indexes: HashMap<String, Vec<Vec<f32>>>,
}

impl KnowledgeState {
    /// Embed whatever `embedder` has not seen yet, without storing it.
    async fn missing_vectors(
        &self,
        embedder: &dyn Embedder,
    ) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let done = self
            .indexes
            .get(embedder.model().as_str())
            .map_or(0, Vec::len);
        let pending: Vec<String> = self.documents[done..]
            .iter()
            .map(|p| p.content.clone())
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            embedding = %embedder.model(),
            pending = pending.len(),
            "Embedding retained documents"
        );
        embedder.embed_batch(&pending).await
    }

    fn snapshot(&self, model: &EmbeddingModel) -> InMemoryVectorStore {
        let vectors = self
            .indexes
            .get(model.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        InMemoryVectorStore::new(
            vectors
                .iter()
                .cloned()
                .zip(self.documents.iter().cloned())
                .collect(),
        )
    }
}

/// In-process knowledge base.
///
/// Keeps every ingested passage so a later switch of embedding model can
/// re-index them. Vectors are cached per embedding model and only new
/// documents are embedded on each open.
pub struct LocalKnowledgeBase {
    factory: Arc<dyn EmbedderFactory>,
    state: Mutex<KnowledgeState>,
}

impl LocalKnowledgeBase {
    pub fn new(factory: Arc<dyn EmbedderFactory>) -> Self {
        Self {
            factory,
            state: Mutex::new(KnowledgeState::default()),
        }
    }

    pub async fn document_count(&self) -> usize {
        self.state.lock().await.documents.len()
    }
}

#[async_trait]
impl KnowledgeBackend for LocalKnowledgeBase {
    fn embedder(&self, embedding: &EmbeddingModel) -> Result<Arc<dyn Embedder>, RetrievalError> {
        self.factory.create(embedding)
    }

    async fn open_store(
        &self,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Arc<dyn VectorStore>, RetrievalError> {
        let mut state = self.state.lock().await;
        let fresh = state.missing_vectors(embedder.as_ref()).await?;
        state
            .indexes
            .entry(embedder.model().as_str().to_string())
            .or_default()
            .extend(fresh);
        Ok(Arc::new(state.snapshot(embedder.model())))
    }

    async fn index(
        &self,
        documents: Vec<Passage>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Arc<dyn VectorStore>, RetrievalError> {
        let mut state = self.state.lock().await;
        let mut vectors = state.missing_vectors(embedder.as_ref()).await?;

        let contents: Vec<String> = documents.iter().map(|p| p.content.clone()).collect();
        let new_vectors = if contents.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&contents).await?
        };
        if new_vectors.len() != documents.len() {
            return Err(RetrievalError::Unavailable(format!(
                "embedder returned {} vectors for {} documents",
                new_vectors.len(),
                documents.len()
            )));
        }
        vectors.extend(new_vectors);

        // Everything embedded; commit.
        let added = documents.len();
        state.documents.extend(documents);
        state
            .indexes
            .entry(embedder.model().as_str().to_string())
            .or_default()
            .extend(vectors);

        info!(
            embedding = %embedder.model(),
            added,
            total = state.documents.len(),
            "Indexed documents"
        );
        Ok(Arc::new(state.snapshot(embedder.model())))
    }
}
