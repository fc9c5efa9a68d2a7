//! Catalog of selectable model names

use crate::core::model::{EmbeddingModel, Model};

/// The chat and embedding models a chain may be configured with.
///
/// Names outside the catalog are rejected as configuration errors instead
/// of being forwarded to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<Model>,
    embeddings: Vec<EmbeddingModel>,
}

impl ModelCatalog {
    pub fn new(models: Vec<Model>, embeddings: Vec<EmbeddingModel>) -> Self {
        Self { models, embeddings }
    }

    /// Add extra names on top of the current lists, skipping duplicates.
    pub fn extend(
        mut self,
        models: impl IntoIterator<Item = Model>,
        embeddings: impl IntoIterator<Item = EmbeddingModel>,
    ) -> Self {
        for model in models {
            if !self.models.contains(&model) {
                self.models.push(model);
            }
        }
        for embedding in embeddings {
            if !self.embeddings.contains(&embedding) {
                self.embeddings.push(embedding);
            }
        }
        self
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn embeddings(&self) -> &[EmbeddingModel] {
        &self.embeddings
    }

    pub fn contains_model(&self, model: &Model) -> bool {
        self.models.contains(model)
    }

    pub fn contains_embedding(&self, embedding: &EmbeddingModel) -> bool {
        self.embeddings.contains(embedding)
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(Model::known_models(), EmbeddingModel::known_models())
    }
}
