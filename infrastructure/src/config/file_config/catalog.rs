//! Model catalog extensions from TOML (`[catalog]` section)

use kbchat_domain::{EmbeddingModel, Model, ModelCatalog};
use serde::{Deserialize, Serialize};

/// Extra model names accepted on top of the built-in catalog.
///
/// ```toml
/// [catalog]
/// models = ["glm-4"]
/// embeddings = ["embedding-2"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCatalogConfig {
    pub models: Vec<String>,
    pub embeddings: Vec<String>,
}

impl FileCatalogConfig {
    pub fn to_catalog(&self) -> ModelCatalog {
        ModelCatalog::default().extend(
            self.models
                .iter()
                .filter(|m| !m.trim().is_empty())
                .map(|m| Model::from(m.trim())),
            self.embeddings
                .iter()
                .filter(|e| !e.trim().is_empty())
                .map(|e| EmbeddingModel::from(e.trim())),
        )
    }
}
