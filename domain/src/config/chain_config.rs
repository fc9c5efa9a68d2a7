//! Chain configuration, overrides and per-field diffing.

use super::catalog::ModelCatalog;
use crate::core::error::ConfigurationError;
use crate::core::model::{EmbeddingModel, Model};
use serde::{Deserialize, Serialize};

/// Lowest accepted sampling temperature.
pub const MIN_TEMPERATURE: f32 = 0.0;
/// Highest accepted sampling temperature.
pub const MAX_TEMPERATURE: f32 = 1.0;

/// Live configuration of a conversation chain (Value Object)
///
/// Read by every invocation and replaced only through
/// [`ChainConfig::apply`] after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub model: Model,
    pub embedding: EmbeddingModel,
    pub temperature: f32,
    pub top_k: usize,
    pub grounded: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            model: Model::default(),
            embedding: EmbeddingModel::default(),
            temperature: 0.1,
            top_k: 3,
            grounded: false,
        }
    }
}

impl ChainConfig {
    /// Check every invariant against the catalog of known names.
    pub fn validate(&self, catalog: &ModelCatalog) -> Result<(), ConfigurationError> {
        match self.problems(catalog).into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Every problem with this configuration, in field order.
    pub fn problems(&self, catalog: &ModelCatalog) -> Vec<ConfigurationError> {
        let mut problems = Vec::new();
        if self.top_k == 0 {
            problems.push(ConfigurationError::InvalidTopK);
        }
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&self.temperature) {
            problems.push(ConfigurationError::InvalidTemperature(self.temperature));
        }
        if !catalog.contains_model(&self.model) {
            problems.push(ConfigurationError::UnknownModel(self.model.to_string()));
        }
        if !catalog.contains_embedding(&self.embedding) {
            problems.push(ConfigurationError::UnknownEmbedding(
                self.embedding.to_string(),
            ));
        }
        problems
    }

    /// Produce the configuration that results from applying `overrides`.
    ///
    /// Omitted overrides keep the current value. The result is not
    /// validated; call [`validate`](Self::validate) before installing it.
    pub fn apply(&self, overrides: &ConfigOverrides) -> ChainConfig {
        ChainConfig {
            model: overrides.model.clone().unwrap_or_else(|| self.model.clone()),
            embedding: overrides
                .embedding
                .clone()
                .unwrap_or_else(|| self.embedding.clone()),
            temperature: overrides.temperature.unwrap_or(self.temperature),
            top_k: overrides.top_k.unwrap_or(self.top_k),
            grounded: overrides.grounded.unwrap_or(self.grounded),
        }
    }

    /// Compare this (previous) snapshot against `next`, field by field.
    pub fn diff(&self, next: &ChainConfig) -> ConfigDiff {
        ConfigDiff {
            model: self.model != next.model,
            temperature: self.temperature != next.temperature,
            embedding: self.embedding != next.embedding,
            top_k: self.top_k != next.top_k,
            grounded: self.grounded != next.grounded,
        }
    }
}

/// Optional per-call overrides carried by a send request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub model: Option<Model>,
    pub embedding: Option<EmbeddingModel>,
    pub temperature: Option<f32>,
    pub top_k: Option<usize>,
    pub grounded: Option<bool>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<Model>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_embedding(mut self, embedding: impl Into<EmbeddingModel>) -> Self {
        self.embedding = Some(embedding.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_grounded(mut self, grounded: bool) -> Self {
        self.grounded = Some(grounded);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_none()
            && self.embedding.is_none()
            && self.temperature.is_none()
            && self.top_k.is_none()
            && self.grounded.is_none()
    }
}

/// Which fields differ between two configuration snapshots.
///
/// The rebuild rules live here so they can be audited and tested without
/// any adapters involved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    pub model: bool,
    pub temperature: bool,
    pub embedding: bool,
    pub top_k: bool,
    pub grounded: bool,
}

impl ConfigDiff {
    /// Model name or temperature changed.
    pub fn rebuild_model(&self) -> bool {
        self.model || self.temperature
    }

    /// Embedding model or retrieval width changed.
    pub fn rebuild_retriever(&self) -> bool {
        self.embedding || self.top_k
    }

    /// Anything changed, so the active pipeline must be recomposed.
    pub fn rebuild_pipeline(&self) -> bool {
        self.rebuild_model() || self.rebuild_retriever() || self.grounded
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.model {
            fields.push("model");
        }
        if self.temperature {
            fields.push("temperature");
        }
        if self.embedding {
            fields.push("embedding");
        }
        if self.top_k {
            fields.push("top_k");
        }
        if self.grounded {
            fields.push("grounded");
        }
        fields
    }
}
