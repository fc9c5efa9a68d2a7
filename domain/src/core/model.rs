//! Chat and embedding model value objects

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Chat-capable language models (Value Object)
///
/// Known models get their own variant; anything else is carried as
/// [`Model::Custom`] and accepted only if the [`ModelCatalog`] lists it.
///
/// [`ModelCatalog`]: crate::config::ModelCatalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Model {
    Gpt35Turbo,
    ChatglmTurbo,
    ErnieBotTurbo,
    Custom(String),
}

impl Model {
    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        match self {
            Model::Gpt35Turbo => "gpt-3.5-turbo",
            Model::ChatglmTurbo => "chatglm_turbo",
            Model::ErnieBotTurbo => "ERNIE-Bot-turbo",
            Model::Custom(s) => s,
        }
    }

    /// Models known out of the box
    pub fn known_models() -> Vec<Model> {
        vec![Model::ChatglmTurbo, Model::Gpt35Turbo, Model::ErnieBotTurbo]
    }
}

impl Default for Model {
    /// Returns the default model (gpt-3.5-turbo)
    fn default() -> Self {
        Model::Gpt35Turbo
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "gpt-3.5-turbo" => Model::Gpt35Turbo,
            "chatglm_turbo" => Model::ChatglmTurbo,
            "ERNIE-Bot-turbo" => Model::ErnieBotTurbo,
            other => Model::Custom(other.to_string()),
        })
    }
}

impl From<&str> for Model {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(model) => model,
            Err(never) => match never {},
        }
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Model::from(s.as_str()))
    }
}

/// Embedding models used to index and query the knowledge base (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EmbeddingModel {
    TextEmbeddingAda002,
    ZhipuTextEmbedding,
    EmbeddingV1,
    BgeLargeEn,
    BgeLargeZh,
    Custom(String),
}

impl EmbeddingModel {
    pub fn as_str(&self) -> &str {
        match self {
            EmbeddingModel::TextEmbeddingAda002 => "text-embedding-ada-002",
            EmbeddingModel::ZhipuTextEmbedding => "text_embedding",
            EmbeddingModel::EmbeddingV1 => "Embedding-V1",
            EmbeddingModel::BgeLargeEn => "bge-large-en",
            EmbeddingModel::BgeLargeZh => "bge-large-zh",
            EmbeddingModel::Custom(s) => s,
        }
    }

    pub fn known_models() -> Vec<EmbeddingModel> {
        vec![
            EmbeddingModel::TextEmbeddingAda002,
            EmbeddingModel::ZhipuTextEmbedding,
            EmbeddingModel::EmbeddingV1,
            EmbeddingModel::BgeLargeEn,
            EmbeddingModel::BgeLargeZh,
        ]
    }
}

impl Default for EmbeddingModel {
    fn default() -> Self {
        EmbeddingModel::TextEmbeddingAda002
    }
}

impl std::fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EmbeddingModel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "text-embedding-ada-002" => EmbeddingModel::TextEmbeddingAda002,
            "text_embedding" => EmbeddingModel::ZhipuTextEmbedding,
            "Embedding-V1" => EmbeddingModel::EmbeddingV1,
            "bge-large-en" => EmbeddingModel::BgeLargeEn,
            "bge-large-zh" => EmbeddingModel::BgeLargeZh,
            other => EmbeddingModel::Custom(other.to_string()),
        })
    }
}

impl From<&str> for EmbeddingModel {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(model) => model,
            Err(never) => match never {},
        }
    }
}

impl Serialize for EmbeddingModel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EmbeddingModel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(EmbeddingModel::from(s.as_str()))
    }
}
