//! Resolved endpoint settings for chat and embedding requests

use super::dialect::MessageDialect;
use super::sse::StreamMode;
use kbchat_domain::{EmbeddingModel, Model};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_EMBEDDING_BATCH: usize = 64;

fn read_key(explicit: &Option<String>, env_var: &str) -> Option<String> {
    explicit
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|key| !key.trim().is_empty())
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Where and how to send chat completions for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEndpoint {
    pub base_url: String,
    /// Inline key; takes precedence over `api_key_env`
    pub api_key: Option<String>,
    pub api_key_env: String,
    /// Model id sent on the wire when it differs from the catalog name
    pub model_id: Option<String>,
    pub dialect: MessageDialect,
    pub stream: bool,
    pub stream_mode: StreamMode,
    pub timeout: Duration,
    pub max_tokens: Option<u32>,
}

impl Default for ChatEndpoint {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            model_id: None,
            dialect: MessageDialect::default(),
            stream: true,
            stream_mode: StreamMode::default(),
            timeout: DEFAULT_TIMEOUT,
            max_tokens: None,
        }
    }
}

impl ChatEndpoint {
    pub fn resolve_api_key(&self) -> Option<String> {
        read_key(&self.api_key, &self.api_key_env)
    }

    pub fn url(&self) -> String {
        join_url(&self.base_url, "chat/completions")
    }

    pub fn wire_model<'a>(&'a self, model: &'a Model) -> &'a str {
        self.model_id.as_deref().unwrap_or(model.as_str())
    }
}

/// Default chat endpoint plus per-model overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatEndpoints {
    pub default: ChatEndpoint,
    pub overrides: HashMap<String, ChatEndpoint>,
}

impl ChatEndpoints {
    pub fn for_model(&self, model: &Model) -> &ChatEndpoint {
        self.overrides.get(model.as_str()).unwrap_or(&self.default)
    }
}

/// Where to send embedding requests for one embedding model.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingEndpoint {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub model_id: Option<String>,
    pub timeout: Duration,
    /// Texts per request when indexing
    pub batch_size: usize,
}

impl Default for EmbeddingEndpoint {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            model_id: None,
            timeout: DEFAULT_TIMEOUT,
            batch_size: DEFAULT_EMBEDDING_BATCH,
        }
    }
}

impl EmbeddingEndpoint {
    pub fn resolve_api_key(&self) -> Option<String> {
        read_key(&self.api_key, &self.api_key_env)
    }

    pub fn url(&self) -> String {
        join_url(&self.base_url, "embeddings")
    }

    pub fn wire_model<'a>(&'a self, model: &'a EmbeddingModel) -> &'a str {
        self.model_id.as_deref().unwrap_or(model.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingEndpoints {
    pub default: EmbeddingEndpoint,
    pub overrides: HashMap<String, EmbeddingEndpoint>,
}

impl EmbeddingEndpoints {
    pub fn for_model(&self, model: &EmbeddingModel) -> &EmbeddingEndpoint {
        self.overrides.get(model.as_str()).unwrap_or(&self.default)
    }
}
