//! Provider configuration from TOML (`[providers]` section)

use crate::providers::openai::settings::{
    DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_EMBEDDING_BATCH,
};
use crate::providers::openai::{
    ChatEndpoint, ChatEndpoints, EmbeddingEndpoint, EmbeddingEndpoints, MessageDialect,
    StreamMode,
};
use kbchat_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// OpenAI-compatible chat endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOpenAiConfig {
    /// Environment variable name for the API key (default: "OPENAI_API_KEY").
    pub api_key_env: String,
    /// Direct API key (not recommended; prefer the env var).
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Request streamed responses
    pub stream: bool,
    /// "incremental" or "cumulative"
    pub stream_mode: String,
    /// "openai" or "system_field"
    pub dialect: String,
    pub max_tokens: Option<u32>,
}

impl Default for FileOpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
            stream: true,
            stream_mode: StreamMode::default().as_str().to_string(),
            dialect: MessageDialect::default().as_str().to_string(),
            max_tokens: None,
        }
    }
}

/// Embedding endpoint settings. Unset fields inherit from `[providers.openai]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEmbeddingsConfig {
    pub api_key_env: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub batch_size: Option<usize>,
}

/// Per-model endpoint override, keyed by catalog name.
///
/// ```toml
/// [providers.endpoints.chatglm_turbo]
/// base_url = "https://open.bigmodel.cn/api/paas/v3"
/// api_key_env = "ZHIPUAI_API_KEY"
/// dialect = "system_field"
/// stream_mode = "cumulative"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEndpointOverride {
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub api_key: Option<String>,
    /// Model id sent on the wire
    pub model_id: Option<String>,
    pub timeout_secs: Option<u64>,
    pub stream: Option<bool>,
    pub stream_mode: Option<String>,
    pub dialect: Option<String>,
    pub max_tokens: Option<u32>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProvidersConfig {
    pub openai: FileOpenAiConfig,
    pub embeddings: FileEmbeddingsConfig,
    /// Chat model name → endpoint override
    pub endpoints: HashMap<String, FileEndpointOverride>,
    /// Embedding model name → endpoint override
    pub embedding_endpoints: HashMap<String, FileEndpointOverride>,
}

fn parse_dialect(field: &str, value: &str) -> (MessageDialect, Vec<ConfigIssue>) {
    match value.parse::<MessageDialect>() {
        Ok(dialect) => (dialect, vec![]),
        Err(_) => (
            MessageDialect::default(),
            vec![ConfigIssue::warning(
                ConfigIssueCode::InvalidEnumValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    valid_values: MessageDialect::valid_values(),
                },
                format!("{}: unknown dialect '{}', falling back to 'openai'", field, value),
            )],
        ),
    }
}

fn parse_stream_mode(field: &str, value: &str) -> (StreamMode, Vec<ConfigIssue>) {
    match value.parse::<StreamMode>() {
        Ok(mode) => (mode, vec![]),
        Err(_) => (
            StreamMode::default(),
            vec![ConfigIssue::warning(
                ConfigIssueCode::InvalidEnumValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    valid_values: StreamMode::valid_values(),
                },
                format!(
                    "{}: unknown stream mode '{}', falling back to 'incremental'",
                    field, value
                ),
            )],
        ),
    }
}

impl FileProvidersConfig {
    fn default_chat_endpoint(&self) -> (ChatEndpoint, Vec<ConfigIssue>) {
        let openai = &self.openai;
        let (dialect, mut issues) = parse_dialect("providers.openai.dialect", &openai.dialect);
        let (stream_mode, mode_issues) =
            parse_stream_mode("providers.openai.stream_mode", &openai.stream_mode);
        issues.extend(mode_issues);

        let endpoint = ChatEndpoint {
            base_url: openai.base_url.clone(),
            api_key: openai.api_key.clone(),
            api_key_env: openai.api_key_env.clone(),
            model_id: None,
            dialect,
            stream: openai.stream,
            stream_mode,
            timeout: Duration::from_secs(openai.timeout_secs),
            max_tokens: openai.max_tokens,
        };
        (endpoint, issues)
    }

    /// Resolve chat endpoints, applying per-model overrides to the default.
    pub fn to_chat_endpoints(&self) -> (ChatEndpoints, Vec<ConfigIssue>) {
        let (default, mut issues) = self.default_chat_endpoint();
        let mut overrides = HashMap::new();

        for (model, o) in &self.endpoints {
            let mut endpoint = default.clone();
            if let Some(v) = &o.base_url {
                endpoint.base_url = v.clone();
            }
            if let Some(v) = &o.api_key_env {
                endpoint.api_key_env = v.clone();
                // A different key source must not inherit the default's inline key.
                endpoint.api_key = None;
            }
            if o.api_key.is_some() {
                endpoint.api_key = o.api_key.clone();
            }
            if o.model_id.is_some() {
                endpoint.model_id = o.model_id.clone();
            }
            if let Some(v) = o.timeout_secs {
                endpoint.timeout = Duration::from_secs(v);
            }
            if let Some(v) = o.stream {
                endpoint.stream = v;
            }
            if let Some(v) = &o.stream_mode {
                let (mode, mode_issues) =
                    parse_stream_mode(&format!("providers.endpoints.{}.stream_mode", model), v);
                endpoint.stream_mode = mode;
                issues.extend(mode_issues);
            }
            if let Some(v) = &o.dialect {
                let (dialect, dialect_issues) =
                    parse_dialect(&format!("providers.endpoints.{}.dialect", model), v);
                endpoint.dialect = dialect;
                issues.extend(dialect_issues);
            }
            if o.max_tokens.is_some() {
                endpoint.max_tokens = o.max_tokens;
            }
            overrides.insert(model.clone(), endpoint);
        }

        (ChatEndpoints { default, overrides }, issues)
    }

    /// Resolve embedding endpoints.
    pub fn to_embedding_endpoints(&self) -> EmbeddingEndpoints {
        let e = &self.embeddings;
        let default = EmbeddingEndpoint {
            base_url: e
                .base_url
                .clone()
                .unwrap_or_else(|| self.openai.base_url.clone()),
            api_key: e.api_key.clone().or_else(|| {
                // Only inherit the inline key along with its env var.
                e.api_key_env
                    .is_none()
                    .then(|| self.openai.api_key.clone())
                    .flatten()
            }),
            api_key_env: e
                .api_key_env
                .clone()
                .unwrap_or_else(|| self.openai.api_key_env.clone()),
            model_id: None,
            timeout: Duration::from_secs(e.timeout_secs.unwrap_or(self.openai.timeout_secs)),
            batch_size: e.batch_size.unwrap_or(DEFAULT_EMBEDDING_BATCH),
        };

        let overrides = self
            .embedding_endpoints
            .iter()
            .map(|(model, o)| {
                let mut endpoint = default.clone();
                if let Some(v) = &o.base_url {
                    endpoint.base_url = v.clone();
                }
                if let Some(v) = &o.api_key_env {
                    endpoint.api_key_env = v.clone();
                    endpoint.api_key = None;
                }
                if o.api_key.is_some() {
                    endpoint.api_key = o.api_key.clone();
                }
                endpoint.model_id = o.model_id.clone();
                if let Some(v) = o.timeout_secs {
                    endpoint.timeout = Duration::from_secs(v);
                }
                if let Some(v) = o.batch_size {
                    endpoint.batch_size = v;
                }
                (model.clone(), endpoint)
            })
            .collect();

        EmbeddingEndpoints { default, overrides }
    }
}
