//! Raw TOML configuration data types
//!
//! These structs mirror the TOML file layout. String-typed enum fields are
//! parsed by `parse_*`/`to_*` helpers that return the value together with
//! any [`ConfigIssue`]s found along the way.

mod catalog;
mod chain;
mod knowledge;
mod logging;
mod providers;
mod repl;

pub use catalog::FileCatalogConfig;
pub use chain::FileChainConfig;
pub use knowledge::FileKnowledgeConfig;
pub use logging::FileLoggingConfig;
pub use providers::{
    FileEmbeddingsConfig, FileEndpointOverride, FileOpenAiConfig, FileProvidersConfig,
};
pub use repl::FileReplConfig;

use kbchat_domain::{ConfigIssue, ConfigIssueCode, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Model, retrieval and prompt settings
    pub chain: FileChainConfig,
    /// Extra accepted model names
    pub catalog: FileCatalogConfig,
    /// Endpoint settings
    pub providers: FileProvidersConfig,
    /// Ingestion settings
    pub knowledge: FileKnowledgeConfig,
    /// Transcript settings
    pub logging: FileLoggingConfig,
    /// REPL settings
    pub repl: FileReplConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Checks, in order: empty model names, the chain values against the
    /// catalog, enum fields in `[chain]` and `[providers]`, the document
    /// template, and chunking.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let (chain, chain_issues) = self.chain.to_chain_config();
        let names_present = chain_issues.is_empty();
        issues.extend(chain_issues);

        let catalog = self.catalog.to_catalog();
        issues.extend(
            chain
                .problems(&catalog)
                .into_iter()
                // Empty names were already reported above.
                .filter(|p| {
                    names_present
                        || !matches!(
                            p,
                            ConfigurationError::UnknownModel(_)
                                | ConfigurationError::UnknownEmbedding(_)
                        )
                })
                .map(configuration_issue),
        );

        issues.extend(
            self.chain
                .to_chain_options(self.knowledge.retrieval_timeout())
                .1,
        );
        issues.extend(self.providers.to_chat_endpoints().1);
        issues.extend(self.knowledge.to_loader().1);

        issues
    }
}

fn configuration_issue(error: ConfigurationError) -> ConfigIssue {
    let message = format!("chain: {}", error);
    match error {
        ConfigurationError::InvalidTopK => ConfigIssue::error(ConfigIssueCode::InvalidTopK, message),
        ConfigurationError::InvalidTemperature(value) => ConfigIssue::error(
            ConfigIssueCode::InvalidTemperature {
                value: value.to_string(),
            },
            message,
        ),
        ConfigurationError::UnknownModel(value) => ConfigIssue::error(
            ConfigIssueCode::UnknownModel {
                field: "chain.model".to_string(),
                value,
            },
            message + " (add it under [catalog] models)",
        ),
        ConfigurationError::UnknownEmbedding(value) => ConfigIssue::error(
            ConfigIssueCode::UnknownModel {
                field: "chain.embedding".to_string(),
                value,
            },
            message + " (add it under [catalog] embeddings)",
        ),
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
