//! Chain configuration from TOML (`[chain]` section)

use kbchat_application::ChainOptions;
use kbchat_domain::{
    ChainConfig, ConfigIssue, ConfigIssueCode, DocumentCombiner, DocumentTemplate,
    EmbeddingModel, HistoryWindow, InvocationPolicy, Model,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw chain configuration from TOML
///
/// # Example
///
/// ```toml
/// [chain]
/// model = "gpt-3.5-turbo"
/// embedding = "text-embedding-ada-002"
/// temperature = 0.1
/// top_k = 3
/// grounded = false
/// history_window = "full"        # or "last_exchange", "last:4"
/// invocation_policy = "serialize" # or "reject"
/// separator = "\n\n"
/// document_template = "{page_content}"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChainConfig {
    pub model: String,
    pub embedding: String,
    pub temperature: f32,
    pub top_k: usize,
    pub grounded: bool,
    pub history_window: String,
    pub invocation_policy: String,
    pub separator: String,
    pub document_template: String,
}

impl Default for FileChainConfig {
    fn default() -> Self {
        let chain = ChainConfig::default();
        Self {
            model: chain.model.to_string(),
            embedding: chain.embedding.to_string(),
            temperature: chain.temperature,
            top_k: chain.top_k,
            grounded: chain.grounded,
            history_window: HistoryWindow::default().to_string(),
            invocation_policy: InvocationPolicy::default().to_string(),
            separator: kbchat_domain::DEFAULT_SEPARATOR.to_string(),
            document_template: DocumentTemplate::default().as_str().to_string(),
        }
    }
}

impl FileChainConfig {
    /// Convert to the domain configuration.
    ///
    /// Range and catalog checks are left to
    /// [`ChainConfig::validate`](kbchat_domain::ChainConfig::validate).
    pub fn to_chain_config(&self) -> (ChainConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        for (field, value) in [("model", &self.model), ("embedding", &self.embedding)] {
            if value.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyModelName {
                        field: field.to_string(),
                    },
                    format!("chain.{}: model name cannot be empty", field),
                ));
            }
        }

        let config = ChainConfig {
            model: Model::from(self.model.trim()),
            embedding: EmbeddingModel::from(self.embedding.trim()),
            temperature: self.temperature,
            top_k: self.top_k,
            grounded: self.grounded,
        };
        (config, issues)
    }

    pub fn parse_history_window(&self) -> (HistoryWindow, Vec<ConfigIssue>) {
        match self.history_window.parse::<HistoryWindow>() {
            Ok(window) => (window, vec![]),
            Err(_) => (
                HistoryWindow::default(),
                vec![ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "chain.history_window".to_string(),
                        value: self.history_window.clone(),
                        valid_values: vec![
                            "full".to_string(),
                            "last_exchange".to_string(),
                            "last:<n>".to_string(),
                        ],
                    },
                    format!(
                        "chain.history_window: invalid value '{}', falling back to 'full'",
                        self.history_window
                    ),
                )],
            ),
        }
    }

    pub fn parse_invocation_policy(&self) -> (InvocationPolicy, Vec<ConfigIssue>) {
        match self.invocation_policy.parse::<InvocationPolicy>() {
            Ok(policy) => (policy, vec![]),
            Err(_) => (
                InvocationPolicy::default(),
                vec![ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "chain.invocation_policy".to_string(),
                        value: self.invocation_policy.clone(),
                        valid_values: vec!["serialize".to_string(), "reject".to_string()],
                    },
                    format!(
                        "chain.invocation_policy: invalid value '{}', falling back to 'serialize'",
                        self.invocation_policy
                    ),
                )],
            ),
        }
    }

    pub fn parse_combiner(&self) -> (DocumentCombiner, Vec<ConfigIssue>) {
        match DocumentTemplate::parse(self.document_template.as_str()) {
            Ok(template) => (DocumentCombiner::new(template, self.separator.as_str()), vec![]),
            Err(e) => (
                DocumentCombiner::default(),
                vec![ConfigIssue::error(
                    ConfigIssueCode::InvalidTemplate {
                        field: "chain.document_template".to_string(),
                    },
                    format!("chain.document_template: {}", e),
                )],
            ),
        }
    }

    /// Build the fixed chain options.
    pub fn to_chain_options(&self, retrieval_timeout: Duration) -> (ChainOptions, Vec<ConfigIssue>) {
        let (history_window, mut issues) = self.parse_history_window();
        let (invocation_policy, policy_issues) = self.parse_invocation_policy();
        let (combiner, combiner_issues) = self.parse_combiner();
        issues.extend(policy_issues);
        issues.extend(combiner_issues);

        let options = ChainOptions::default()
            .with_history_window(history_window)
            .with_invocation_policy(invocation_policy)
            .with_combiner(combiner)
            .with_retrieval_timeout(retrieval_timeout);
        (options, issues)
    }
}
