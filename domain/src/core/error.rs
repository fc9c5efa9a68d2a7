//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Unknown message role: {0}")]
    UnknownRole(String),

    #[error("Document template references missing variable: {0}")]
    MissingTemplateVariable(String),

    #[error("Malformed document template: {0}")]
    MalformedTemplate(String),

    #[error("Invalid history window: {0}")]
    InvalidHistoryWindow(String),

    #[error("Invalid chain phase transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Rejected configuration values.
///
/// Raised synchronously while validating overrides, before any adapter is
/// rebuilt or any backend is contacted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("top_k must be greater than 0")]
    InvalidTopK,

    #[error("temperature {0} is outside the valid range [0.0, 1.0]")]
    InvalidTemperature(f32),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown embedding model: {0}")]
    UnknownEmbedding(String),
}
