//! Configuration issues reported by file validation.
//!
//! Validation never stops at the first problem: every detected issue is
//! returned with a severity so callers can decide whether to abort.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A model name field is empty.
    EmptyModelName { field: String },
    /// A model name is not in the catalog.
    UnknownModel { field: String, value: String },
    /// `top_k` is zero.
    InvalidTopK,
    /// Temperature is outside the accepted range.
    InvalidTemperature { value: String },
    /// A string field does not parse into its enum.
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// A document template does not parse.
    InvalidTemplate { field: String },
    /// Chunk overlap is not smaller than the chunk size.
    ChunkOverlapTooLarge,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
