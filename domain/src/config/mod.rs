//! Configuration value objects for the domain layer
//!
//! These are domain concepts related to configuration that are
//! used across multiple layers.

pub mod catalog;
pub mod chain_config;
pub mod validation;

pub use catalog::ModelCatalog;
pub use chain_config::{ChainConfig, ConfigDiff, ConfigOverrides};
pub use validation::{ConfigIssue, ConfigIssueCode, Severity};
