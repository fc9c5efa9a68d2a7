//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`] / [`model::EmbeddingModel`]: chat and embedding model names
//! - [`question::Question`]: a validated user question
//! - [`error::DomainError`] / [`error::ConfigurationError`]: domain-level errors

pub mod error;
pub mod model;
pub mod question;
