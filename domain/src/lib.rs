//! Domain layer for kb-chat
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Conversation
//!
//! A conversation is an ordered list of committed [`Turn`]s kept in
//! [`ConversationMemory`]. The [`HistoryFormatter`] renders it into the
//! transcript fed to the condensation prompt.
//!
//! ## Grounding
//!
//! A grounded invocation rewrites the follow-up into a standalone question,
//! retrieves [`Passage`]s for it and combines them into the answer context
//! with a [`DocumentCombiner`]. An ungrounded invocation answers from the
//! history alone.
//!
//! ## Reconfiguration
//!
//! [`ChainConfig`] is replaced per send through [`ConfigOverrides`]; the
//! resulting [`ConfigDiff`] decides which adapters are rebuilt.

pub mod config;
pub mod conversation;
pub mod core;
pub mod orchestration;
pub mod prompt;
pub mod retrieval;
pub mod session;
pub mod util;

// Re-export commonly used types
pub use config::{
    ChainConfig, ConfigDiff, ConfigIssue, ConfigIssueCode, ConfigOverrides, ModelCatalog, Severity,
};
pub use conversation::{
    entities::Turn,
    history::{HistoryFormatter, HistoryWindow},
    memory::ConversationMemory,
};
pub use core::{
    error::{ConfigurationError, DomainError},
    model::{EmbeddingModel, Model},
    question::Question,
};
pub use orchestration::{ChainPhase, ChainRun, InvocationPolicy, PipelineKind};
pub use prompt::PromptTemplate;
pub use retrieval::{
    combine::{DEFAULT_SEPARATOR, DocumentCombiner, DocumentTemplate},
    passage::Passage,
};
pub use session::{
    entities::{Message, Role},
    stream::StreamEvent,
};
