//! Orchestration domain
//!
//! Phases of a chain invocation and the policy for overlapping sends.

pub mod entities;
pub mod policy;

pub use entities::{ChainPhase, ChainRun, PipelineKind};
pub use policy::InvocationPolicy;
