//! Retrieval domain.
//!
//! - [`passage::Passage`]: a retrieved (or ingested) text unit
//! - [`combine::DocumentCombiner`]: renders passages into a prompt context

pub mod combine;
pub mod passage;
