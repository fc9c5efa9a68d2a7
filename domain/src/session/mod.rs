//! Prompt session domain.
//!
//! - [`entities::Message`]: a role-tagged prompt message
//! - [`entities::Role`]: the closed role vocabulary
//! - [`stream::StreamEvent`]: events of an incremental model response

pub mod entities;
pub mod stream;
