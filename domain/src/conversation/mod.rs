//! Conversation domain.
//!
//! - [`entities::Turn`]: one committed question/answer exchange
//! - [`memory::ConversationMemory`]: append-only turn store
//! - [`history::HistoryFormatter`]: transcript rendering with a configurable window

pub mod entities;
pub mod history;
pub mod memory;
