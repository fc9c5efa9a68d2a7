//! Interactive chat module
//!
//! Provides a readline-based interactive chat interface over a
//! conversation chain.

mod repl;

pub use repl::{ChatRepl, ReplCommand};
