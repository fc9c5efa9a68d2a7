//! Application-level configuration.
//!
//! - [`ChainOptions`]: fixed parameters of a conversation chain (history
//!   window, invocation policy, document combiner, retrieval timeout)

pub mod chain_options;

pub use chain_options::ChainOptions;
