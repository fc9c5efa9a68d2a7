//! Configuration file loading for kb-chat
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `KBCHAT_`-prefixed environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./kb-chat.toml` or `./.kb-chat.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/kb-chat/config.toml`
//! 5. Default values
//!
//! Command-line flags sit above all of these and are applied by the binary.

mod file_config;
mod loader;

pub use file_config::{
    FileCatalogConfig, FileChainConfig, FileConfig, FileEmbeddingsConfig, FileEndpointOverride,
    FileKnowledgeConfig, FileLoggingConfig, FileOpenAiConfig, FileProvidersConfig, FileReplConfig,
    expand_home,
};
pub use loader::ConfigLoader;
