//! Transcript logging configuration from TOML (`[logging]` section)

use super::expand_home;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ```toml
/// [logging]
/// conversation_log = "~/.local/share/kb-chat/conversation.jsonl"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL transcript file; no transcript when unset
    pub conversation_log: Option<String>,
}

impl FileLoggingConfig {
    pub fn conversation_log_path(&self) -> Option<PathBuf> {
        self.conversation_log
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(expand_home)
    }
}
