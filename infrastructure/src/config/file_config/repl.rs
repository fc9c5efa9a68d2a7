//! REPL configuration from TOML (`[repl]` section)

use super::expand_home;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw REPL configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileReplConfig {
    /// Show a spinner while condensing and searching
    pub show_progress: bool,
    /// List the sources of retrieved passages under each grounded answer
    pub show_sources: bool,
    /// Path to the line-editor history file
    pub history_file: Option<String>,
}

impl Default for FileReplConfig {
    fn default() -> Self {
        Self {
            show_progress: true,
            show_sources: false,
            history_file: None,
        }
    }
}

impl FileReplConfig {
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file.as_deref().map(expand_home)
    }
}
