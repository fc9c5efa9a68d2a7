//! Presentation-level configuration
//!
//! Settings that only change how the REPL looks and behaves.

use std::path::PathBuf;

/// REPL configuration for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct ReplConfig {
    /// Show a spinner while condensing and searching
    pub show_progress: bool,
    /// List passage sources under grounded answers
    pub show_sources: bool,
    /// Path to the line-editor history file
    pub history_file: Option<PathBuf>,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            show_progress: true,
            show_sources: false,
            history_file: Self::default_history_file(),
        }
    }
}

impl ReplConfig {
    /// `$XDG_DATA_HOME/kb-chat/history.txt`
    pub fn default_history_file() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("kb-chat").join("history.txt"))
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_sources(mut self, show: bool) -> Self {
        self.show_sources = show;
        self
    }

    /// Use `path` for history; `None` keeps the default location.
    pub fn with_history_file(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.history_file = path;
        }
        self
    }
}
