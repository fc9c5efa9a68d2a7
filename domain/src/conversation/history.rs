//! History formatting for condensation prompts.
//!
//! Renders prior turns as a labeled transcript:
//!
//! ```text
//! Human: What is the capital of France?
//! Assistant: Paris.
//! ```

use super::entities::Turn;
use crate::core::error::DomainError;
use crate::session::entities::{Message, Role};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How much of the conversation is included in a formatted transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryWindow {
    /// Every recorded exchange.
    #[default]
    Full,
    /// Only the most recent exchange.
    LastExchange,
    /// The most recent `n` exchanges.
    LastTurns(usize),
}

impl HistoryWindow {
    /// The trailing slice of `turns` this window covers.
    pub fn select<'a>(&self, turns: &'a [Turn]) -> &'a [Turn] {
        &turns[turns.len() - self.keep(turns.len())..]
    }

    fn keep(&self, total: usize) -> usize {
        match self {
            HistoryWindow::Full => total,
            HistoryWindow::LastExchange => total.min(1),
            HistoryWindow::LastTurns(n) => total.min(*n),
        }
    }
}

impl std::fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryWindow::Full => write!(f, "full"),
            HistoryWindow::LastExchange => write!(f, "last_exchange"),
            HistoryWindow::LastTurns(n) => write!(f, "last:{}", n),
        }
    }
}

impl std::str::FromStr for HistoryWindow {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "full" => Ok(HistoryWindow::Full),
            "last_exchange" => Ok(HistoryWindow::LastExchange),
            other => {
                let n = other
                    .strip_prefix("last:")
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| DomainError::InvalidHistoryWindow(other.to_string()))?;
                Ok(HistoryWindow::LastTurns(n))
            }
        }
    }
}

impl Serialize for HistoryWindow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HistoryWindow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Formats conversation history into a transcript block.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryFormatter {
    window: HistoryWindow,
}

impl HistoryFormatter {
    pub fn new(window: HistoryWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> HistoryWindow {
        self.window
    }

    /// Format recorded turns. Empty history yields an empty string.
    pub fn format_turns(&self, turns: &[Turn]) -> String {
        let mut buffer = String::new();
        for turn in self.window.select(turns) {
            push_line(&mut buffer, Role::Human, turn.question());
            push_line(&mut buffer, Role::Assistant, turn.answer());
        }
        buffer
    }

    /// Format raw role-tagged messages.
    ///
    /// An exchange starts at each human message, so a trailing question
    /// without an answer forms its own (incomplete) exchange and is
    /// rendered as a lone `Human:` line.
    pub fn format_messages(&self, messages: &[Message]) -> String {
        let mut exchanges: Vec<&[Message]> = Vec::new();
        let mut start = 0;
        for (i, message) in messages.iter().enumerate() {
            if message.role == Role::Human && i > start {
                exchanges.push(&messages[start..i]);
                start = i;
            }
        }
        if start < messages.len() {
            exchanges.push(&messages[start..]);
        }

        let skip = exchanges.len() - self.window.keep(exchanges.len());
        let mut buffer = String::new();
        for message in exchanges[skip..].iter().flat_map(|e| e.iter()) {
            push_line(&mut buffer, message.role, &message.content);
        }
        buffer
    }
}

fn push_line(buffer: &mut String, role: Role, content: &str) {
    buffer.push_str(role.label());
    buffer.push_str(": ");
    buffer.push_str(content);
    buffer.push('\n');
}
