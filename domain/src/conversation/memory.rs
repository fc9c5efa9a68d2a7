//! Conversation memory

use super::entities::Turn;
use super::history::HistoryWindow;
use crate::session::entities::Message;

/// Append-only store of completed turns.
///
/// Insertion order is chronological order. The only way to shrink it is
/// [`clear`](Self::clear), which drops every turn at once.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed turn.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Read view over all recorded turns, oldest first.
    pub fn read(&self) -> &[Turn] {
        &self.turns
    }

    /// Discard every turn. Irreversible.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Expand the turns inside `window` into alternating human/assistant
    /// messages.
    pub fn to_messages(&self, window: HistoryWindow) -> Vec<Message> {
        window
            .select(&self.turns)
            .iter()
            .flat_map(|turn| {
                [
                    Message::human(turn.question()),
                    Message::assistant(turn.answer()),
                ]
            })
            .collect()
    }
}
