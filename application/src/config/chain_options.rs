//! Chain options: construction-time behaviour of the conversation chain.
//!
//! [`ChainOptions`] groups the parameters that are fixed for the lifetime
//! of a [`ConversationChain`](crate::use_cases::conversation_chain::ConversationChain).
//! Unlike [`ChainConfig`](kbchat_domain::ChainConfig) they cannot be
//! overridden per send.

use crate::ports::retriever::DEFAULT_RETRIEVAL_TIMEOUT;
use kbchat_domain::{DocumentCombiner, HistoryWindow, InvocationPolicy};
use std::time::Duration;

/// Fixed parameters of a conversation chain.
#[derive(Debug, Clone)]
pub struct ChainOptions {
    /// How much history the condensation prompt and ungrounded prompt see.
    pub history_window: HistoryWindow,
    /// What happens to a send that overlaps another.
    pub invocation_policy: InvocationPolicy,
    /// Passage template and separator for the grounded context.
    pub combiner: DocumentCombiner,
    /// Bound on each retrieval call.
    pub retrieval_timeout: Duration,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            history_window: HistoryWindow::default(),
            invocation_policy: InvocationPolicy::default(),
            combiner: DocumentCombiner::default(),
            retrieval_timeout: DEFAULT_RETRIEVAL_TIMEOUT,
        }
    }
}

impl ChainOptions {
    // ==================== Builder Methods ====================

    pub fn with_history_window(mut self, window: HistoryWindow) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_invocation_policy(mut self, policy: InvocationPolicy) -> Self {
        self.invocation_policy = policy;
        self
    }

    pub fn with_combiner(mut self, combiner: DocumentCombiner) -> Self {
        self.combiner = combiner;
        self
    }

    pub fn with_retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval_timeout = timeout;
        self
    }
}
