//! Progress notification port
//!
//! Defines the interface for reporting progress while a chain invocation
//! is in flight.

use kbchat_domain::{ChainPhase, Passage};

/// Callback for progress updates during a chain invocation
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (spinner, streamed text, etc.)
pub trait ChainProgressNotifier: Send + Sync {
    /// Called when the invocation enters a phase
    fn on_phase(&self, phase: ChainPhase);

    /// Called once retrieval has returned
    fn on_passages(&self, _passages: &[Passage]) {}

    /// Called for each answer fragment as it arrives
    fn on_answer_chunk(&self, _chunk: &str) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ChainProgressNotifier for NoProgress {
    fn on_phase(&self, _phase: ChainPhase) {}
}
