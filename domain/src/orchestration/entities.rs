//! Orchestration domain entities

use crate::core::error::DomainError;
use crate::core::question::Question;
use serde::{Deserialize, Serialize};

/// Phase of a chain invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPhase {
    /// No invocation in flight
    Idle,
    /// Rewriting the follow-up into a standalone question
    Condensing,
    /// Fetching passages for the standalone question
    Retrieving,
    /// Producing the answer
    Generating,
    /// Turn appended to memory
    Committed,
}

impl ChainPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainPhase::Idle => "idle",
            ChainPhase::Condensing => "condensing",
            ChainPhase::Retrieving => "retrieving",
            ChainPhase::Generating => "generating",
            ChainPhase::Committed => "committed",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ChainPhase::Idle => "Idle",
            ChainPhase::Condensing => "Condensing question",
            ChainPhase::Retrieving => "Searching knowledge base",
            ChainPhase::Generating => "Generating answer",
            ChainPhase::Committed => "Done",
        }
    }
}

impl std::fmt::Display for ChainPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Which pipeline variant an invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// condense → retrieve → combine → answer
    Grounded,
    /// history + question → answer
    Ungrounded,
}

impl PipelineKind {
    pub fn from_grounded(grounded: bool) -> Self {
        if grounded {
            PipelineKind::Grounded
        } else {
            PipelineKind::Ungrounded
        }
    }

    pub fn is_grounded(&self) -> bool {
        matches!(self, PipelineKind::Grounded)
    }

    /// The phases an invocation walks through, in order.
    pub fn phases(&self) -> &'static [ChainPhase] {
        match self {
            PipelineKind::Grounded => &[
                ChainPhase::Condensing,
                ChainPhase::Retrieving,
                ChainPhase::Generating,
                ChainPhase::Committed,
            ],
            PipelineKind::Ungrounded => &[ChainPhase::Generating, ChainPhase::Committed],
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineKind::Grounded => write!(f, "grounded"),
            PipelineKind::Ungrounded => write!(f, "ungrounded"),
        }
    }
}

/// A single chain invocation (Entity)
///
/// Tracks the phase of one `send`. Transitions follow the pipeline's phase
/// list strictly: no phase is skipped, repeated or re-entered.
#[derive(Debug, Clone)]
pub struct ChainRun {
    question: Question,
    pipeline: PipelineKind,
    phase: ChainPhase,
    visited: Vec<ChainPhase>,
}

impl ChainRun {
    pub fn new(question: Question, pipeline: PipelineKind) -> Self {
        Self {
            question,
            pipeline,
            phase: ChainPhase::Idle,
            visited: Vec::new(),
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn pipeline(&self) -> PipelineKind {
        self.pipeline
    }

    pub fn phase(&self) -> ChainPhase {
        self.phase
    }

    /// Phases entered so far, oldest first.
    pub fn visited(&self) -> &[ChainPhase] {
        &self.visited
    }

    /// Move to `next`, rejecting anything but the pipeline's next phase.
    ///
    /// `Committed → Idle` closes the run; after that no further transition
    /// is accepted.
    pub fn advance(&mut self, next: ChainPhase) -> Result<(), DomainError> {
        let expected = self.expected_next();
        if expected != Some(next) {
            return Err(DomainError::InvalidTransition {
                from: self.phase.as_str(),
                to: next.as_str(),
            });
        }
        if next != ChainPhase::Idle {
            self.visited.push(next);
        }
        self.phase = next;
        Ok(())
    }

    /// Abandon the run after a failure. Nothing was committed.
    pub fn abort(&mut self) {
        self.phase = ChainPhase::Idle;
        self.visited.clear();
    }

    /// Whether the run reached `Committed`.
    pub fn is_committed(&self) -> bool {
        self.visited.last() == Some(&ChainPhase::Committed)
    }

    fn expected_next(&self) -> Option<ChainPhase> {
        let phases = self.pipeline.phases();
        match self.phase {
            ChainPhase::Idle if self.visited.is_empty() => phases.first().copied(),
            ChainPhase::Idle => None,
            ChainPhase::Committed => Some(ChainPhase::Idle),
            current => {
                let pos = phases.iter().position(|p| *p == current)?;
                phases.get(pos + 1).copied()
            }
        }
    }
}
