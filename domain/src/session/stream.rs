//! Streaming events for model output.
//!
//! [`StreamEvent`] represents individual events in a streaming model
//! response. Provider adapters translate their own event shapes (SSE
//! fragments, cumulative snapshots, single payloads) into this sequence.

/// An event in a streaming model response.
///
/// A well-formed stream is zero or more `Delta` events followed by exactly
/// one terminal event (`Completed` or `Error`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment from the model.
    Delta(String),
    /// The complete response text (signals stream end).
    Completed(String),
    /// An error that occurred during streaming.
    Error(String),
}
