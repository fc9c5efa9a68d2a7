//! Chat model port
//!
//! Defines the interface for generating completions from a chat-capable
//! language model. Adapters live in the infrastructure layer.

use async_trait::async_trait;
use kbchat_domain::{Message, Model, StreamEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while talking to a chat model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Authentication, configuration or unknown-model failures.
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    /// Rate limits, timeouts and other failures worth retrying.
    #[error("Transient model failure: {0}")]
    Transient(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl ModelError {
    /// Whether a higher layer may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::Transient(_) | ModelError::StreamInterrupted(_)
        )
    }
}

/// Handle for receiving streaming events from a chat model.
///
/// Wraps an `mpsc::Receiver<StreamEvent>`. The sequence is lazy, finite and
/// can be consumed only once.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// A handle that yields `text` as a single completed response.
    pub fn completed(text: String) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a fresh channel: this cannot fail.
        let _ = tx.try_send(StreamEvent::Completed(text));
        Self::new(rx)
    }

    /// Receive the next event, or `None` once the stream is exhausted.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(self) -> Result<String, ModelError> {
        self.forward_text(|_| {}).await
    }

    /// Consume the stream, handing each text fragment to `on_chunk`.
    ///
    /// Returns the concatenated text, which equals what a non-streaming
    /// call would have produced. When the producer only sends `Completed`
    /// the full text is forwarded as one fragment.
    pub async fn forward_text(
        mut self,
        mut on_chunk: impl FnMut(&str) + Send,
    ) -> Result<String, ModelError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => {
                    on_chunk(&chunk);
                    full_text.push_str(&chunk);
                }
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        on_chunk(&text);
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => {
                    return Err(ModelError::StreamInterrupted(e));
                }
            }
        }
        // Producer went away before a terminal event: the text is truncated.
        Err(ModelError::StreamInterrupted(
            "stream ended without a terminal event".into(),
        ))
    }
}

/// A chat model bound to one model name and temperature.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Get the model this adapter talks to
    fn model(&self) -> &Model;

    /// Sampling temperature fixed at construction
    fn temperature(&self) -> f32;

    /// Generate a completion for the given messages
    async fn generate(&self, messages: &[Message]) -> Result<String, ModelError>;

    /// Generate a completion as a stream of fragments.
    ///
    /// Default implementation calls `generate()` and wraps the result in a
    /// single `Completed` event.
    async fn generate_streaming(&self, messages: &[Message]) -> Result<StreamHandle, ModelError> {
        let result = self.generate(messages).await?;
        Ok(StreamHandle::completed(result))
    }
}

/// Builds chat model adapters.
///
/// Called once at startup and again whenever the model name or the
/// temperature changes.
#[async_trait]
pub trait ChatModelProvider: Send + Sync {
    async fn build(&self, model: &Model, temperature: f32)
    -> Result<Arc<dyn ChatModel>, ModelError>;
}
