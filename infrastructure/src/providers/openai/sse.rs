//! Server-sent event decoding and stream normalisation
//!
//! [`SseDecoder`] turns raw response bytes into complete events regardless
//! of how the transport chunked them. [`StreamAccumulator`] turns event
//! payloads into fragments, whether the provider sends each event as a
//! fragment or as the full text so far.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Marker some providers send as the final `data:` line.
pub const DONE_MARKER: &str = "[DONE]";

/// How a provider's stream payloads relate to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// Each event carries the next fragment.
    #[default]
    Incremental,
    /// Each event carries the whole text produced so far.
    Cumulative,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Incremental => "incremental",
            StreamMode::Cumulative => "cumulative",
        }
    }

    pub fn valid_values() -> Vec<String> {
        vec!["incremental".to_string(), "cumulative".to_string()]
    }
}

impl FromStr for StreamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incremental" => Ok(StreamMode::Incremental),
            "cumulative" | "full" => Ok(StreamMode::Cumulative),
            other => Err(format!("unknown stream mode '{}'", other)),
        }
    }
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Payload { event: Option<String>, data: String },
    Done,
}

/// Incremental SSE line decoder.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks decode correctly. Consecutive
/// `data:` lines of one event are joined with `\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.handle_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the body ends.
    pub fn finish(&mut self) -> Option<SseData> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest).into_owned();
            if let Some(event) = self.handle_line(rest.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn handle_line(&mut self, line: &str) -> Option<SseData> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseData> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        if data.trim() == DONE_MARKER {
            return Some(SseData::Done);
        }
        Some(SseData::Payload { event, data })
    }
}

/// Normalises stream payloads into fragments.
///
/// The concatenation of every fragment returned by [`push`](Self::push)
/// always equals [`text`](Self::text).
#[derive(Debug)]
pub struct StreamAccumulator {
    mode: StreamMode,
    text: String,
}

impl StreamAccumulator {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            text: String::new(),
        }
    }

    /// Take one payload and return the new fragment, if any.
    pub fn push(&mut self, payload: &str) -> Option<String> {
        let fragment = match self.mode {
            StreamMode::Incremental => payload.to_string(),
            StreamMode::Cumulative => {
                if let Some(rest) = payload.strip_prefix(self.text.as_str()) {
                    rest.to_string()
                } else {
                    // The provider rewrote text we already emitted. Keep
                    // what was sent and take only what extends past it.
                    warn!(
                        emitted = self.text.len(),
                        snapshot = payload.len(),
                        "Cumulative stream diverged from emitted text"
                    );
                    let emitted_chars = self.text.chars().count();
                    payload.chars().skip(emitted_chars).collect()
                }
            }
        };
        if fragment.is_empty() {
            return None;
        }
        self.text.push_str(&fragment);
        Some(fragment)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
