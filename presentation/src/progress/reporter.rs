//! Progress reporting for chain invocations

use indicatif::{ProgressBar, ProgressStyle};
use kbchat_application::ChainProgressNotifier;
use kbchat_domain::{ChainPhase, Passage};
use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shows a spinner until the answer starts, then streams the answer to
/// stdout as it arrives.
///
/// Retrieved passages are kept so the caller can list sources afterwards.
pub struct ProgressReporter {
    show_spinner: bool,
    stream_answer: bool,
    spinner: Mutex<Option<ProgressBar>>,
    streamed: AtomicBool,
    passages: Mutex<Vec<Passage>>,
}

impl ProgressReporter {
    /// Spinner plus streamed answer
    pub fn new() -> Self {
        Self {
            show_spinner: true,
            stream_answer: true,
            spinner: Mutex::new(None),
            streamed: AtomicBool::new(false),
            passages: Mutex::new(Vec::new()),
        }
    }

    /// Nothing printed; only passages are recorded
    pub fn silent() -> Self {
        Self {
            show_spinner: false,
            stream_answer: false,
            ..Self::new()
        }
    }

    /// Stream the answer without a spinner
    pub fn without_spinner(mut self) -> Self {
        self.show_spinner = false;
        self
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn phase_message(phase: ChainPhase) -> Option<&'static str> {
        match phase {
            ChainPhase::Condensing => Some("Condensing question..."),
            ChainPhase::Retrieving => Some("Searching knowledge base..."),
            ChainPhase::Generating => Some("Thinking..."),
            ChainPhase::Idle | ChainPhase::Committed => None,
        }
    }

    fn clear_spinner(&self) {
        if let Ok(mut spinner) = self.spinner.lock()
            && let Some(pb) = spinner.take()
        {
            pb.finish_and_clear();
        }
    }

    /// Whether any part of the answer was written to stdout.
    pub fn streamed(&self) -> bool {
        self.streamed.load(Ordering::Relaxed)
    }

    /// Passages reported by the last retrieval.
    pub fn passages(&self) -> Vec<Passage> {
        self.passages
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Clear the spinner and end the streamed line.
    pub fn finish(&self) {
        self.clear_spinner();
        if self.streamed() {
            println!();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainProgressNotifier for ProgressReporter {
    fn on_phase(&self, phase: ChainPhase) {
        if !self.show_spinner {
            return;
        }
        let Some(message) = Self::phase_message(phase) else {
            self.clear_spinner();
            return;
        };
        let Ok(mut spinner) = self.spinner.lock() else {
            return;
        };
        match spinner.as_ref() {
            Some(pb) => pb.set_message(message),
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(Self::spinner_style());
                pb.set_message(message);
                pb.enable_steady_tick(Duration::from_millis(100));
                *spinner = Some(pb);
            }
        }
    }

    fn on_passages(&self, passages: &[Passage]) {
        if let Ok(mut kept) = self.passages.lock() {
            *kept = passages.to_vec();
        }
    }

    fn on_answer_chunk(&self, chunk: &str) {
        if !self.stream_answer {
            return;
        }
        if !self.streamed.swap(true, Ordering::Relaxed) {
            self.clear_spinner();
        }
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(chunk.as_bytes());
        let _ = stdout.flush();
    }
}
