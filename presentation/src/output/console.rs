//! Console output formatter for answers, errors and configuration

use colored::{ColoredString, Colorize};
use kbchat_application::ChainError;
use kbchat_domain::{ChainConfig, ConfigIssue, Passage, Severity};
use serde_json::json;

/// Formats chain results for console display
pub struct ConsoleFormatter {
    colored: bool,
}

impl ConsoleFormatter {
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Disable colors
    pub fn without_colors(mut self) -> Self {
        self.colored = false;
        self
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.colored {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Framed title used by the REPL welcome screen
    pub fn header(&self, title: &str) -> String {
        let line = "=".repeat(50);
        format!(
            "{}\n{:^50}\n{}",
            self.paint(&line, |s| s.cyan()),
            self.paint(title, |s| s.bold()),
            self.paint(&line, |s| s.cyan())
        )
    }

    /// Current chain settings, one per line
    pub fn format_config(&self, config: &ChainConfig) -> String {
        let rows = [
            ("model", config.model.to_string()),
            ("embedding", config.embedding.to_string()),
            ("temperature", config.temperature.to_string()),
            ("top_k", config.top_k.to_string()),
            (
                "knowledge base",
                if config.grounded { "on" } else { "off" }.to_string(),
            ),
        ];

        rows.iter()
            .map(|(key, value)| format!("  {:<15} {}", self.paint(key, |s| s.dimmed()), value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Numbered list of where the retrieved passages came from
    pub fn format_sources(&self, passages: &[Passage]) -> String {
        if passages.is_empty() {
            return self.paint("No passages retrieved.", |s| s.dimmed());
        }

        let mut output = self.paint("Sources:", |s| s.cyan().bold());
        for (i, passage) in passages.iter().enumerate() {
            let source = passage.source().unwrap_or("(inline)");
            let location = match passage.metadata.get("chunk") {
                Some(chunk) => format!("{} #{}", source, chunk),
                None => source.to_string(),
            };
            output.push_str(&format!("\n  [{}] {}", i + 1, location));
        }
        output
    }

    /// Machine-readable result of a one-shot question
    pub fn format_json(
        &self,
        question: &str,
        answer: &str,
        config: &ChainConfig,
        passages: &[Passage],
    ) -> String {
        let value = json!({
            "question": question,
            "answer": answer,
            "config": config,
            "sources": passages,
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn format_error(&self, error: &ChainError) -> String {
        let mut output = format!("{} {}", self.paint("Error:", |s| s.red().bold()), error);
        if error.is_retryable() {
            output.push_str(&format!(
                "\n{}",
                self.paint("  (temporary failure, the question can be asked again)", |s| {
                    s.yellow()
                })
            ));
        }
        output
    }

    /// One line per configuration issue, errors first
    pub fn format_issues(&self, issues: &[ConfigIssue]) -> String {
        let mut sorted: Vec<&ConfigIssue> = issues.iter().collect();
        sorted.sort_by_key(|i| i.severity != Severity::Error);

        sorted
            .iter()
            .map(|issue| match issue.severity {
                Severity::Error => {
                    format!("{} {}", self.paint("error:", |s| s.red().bold()), issue.message)
                }
                Severity::Warning => format!(
                    "{} {}",
                    self.paint("warning:", |s| s.yellow().bold()),
                    issue.message
                ),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn format_upload(&self, passages: usize, paths: usize) -> String {
        format!(
            "{} Indexed {} passage{} from {} path{}",
            self.paint("v", |s| s.green()),
            passages,
            if passages == 1 { "" } else { "s" },
            paths,
            if paths == 1 { "" } else { "s" }
        )
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ConsoleFormatter {
    fn default() -> Self {
        Self::new()
    }
}
