//! CLI command definitions

use clap::{Parser, ValueEnum};
use kbchat_domain::{ConfigOverrides, EmbeddingModel, Model};
use std::path::PathBuf;

/// Output format for one-shot answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Answer text, streamed as it arrives
    Text,
    /// One JSON object with the answer, configuration and sources
    Json,
}

/// CLI arguments for kb-chat
#[derive(Parser, Debug)]
#[command(name = "kb-chat")]
#[command(author, version, about = "Conversational question answering over your own documents")]
#[command(long_about = r#"
kb-chat answers questions with a chat model, optionally grounded in a
knowledge base built from documents you upload.

Grounded answers go through three steps:
1. Condense: the follow-up is rewritten into a standalone question
2. Retrieve: the closest passages are fetched from the knowledge base
3. Answer: the model answers from those passages

Configuration files are loaded from (in priority order):
1. KBCHAT_* environment variables (KBCHAT_CHAIN__TOP_K=5)
2. --config <path>     Explicit config file
3. ./kb-chat.toml      Project-level config
4. ~/.config/kb-chat/config.toml   Global config

Example:
  kb-chat "What is the capital of France?"
  kb-chat --upload notes/ --grounded "What did we decide about caching?"
  kb-chat --chat --model chatglm_turbo --embedding bge-large-zh
"#)]
pub struct Cli {
    /// The question to ask (not required in chat mode)
    pub question: Option<String>,

    /// Start interactive chat mode
    #[arg(short, long)]
    pub chat: bool,

    /// Chat model to answer with
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Embedding model used for the knowledge base
    #[arg(short, long, value_name = "MODEL")]
    pub embedding: Option<String>,

    /// Sampling temperature (0.0 - 1.0)
    #[arg(short, long, value_name = "FLOAT")]
    pub temperature: Option<f32>,

    /// Number of passages retrieved per question
    #[arg(short = 'k', long, value_name = "N")]
    pub top_k: Option<usize>,

    /// Answer from the knowledge base
    #[arg(short, long, conflicts_with = "ungrounded")]
    pub grounded: bool,

    /// Answer from the conversation alone
    #[arg(long)]
    pub ungrounded: bool,

    /// Documents (files, directories or glob patterns) to load before asking
    #[arg(short, long, value_name = "PATH", num_args = 1..)]
    pub upload: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Request whole responses instead of event streams
    #[arg(long)]
    pub no_stream: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// `Some(true)` for `--grounded`, `Some(false)` for `--ungrounded`.
    pub fn grounded_override(&self) -> Option<bool> {
        match (self.grounded, self.ungrounded) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Chain settings given on the command line.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            model: self.model.as_deref().map(Model::from),
            embedding: self.embedding.as_deref().map(EmbeddingModel::from),
            temperature: self.temperature,
            top_k: self.top_k,
            grounded: self.grounded_override(),
        }
    }
}
