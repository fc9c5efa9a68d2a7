//! REPL (Read-Eval-Print Loop) for interactive chat

use crate::{ConsoleFormatter, ProgressReporter, ReplConfig};
use indicatif::ProgressBar;
use kbchat_application::{ConversationChain, SendRequest};
use kbchat_domain::{ConfigOverrides, EmbeddingModel, Model};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A parsed slash command
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Help,
    Quit,
    Clear,
    Config,
    Retry,
    Upload(Vec<PathBuf>),
    Model(String),
    Embedding(String),
    Temperature(f32),
    TopK(usize),
    Knowledge(bool),
    /// Known command with bad arguments; carries the usage line
    Usage(&'static str),
    Unknown(String),
}

impl ReplCommand {
    /// Parse a line starting with `/`.
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match name {
            "/quit" | "/exit" | "/q" => Self::Quit,
            "/help" | "/h" | "/?" => Self::Help,
            "/clear" => Self::Clear,
            "/config" => Self::Config,
            "/retry" => Self::Retry,
            "/upload" if args.is_empty() => Self::Usage("/upload <path>..."),
            "/upload" => Self::Upload(args.iter().map(PathBuf::from).collect()),
            "/model" => match args.as_slice() {
                [name] => Self::Model(name.to_string()),
                _ => Self::Usage("/model <name>"),
            },
            "/embedding" => match args.as_slice() {
                [name] => Self::Embedding(name.to_string()),
                _ => Self::Usage("/embedding <name>"),
            },
            "/temperature" => match args.as_slice() {
                [value] => value
                    .parse()
                    .map(Self::Temperature)
                    .unwrap_or(Self::Usage("/temperature <0.0-1.0>")),
                _ => Self::Usage("/temperature <0.0-1.0>"),
            },
            "/topk" => match args.as_slice() {
                [value] => value
                    .parse()
                    .map(Self::TopK)
                    .unwrap_or(Self::Usage("/topk <n>")),
                _ => Self::Usage("/topk <n>"),
            },
            "/kb" => match args.as_slice() {
                ["on"] => Self::Knowledge(true),
                ["off"] => Self::Knowledge(false),
                _ => Self::Usage("/kb on|off"),
            },
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The configuration change this command asks for, if any
    pub fn overrides(&self) -> Option<ConfigOverrides> {
        let overrides = ConfigOverrides::new();
        Some(match self {
            Self::Model(name) => overrides.with_model(Model::from(name.as_str())),
            Self::Embedding(name) => {
                overrides.with_embedding(EmbeddingModel::from(name.as_str()))
            }
            Self::Temperature(value) => overrides.with_temperature(*value),
            Self::TopK(value) => overrides.with_top_k(*value),
            Self::Knowledge(on) => overrides.with_grounded(*on),
            _ => return None,
        })
    }
}

/// Interactive chat REPL
pub struct ChatRepl {
    chain: Arc<ConversationChain>,
    config: ReplConfig,
    formatter: ConsoleFormatter,
    last_question: Option<String>,
}

impl ChatRepl {
    /// Create a new ChatRepl
    pub fn new(chain: Arc<ConversationChain>) -> Self {
        Self {
            chain,
            config: ReplConfig::default(),
            formatter: ConsoleFormatter::new(),
            last_question: None,
        }
    }

    pub fn with_config(mut self, config: ReplConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the interactive REPL
    pub async fn run(&mut self) -> RlResult<()> {
        let mut rl = DefaultEditor::new()?;

        if let Some(path) = &self.config.history_file {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        self.print_welcome().await;

        loop {
            let readline = rl.readline(">>> ");

            match readline {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(line);

                    if line.starts_with('/') {
                        if self.handle_command(ReplCommand::parse(line)).await {
                            break;
                        }
                        continue;
                    }

                    self.process_question(line.to_string()).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(path) = &self.config.history_file {
            let _ = rl.save_history(path);
        }

        Ok(())
    }

    async fn print_welcome(&self) {
        println!();
        println!("{}", self.formatter.header("kb-chat"));
        println!();
        println!("{}", self.formatter.format_config(&self.chain.config().await));
        println!();
        println!("Type /help for commands, /quit to exit.");
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("Commands:");
        println!("  /help, /h, /?        - Show this help");
        println!("  /config              - Show current settings");
        println!("  /model <name>        - Switch chat model");
        println!("  /embedding <name>    - Switch embedding model");
        println!("  /temperature <t>     - Set sampling temperature (0.0-1.0)");
        println!("  /topk <n>            - Passages retrieved per question");
        println!("  /kb on|off           - Answer from the knowledge base or not");
        println!("  /upload <path>...    - Add documents to the knowledge base");
        println!("  /retry               - Ask the last question again");
        println!("  /clear               - Forget the conversation so far");
        println!("  /quit, /exit, /q     - Exit chat");
        println!();
        let catalog = self.chain.catalog();
        println!(
            "Models: {}",
            catalog
                .models()
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "Embeddings: {}",
            catalog
                .embeddings()
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!();
    }

    /// Handle slash commands. Returns true if should exit.
    async fn handle_command(&mut self, command: ReplCommand) -> bool {
        if let Some(overrides) = command.overrides() {
            match self.chain.configure(overrides).await {
                Ok(config) => println!("{}", self.formatter.format_config(&config)),
                Err(e) => eprintln!("{}", self.formatter.format_error(&e)),
            }
            return false;
        }

        match command {
            ReplCommand::Quit => {
                println!("Bye!");
                return true;
            }
            ReplCommand::Help => self.print_help(),
            ReplCommand::Config => {
                println!("{}", self.formatter.format_config(&self.chain.config().await));
            }
            ReplCommand::Clear => {
                self.chain.clear_history().await;
                self.last_question = None;
                println!("Conversation cleared.");
            }
            ReplCommand::Retry => match self.last_question.clone() {
                Some(question) => self.process_question(question).await,
                None => println!("Nothing to retry."),
            },
            ReplCommand::Upload(paths) => self.upload(&paths).await,
            ReplCommand::Usage(usage) => println!("Usage: {}", usage),
            ReplCommand::Unknown(name) => {
                println!("Unknown command: {}", name);
                println!("Type /help for available commands");
            }
            // Configuration commands were handled above
            _ => {}
        }
        false
    }

    async fn upload(&self, paths: &[PathBuf]) {
        let spinner = self.config.show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_message("Indexing documents...");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let result = self.chain.upload(paths).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        match result {
            Ok(count) => println!("{}", self.formatter.format_upload(count, paths.len())),
            Err(e) => eprintln!("{}", self.formatter.format_error(&e)),
        }
    }

    async fn process_question(&mut self, question: String) {
        println!();
        self.last_question = Some(question.clone());

        let progress = if self.config.show_progress {
            ProgressReporter::new()
        } else {
            ProgressReporter::new().without_spinner()
        };

        // Ctrl-C while the answer is in flight cancels the turn only.
        let token = CancellationToken::new();
        let watcher = {
            let token = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
            })
        };

        let request = SendRequest::new(question).with_cancellation(token);
        let result = self.chain.send_with_progress(request, &progress).await;
        watcher.abort();
        progress.finish();

        match result {
            Ok(_) => {
                self.last_question = None;
                if self.config.show_sources && self.chain.config().await.grounded {
                    println!();
                    println!("{}", self.formatter.format_sources(&progress.passages()));
                }
            }
            Err(e) => {
                eprintln!("{}", self.formatter.format_error(&e));
                if e.is_retryable() {
                    eprintln!("Type /retry to ask again.");
                }
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ReplCommand::parse("/quit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/q"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/?"), ReplCommand::Help);
        assert_eq!(ReplCommand::parse("/clear"), ReplCommand::Clear);
        assert_eq!(ReplCommand::parse("/config"), ReplCommand::Config);
        assert_eq!(ReplCommand::parse("/retry"), ReplCommand::Retry);
    }

    #[test]
    fn test_parse_upload_paths() {
        assert_eq!(
            ReplCommand::parse("/upload notes.md  docs/*.txt"),
            ReplCommand::Upload(vec![PathBuf::from("notes.md"), PathBuf::from("docs/*.txt")])
        );
        assert!(matches!(ReplCommand::parse("/upload"), ReplCommand::Usage(_)));
    }

    #[test]
    fn test_parse_settings() {
        assert_eq!(
            ReplCommand::parse("/model chatglm_turbo"),
            ReplCommand::Model("chatglm_turbo".to_string())
        );
        assert_eq!(
            ReplCommand::parse("/embedding bge-large-en"),
            ReplCommand::Embedding("bge-large-en".to_string())
        );
        assert_eq!(ReplCommand::parse("/temperature 0.7"), ReplCommand::Temperature(0.7));
        assert_eq!(ReplCommand::parse("/topk 5"), ReplCommand::TopK(5));
        assert_eq!(ReplCommand::parse("/kb on"), ReplCommand::Knowledge(true));
        assert_eq!(ReplCommand::parse("/kb off"), ReplCommand::Knowledge(false));
    }

    #[test]
    fn test_parse_bad_arguments() {
        assert!(matches!(ReplCommand::parse("/temperature warm"), ReplCommand::Usage(_)));
        assert!(matches!(ReplCommand::parse("/topk -1"), ReplCommand::Usage(_)));
        assert!(matches!(ReplCommand::parse("/kb maybe"), ReplCommand::Usage(_)));
        assert!(matches!(ReplCommand::parse("/model"), ReplCommand::Usage(_)));
        assert_eq!(
            ReplCommand::parse("/models"),
            ReplCommand::Unknown("/models".to_string())
        );
    }

    #[test]
    fn test_overrides_for_settings_commands() {
        assert_eq!(
            ReplCommand::Model("ERNIE-Bot-turbo".into()).overrides(),
            Some(ConfigOverrides::new().with_model(Model::ErnieBotTurbo))
        );
        assert_eq!(
            ReplCommand::Knowledge(true).overrides(),
            Some(ConfigOverrides::new().with_grounded(true))
        );
        assert_eq!(ReplCommand::TopK(0).overrides().unwrap().top_k, Some(0));
        assert_eq!(ReplCommand::Clear.overrides(), None);
    }
}
