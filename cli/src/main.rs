//! CLI entrypoint for kb-chat
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use kbchat_application::{ChainAdapters, ConversationChain, SendRequest};
use kbchat_domain::Severity;
use kbchat_infrastructure::{
    ConfigLoader, FileConfig, JsonlConversationLogger, LocalKnowledgeBase, OpenAiEmbeddingProvider,
    OpenAiModelProvider,
};
use kbchat_presentation::{
    ChatRepl, Cli, ConsoleFormatter, OutputFormat, ProgressReporter, ReplConfig,
};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.show_config {
        ConfigLoader::print_config_sources();
        return Ok(());
    }

    info!("Starting kb-chat");

    // === Configuration ===
    let mut file_config: FileConfig = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("failed to load configuration")?
    };

    if cli.no_stream {
        file_config.providers.openai.stream = false;
        for endpoint in file_config.providers.endpoints.values_mut() {
            endpoint.stream = Some(false);
        }
    }

    let formatter = ConsoleFormatter::new();
    let issues = file_config.validate();
    if !issues.is_empty() {
        eprintln!("{}", formatter.format_issues(&issues));
    }
    if issues.iter().any(|i| i.severity == Severity::Error) {
        bail!("configuration has errors");
    }

    let (file_chain, _) = file_config.chain.to_chain_config();
    let config = file_chain.apply(&cli.overrides());
    let catalog = file_config.catalog.to_catalog();
    let (options, _) = file_config
        .chain
        .to_chain_options(file_config.knowledge.retrieval_timeout());
    debug!(?config, ?options, "Effective chain configuration");

    // === Dependency Injection ===
    let (chat_endpoints, _) = file_config.providers.to_chat_endpoints();
    let embedding_endpoints = file_config.providers.to_embedding_endpoints();
    let (loader, _) = file_config.knowledge.to_loader();

    let adapters = ChainAdapters {
        models: Arc::new(OpenAiModelProvider::new(chat_endpoints)),
        knowledge: Arc::new(LocalKnowledgeBase::new(Arc::new(
            OpenAiEmbeddingProvider::new(embedding_endpoints),
        ))),
        loader: Arc::new(loader),
    };

    let mut chain = ConversationChain::new(config, catalog, options, adapters).await?;

    if let Some(path) = file_config.logging.conversation_log_path() {
        let logger = JsonlConversationLogger::open(&path)
            .with_context(|| format!("failed to open conversation log {}", path.display()))?;
        info!("Conversation log: {}", path.display());
        chain = chain.with_conversation_logger(Arc::new(logger));
    }
    let chain = Arc::new(chain);

    if !cli.upload.is_empty() {
        let count = chain.upload(&cli.upload).await?;
        if !cli.quiet && cli.output == OutputFormat::Text {
            eprintln!("{}", formatter.format_upload(count, cli.upload.len()));
        }
    }

    // Chat mode
    if cli.chat {
        let repl_config = ReplConfig::default()
            .with_progress(file_config.repl.show_progress && !cli.quiet)
            .with_sources(file_config.repl.show_sources)
            .with_history_file(file_config.repl.history_path());

        let mut repl = ChatRepl::new(chain).with_config(repl_config);
        repl.run().await?;
        return Ok(());
    }

    // Single question mode - question is required
    let question = match cli.question {
        Some(q) => q,
        None => bail!("Question is required. Use --chat for interactive mode."),
    };

    let progress = match cli.output {
        OutputFormat::Json => ProgressReporter::silent(),
        OutputFormat::Text if cli.quiet => ProgressReporter::new().without_spinner(),
        OutputFormat::Text => ProgressReporter::new(),
    };

    let result = chain
        .send_with_progress(SendRequest::new(question.clone()), &progress)
        .await;
    progress.finish();
    let answer = result?;

    match cli.output {
        OutputFormat::Json => {
            let config = chain.config().await;
            println!(
                "{}",
                formatter.format_json(&question, &answer, &config, &progress.passages())
            );
        }
        OutputFormat::Text => {
            if !progress.streamed() {
                println!("{}", answer);
            }
            if file_config.repl.show_sources && chain.config().await.grounded {
                println!();
                println!("{}", formatter.format_sources(&progress.passages()));
            }
        }
    }

    Ok(())
}
