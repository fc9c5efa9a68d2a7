//! Conversation chain use case
//!
//! Answers questions against a chat model, optionally grounded in the
//! knowledge base, while keeping multi-turn memory across live
//! reconfiguration.
//!
//! A grounded send runs
//!
//! ```text
//! question + history -> condense -> standalone question
//!     -> retrieve -> combine -> answer prompt -> model -> memory
//! ```
//!
//! and an ungrounded send hands the history messages plus the question
//! straight to the model.

use crate::config::ChainOptions;
use crate::ports::chat_model::{ChatModel, ChatModelProvider, ModelError};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::document_loader::{DocumentLoader, IngestError};
use crate::ports::progress::{ChainProgressNotifier, NoProgress};
use crate::ports::retriever::{KnowledgeBackend, RetrievalError, Retriever};
use kbchat_domain::util::truncate_str;
use kbchat_domain::{
    ChainConfig, ChainPhase, ChainRun, ConfigOverrides, ConfigurationError, ConversationMemory,
    DomainError, HistoryFormatter, InvocationPolicy, Message, ModelCatalog, PipelineKind,
    PromptTemplate, Question, Turn,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that can occur during a chain operation
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestError),

    #[error("Another invocation is already running on this conversation")]
    ConcurrentInvocation,

    #[error("Cancelled")]
    Cancelled,
}

impl ChainError {
    /// Whether re-sending the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChainError::Model(e) => e.is_retryable(),
            ChainError::Retrieval(RetrievalError::Timeout(_)) => true,
            ChainError::ConcurrentInvocation => true,
            _ => false,
        }
    }
}

/// Input for [`ConversationChain::send`].
#[derive(Debug, Clone)]
pub struct SendRequest {
    /// The user's question.
    pub question: String,
    /// Per-call configuration overrides; omitted values keep the current ones.
    pub overrides: ConfigOverrides,
    /// Aborts the invocation when fired. Memory is left untouched.
    pub cancellation: Option<CancellationToken>,
}

impl SendRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            overrides: ConfigOverrides::default(),
            cancellation: None,
        }
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// External collaborators of a chain.
#[derive(Clone)]
pub struct ChainAdapters {
    pub models: Arc<dyn ChatModelProvider>,
    pub knowledge: Arc<dyn KnowledgeBackend>,
    pub loader: Arc<dyn DocumentLoader>,
}

/// Standalone question remembered for retries.
#[derive(Debug, Clone)]
struct CondensedQuestion {
    question: String,
    history_len: usize,
    standalone: String,
}

/// Everything a send reads or replaces. Guarded by one lock.
struct ChainState {
    config: ChainConfig,
    model: Arc<dyn ChatModel>,
    retriever: Retriever,
    pipeline: PipelineKind,
    memory: ConversationMemory,
    condensed: Option<CondensedQuestion>,
}

/// The conversation chain orchestrator.
///
/// Owns exactly one conversation. Sends, uploads and history clears all
/// go through the same lock, so no invocation ever sees a half-swapped
/// model or retriever.
pub struct ConversationChain {
    state: Mutex<ChainState>,
    adapters: ChainAdapters,
    catalog: ModelCatalog,
    options: ChainOptions,
    formatter: HistoryFormatter,
    conversation_logger: Arc<dyn ConversationLogger>,
}

impl ConversationChain {
    /// Build a chain from an initial configuration.
    ///
    /// The configuration is validated and both adapters are built before
    /// the chain exists.
    pub async fn new(
        config: ChainConfig,
        catalog: ModelCatalog,
        options: ChainOptions,
        adapters: ChainAdapters,
    ) -> Result<Self, ChainError> {
        config.validate(&catalog)?;

        let model = adapters
            .models
            .build(&config.model, config.temperature)
            .await?;
        let retriever = build_retriever(adapters.knowledge.as_ref(), &config, &options).await?;

        info!(
            model = %config.model,
            embedding = %config.embedding,
            temperature = config.temperature,
            top_k = config.top_k,
            grounded = config.grounded,
            "Conversation chain ready"
        );

        Ok(Self {
            state: Mutex::new(ChainState {
                pipeline: PipelineKind::from_grounded(config.grounded),
                config,
                model,
                retriever,
                memory: ConversationMemory::new(),
                condensed: None,
            }),
            adapters,
            catalog,
            formatter: HistoryFormatter::new(options.history_window),
            options,
            conversation_logger: Arc::new(NoConversationLogger),
        })
    }

    /// Create with a conversation logger.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &ChainOptions {
        &self.options
    }

    /// Snapshot of the live configuration.
    pub async fn config(&self) -> ChainConfig {
        self.state.lock().await.config.clone()
    }

    /// Snapshot of the recorded turns, oldest first.
    pub async fn history(&self) -> Vec<Turn> {
        self.state.lock().await.memory.read().to_vec()
    }

    /// Send a question and wait for the full answer.
    pub async fn send(&self, request: SendRequest) -> Result<String, ChainError> {
        self.send_with_progress(request, &NoProgress).await
    }

    /// Send a question, reporting phases and answer fragments as they happen.
    ///
    /// Overrides are applied first and stay applied even if the invocation
    /// itself fails. The turn reaches memory only after the answer is
    /// complete; any failure leaves memory exactly as it was.
    pub async fn send_with_progress(
        &self,
        request: SendRequest,
        progress: &dyn ChainProgressNotifier,
    ) -> Result<String, ChainError> {
        let SendRequest {
            question,
            overrides,
            cancellation,
        } = request;
        let question = Question::new(question)?;

        let mut state = self.acquire().await?;
        self.reconfigure(&mut state, &overrides).await?;

        let mut run = ChainRun::new(question, state.pipeline);
        info!(
            pipeline = %run.pipeline(),
            history = state.memory.len(),
            "Starting chain invocation: {}",
            truncate_str(run.question().content(), 100)
        );

        let outcome = match &cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(ChainError::Cancelled),
                result = self.invoke(&mut state, &mut run, progress) => result,
            },
            None => self.invoke(&mut state, &mut run, progress).await,
        };

        match outcome {
            Ok(answer) => {
                enter(&mut run, ChainPhase::Committed, progress)?;
                let question = run.question().content().to_string();
                state.memory.append(Turn::new(question.clone(), answer.clone()));
                state.condensed = None;
                run.advance(ChainPhase::Idle)?;

                info!(turns = state.memory.len(), "Turn committed");
                self.conversation_logger.log(ConversationEvent::new(
                    "turn_committed",
                    json!({
                        "question": question,
                        "answer": answer,
                        "pipeline": run.pipeline().to_string(),
                        "model": state.config.model.to_string(),
                        "turns": state.memory.len(),
                    }),
                ));
                Ok(answer)
            }
            Err(e) => {
                let phase = run.phase();
                run.abort();
                warn!(phase = phase.as_str(), error = %e, "Chain invocation failed");
                self.conversation_logger.log(ConversationEvent::new(
                    "send_failed",
                    json!({
                        "question": run.question().content(),
                        "phase": phase.as_str(),
                        "error": e.to_string(),
                        "retryable": e.is_retryable(),
                    }),
                ));
                Err(e)
            }
        }
    }

    /// Load `paths`, index them with the current embedding model and swap
    /// in a retriever over the new index.
    ///
    /// Configuration and memory are unchanged. If loading or indexing
    /// fails, the previous retriever stays in place. Returns the number of
    /// passages ingested.
    pub async fn upload(&self, paths: &[PathBuf]) -> Result<usize, ChainError> {
        let documents = self.adapters.loader.load(paths).await?;
        if documents.is_empty() {
            return Err(IngestError::Empty.into());
        }
        let count = documents.len();

        let mut state = self.state.lock().await;
        let embedder = self.adapters.knowledge.embedder(&state.config.embedding)?;
        let store = self.adapters.knowledge.index(documents, embedder.clone()).await?;
        state.retriever = Retriever::new(embedder, store, state.config.top_k)
            .with_timeout(self.options.retrieval_timeout);

        info!(
            files = paths.len(),
            passages = count,
            embedding = %state.config.embedding,
            "Knowledge base updated"
        );
        self.conversation_logger.log(ConversationEvent::new(
            "kb_uploaded",
            json!({
                "files": paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                "passages": count,
                "embedding": state.config.embedding.to_string(),
            }),
        ));
        Ok(count)
    }

    /// Drop every recorded turn.
    pub async fn clear_history(&self) {
        let mut state = self.state.lock().await;
        let dropped = state.memory.len();
        state.memory.clear();
        state.condensed = None;

        info!(dropped, "Conversation history cleared");
        self.conversation_logger.log(ConversationEvent::new(
            "history_cleared",
            json!({ "dropped": dropped }),
        ));
    }

    /// Apply overrides without sending a question.
    ///
    /// Same rules as the overrides on a send: validated first, nothing
    /// installed unless every rebuilt adapter was built. Returns the
    /// resulting configuration.
    pub async fn configure(&self, overrides: ConfigOverrides) -> Result<ChainConfig, ChainError> {
        let mut state = self.acquire().await?;
        self.reconfigure(&mut state, &overrides).await?;
        Ok(state.config.clone())
    }

    async fn acquire(&self) -> Result<MutexGuard<'_, ChainState>, ChainError> {
        match self.options.invocation_policy {
            InvocationPolicy::Serialize => Ok(self.state.lock().await),
            InvocationPolicy::Reject => self.state.try_lock().map_err(|_| {
                warn!("Rejected overlapping send");
                ChainError::ConcurrentInvocation
            }),
        }
    }

    /// Apply per-call overrides.
    ///
    /// Validation happens first, then every adapter that needs rebuilding
    /// is built, and only then is anything installed.
    async fn reconfigure(
        &self,
        state: &mut ChainState,
        overrides: &ConfigOverrides,
    ) -> Result<(), ChainError> {
        if overrides.is_empty() {
            return Ok(());
        }

        let next = state.config.apply(overrides);
        next.validate(&self.catalog)?;

        let diff = state.config.diff(&next);
        if !diff.rebuild_pipeline() {
            return Ok(());
        }

        let model = if diff.rebuild_model() {
            Some(
                self.adapters
                    .models
                    .build(&next.model, next.temperature)
                    .await?,
            )
        } else {
            None
        };
        let retriever = if diff.rebuild_retriever() {
            Some(build_retriever(self.adapters.knowledge.as_ref(), &next, &self.options).await?)
        } else {
            None
        };

        if let Some(model) = model {
            state.model = model;
        }
        if let Some(retriever) = retriever {
            state.retriever = retriever;
        }
        state.pipeline = PipelineKind::from_grounded(next.grounded);
        state.condensed = None;

        let changed = diff.changed_fields();
        info!(
            changed = ?changed,
            model = %next.model,
            embedding = %next.embedding,
            temperature = next.temperature,
            top_k = next.top_k,
            pipeline = %state.pipeline,
            "Chain reconfigured"
        );
        self.conversation_logger.log(ConversationEvent::new(
            "reconfigured",
            json!({
                "changed": changed,
                "model": next.model.to_string(),
                "embedding": next.embedding.to_string(),
                "temperature": next.temperature,
                "top_k": next.top_k,
                "grounded": next.grounded,
            }),
        ));
        state.config = next;
        Ok(())
    }

    /// Run the pipeline up to a complete answer. Does not touch memory.
    async fn invoke(
        &self,
        state: &mut ChainState,
        run: &mut ChainRun,
        progress: &dyn ChainProgressNotifier,
    ) -> Result<String, ChainError> {
        let question = run.question().content().to_string();

        let messages = match run.pipeline() {
            PipelineKind::Grounded => {
                enter(run, ChainPhase::Condensing, progress)?;
                let standalone = self.condense(state, &question).await?;

                enter(run, ChainPhase::Retrieving, progress)?;
                let passages = state.retriever.retrieve(&standalone).await?;
                progress.on_passages(&passages);

                let context = self.options.combiner.combine(&passages)?;
                vec![Message::human(PromptTemplate::answer_with_context(
                    &context,
                    &standalone,
                ))]
            }
            PipelineKind::Ungrounded => {
                let mut messages = state.memory.to_messages(self.options.history_window);
                messages.push(Message::human(question));
                messages
            }
        };

        enter(run, ChainPhase::Generating, progress)?;
        let stream = state.model.generate_streaming(&messages).await?;
        let answer = stream
            .forward_text(|chunk| progress.on_answer_chunk(chunk))
            .await?;

        debug!(chars = answer.len(), "Answer generated");
        Ok(answer)
    }

    /// Rewrite `question` into a standalone question.
    ///
    /// Reuses the last result when the question and the history length
    /// are unchanged, so a retry after a transient failure skips this step.
    async fn condense(&self, state: &mut ChainState, question: &str) -> Result<String, ChainError> {
        let history_len = state.memory.len();
        if let Some(cached) = &state.condensed
            && cached.question == question
            && cached.history_len == history_len
        {
            debug!("Reusing condensed question");
            return Ok(cached.standalone.clone());
        }

        let history = self.formatter.format_turns(state.memory.read());
        let prompt = PromptTemplate::condense_question(&history, question);
        let standalone = state.model.generate(&[Message::human(prompt)]).await?;

        let standalone = match standalone.trim() {
            "" => {
                warn!("Model returned an empty standalone question, using the original");
                question.to_string()
            }
            text => text.to_string(),
        };
        debug!(standalone = %standalone, "Condensed question");

        state.condensed = Some(CondensedQuestion {
            question: question.to_string(),
            history_len,
            standalone: standalone.clone(),
        });
        Ok(standalone)
    }
}

fn enter(
    run: &mut ChainRun,
    phase: ChainPhase,
    progress: &dyn ChainProgressNotifier,
) -> Result<(), ChainError> {
    run.advance(phase)?;
    debug!(phase = phase.as_str(), "Chain phase");
    progress.on_phase(phase);
    Ok(())
}

async fn build_retriever(
    knowledge: &dyn KnowledgeBackend,
    config: &ChainConfig,
    options: &ChainOptions,
) -> Result<Retriever, ChainError> {
    let embedder = knowledge.embedder(&config.embedding)?;
    let store = knowledge.open_store(embedder.clone()).await?;
    Ok(Retriever::new(embedder, store, config.top_k).with_timeout(options.retrieval_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::chat_model::StreamHandle;
    use crate::ports::retriever::{Embedder, VectorStore};
    use async_trait::async_trait;
    use kbchat_domain::{EmbeddingModel, Model, Passage, Role, StreamEvent};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::{Notify, mpsc};

    // ==================== Test Mocks ====================

    type Script = Arc<StdMutex<VecDeque<Result<String, ModelError>>>>;
    type Prompts = Arc<StdMutex<Vec<Vec<Message>>>>;

    struct ScriptedModel {
        model: Model,
        temperature: f32,
        script: Script,
        prompts: Prompts,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model(&self) -> &Model {
            &self.model
        }

        fn temperature(&self) -> f32 {
            self.temperature
        }

        async fn generate(&self, messages: &[Message]) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::Unavailable("script exhausted".into())))
        }

        async fn generate_streaming(
            &self,
            messages: &[Message],
        ) -> Result<StreamHandle, ModelError> {
            let text = self.generate(messages).await?;
            let (tx, rx) = mpsc::channel(64);
            for piece in text.split_inclusive(' ') {
                tx.send(StreamEvent::Delta(piece.to_string())).await.unwrap();
            }
            tx.send(StreamEvent::Completed(text)).await.unwrap();
            Ok(StreamHandle::new(rx))
        }
    }

    #[derive(Default)]
    struct ScriptedProvider {
        script: Script,
        prompts: Prompts,
        builds: StdMutex<Vec<(Model, f32)>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedProvider {
        fn with_answers(answers: &[&str]) -> Self {
            let provider = Self::default();
            provider.push_answers(answers);
            provider
        }

        fn push_answers(&self, answers: &[&str]) {
            let mut script = self.script.lock().unwrap();
            for a in answers {
                script.push_back(Ok(a.to_string()));
            }
        }

        fn push_error(&self, error: ModelError) {
            self.script.lock().unwrap().push_back(Err(error));
        }

        fn prompts(&self) -> Vec<Vec<Message>> {
            self.prompts.lock().unwrap().clone()
        }

        fn builds(&self) -> Vec<(Model, f32)> {
            self.builds.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModelProvider for ScriptedProvider {
        async fn build(
            &self,
            model: &Model,
            temperature: f32,
        ) -> Result<Arc<dyn ChatModel>, ModelError> {
            self.builds
                .lock()
                .unwrap()
                .push((model.clone(), temperature));
            Ok(Arc::new(ScriptedModel {
                model: model.clone(),
                temperature,
                script: self.script.clone(),
                prompts: self.prompts.clone(),
                gate: self.gate.clone(),
            }))
        }
    }

    struct SpyEmbedder {
        model: EmbeddingModel,
    }

    #[async_trait]
    impl Embedder for SpyEmbedder {
        fn model(&self) -> &EmbeddingModel {
            &self.model
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(vec![1.0])
        }
    }

    type Searches = Arc<StdMutex<Vec<(EmbeddingModel, usize)>>>;

    struct SpyStore {
        embedding: EmbeddingModel,
        passages: Vec<Passage>,
        searches: Searches,
    }

    #[async_trait]
    impl VectorStore for SpyStore {
        async fn similarity_search(
            &self,
            _vector: &[f32],
            k: usize,
        ) -> Result<Vec<Passage>, RetrievalError> {
            self.searches
                .lock()
                .unwrap()
                .push((self.embedding.clone(), k));
            Ok(self.passages.iter().take(k).cloned().collect())
        }
    }

    #[derive(Default)]
    struct SpyBackend {
        documents: StdMutex<Vec<Passage>>,
        searches: Searches,
        opened: StdMutex<Vec<EmbeddingModel>>,
        unsupported: Option<EmbeddingModel>,
    }

    impl SpyBackend {
        fn searches(&self) -> Vec<(EmbeddingModel, usize)> {
            self.searches.lock().unwrap().clone()
        }

        fn store_for(&self, embedder: &dyn Embedder) -> Arc<dyn VectorStore> {
            self.opened.lock().unwrap().push(embedder.model().clone());
            Arc::new(SpyStore {
                embedding: embedder.model().clone(),
                passages: self.documents.lock().unwrap().clone(),
                searches: self.searches.clone(),
            })
        }
    }

    #[async_trait]
    impl KnowledgeBackend for SpyBackend {
        fn embedder(
            &self,
            embedding: &EmbeddingModel,
        ) -> Result<Arc<dyn Embedder>, RetrievalError> {
            if self.unsupported.as_ref() == Some(embedding) {
                return Err(RetrievalError::UnsupportedEmbedding(embedding.to_string()));
            }
            Ok(Arc::new(SpyEmbedder {
                model: embedding.clone(),
            }))
        }

        async fn open_store(
            &self,
            embedder: Arc<dyn Embedder>,
        ) -> Result<Arc<dyn VectorStore>, RetrievalError> {
            Ok(self.store_for(embedder.as_ref()))
        }

        async fn index(
            &self,
            documents: Vec<Passage>,
            embedder: Arc<dyn Embedder>,
        ) -> Result<Arc<dyn VectorStore>, RetrievalError> {
            self.documents.lock().unwrap().extend(documents);
            Ok(self.store_for(embedder.as_ref()))
        }
    }

    struct StaticLoader {
        passages: Vec<Passage>,
    }

    #[async_trait]
    impl DocumentLoader for StaticLoader {
        async fn load(&self, paths: &[PathBuf]) -> Result<Vec<Passage>, IngestError> {
            if paths.is_empty() {
                return Err(IngestError::Empty);
            }
            Ok(self.passages.clone())
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: StdMutex<Vec<ChainPhase>>,
        chunks: StdMutex<Vec<String>>,
    }

    impl ChainProgressNotifier for RecordingProgress {
        fn on_phase(&self, phase: ChainPhase) {
            self.phases.lock().unwrap().push(phase);
        }

        fn on_answer_chunk(&self, chunk: &str) {
            self.chunks.lock().unwrap().push(chunk.to_string());
        }
    }

    struct Harness {
        provider: Arc<ScriptedProvider>,
        backend: Arc<SpyBackend>,
    }

    impl Harness {
        fn new(provider: ScriptedProvider) -> Self {
            Self::with_backend(provider, SpyBackend::default())
        }

        fn with_backend(provider: ScriptedProvider, backend: SpyBackend) -> Self {
            Self {
                provider: Arc::new(provider),
                backend: Arc::new(backend),
            }
        }

        async fn chain(&self, config: ChainConfig, options: ChainOptions) -> ConversationChain {
            ConversationChain::new(
                config,
                ModelCatalog::default(),
                options,
                ChainAdapters {
                    models: self.provider.clone(),
                    knowledge: self.backend.clone(),
                    loader: Arc::new(StaticLoader {
                        passages: vec![Passage::new("The sky is blue.")],
                    }),
                },
            )
            .await
            .unwrap()
        }
    }

    fn grounded() -> ChainConfig {
        ChainConfig {
            grounded: true,
            ..ChainConfig::default()
        }
    }

    // ==================== Ungrounded ====================

    #[tokio::test]
    async fn test_ungrounded_answer_is_recorded() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["Paris."]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        let answer = chain
            .send(SendRequest::new("What is the capital of France?"))
            .await
            .unwrap();

        assert_eq!(answer, "Paris.");
        let history = chain.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question(), "What is the capital of France?");
        assert_eq!(history[0].answer(), "Paris.");
    }

    #[tokio::test]
    async fn test_follow_up_includes_prior_turn() {
        let harness = Harness::new(ScriptedProvider::with_answers(&[
            "Paris.",
            "About 2.1 million.",
        ]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        chain
            .send(SendRequest::new("What is the capital of France?"))
            .await
            .unwrap();
        chain
            .send(SendRequest::new("And its population?"))
            .await
            .unwrap();

        let prompts = harness.provider.prompts();
        let follow_up = &prompts[1];
        assert_eq!(follow_up.len(), 3);
        assert_eq!(follow_up[0].role, Role::Human);
        assert_eq!(follow_up[0].content, "What is the capital of France?");
        assert_eq!(follow_up[1].role, Role::Assistant);
        assert_eq!(follow_up[1].content, "Paris.");
        assert_eq!(follow_up[2].content, "And its population?");
    }

    #[tokio::test]
    async fn test_memory_grows_in_call_order() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["a1", "a2", "a3"]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        for q in ["q1", "q2", "q3"] {
            chain.send(SendRequest::new(q)).await.unwrap();
        }

        let questions: Vec<String> = chain
            .history()
            .await
            .iter()
            .map(|t| t.question().to_string())
            .collect();
        assert_eq!(questions, vec!["q1", "q2", "q3"]);
    }

    #[tokio::test]
    async fn test_ungrounded_never_retrieves() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["a1"]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;
        chain.upload(&[PathBuf::from("sky.txt")]).await.unwrap();

        chain.send(SendRequest::new("What colour is the sky?")).await.unwrap();

        assert!(harness.backend.searches().is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected_before_any_call() {
        let harness = Harness::new(ScriptedProvider::default());
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        let err = chain.send(SendRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, ChainError::Domain(DomainError::InvalidQuestion(_))));
        assert!(harness.provider.prompts().is_empty());
    }

    // ==================== Grounded ====================

    #[tokio::test]
    async fn test_grounded_context_is_the_uploaded_passage() {
        let harness = Harness::new(ScriptedProvider::with_answers(&[
            "What color is the sky?",
            "Blue.",
        ]));
        let chain = harness.chain(grounded(), ChainOptions::default()).await;
        chain.upload(&[PathBuf::from("sky.txt")]).await.unwrap();

        let answer = chain
            .send(SendRequest::new("What color is the sky?"))
            .await
            .unwrap();

        assert_eq!(answer, "Blue.");
        let prompts = harness.provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(
            prompts[1][0].content,
            PromptTemplate::answer_with_context("The sky is blue.", "What color is the sky?")
        );
    }

    #[tokio::test]
    async fn test_grounded_condenses_with_history() {
        let harness = Harness::new(ScriptedProvider::with_answers(&[
            "Paris.",
            "What is the population of Paris?",
            "About 2.1 million.",
        ]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        chain
            .send(SendRequest::new("What is the capital of France?"))
            .await
            .unwrap();
        chain
            .send(
                SendRequest::new("And its population?")
                    .with_overrides(ConfigOverrides::new().with_grounded(true)),
            )
            .await
            .unwrap();

        let prompts = harness.provider.prompts();
        let condense = &prompts[1][0].content;
        assert!(condense.contains("Human: What is the capital of France?\nAssistant: Paris.\n"));
        assert!(condense.contains("Follow Up Input: And its population?"));
        assert!(prompts[2][0].content.contains("What is the population of Paris?"));
    }

    #[tokio::test]
    async fn test_grounded_with_empty_knowledge_base_still_answers() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["q", "I don't know."]));
        let chain = harness.chain(grounded(), ChainOptions::default()).await;

        let answer = chain.send(SendRequest::new("Anything?")).await.unwrap();

        assert_eq!(answer, "I don't know.");
        assert_eq!(harness.backend.searches().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_reports_phases_and_chunks() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["q", "The sky is blue."]));
        let chain = harness.chain(grounded(), ChainOptions::default()).await;
        let progress = RecordingProgress::default();

        let answer = chain
            .send_with_progress(SendRequest::new("Sky?"), &progress)
            .await
            .unwrap();

        assert_eq!(
            *progress.phases.lock().unwrap(),
            vec![
                ChainPhase::Condensing,
                ChainPhase::Retrieving,
                ChainPhase::Generating,
                ChainPhase::Committed
            ]
        );
        let chunks = progress.chunks.lock().unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), answer);
    }

    // ==================== Reconfiguration ====================

    #[tokio::test]
    async fn test_retrieval_uses_new_embedding_and_top_k() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["q", "a", "q", "a"]));
        let chain = harness.chain(grounded(), ChainOptions::default()).await;

        chain.send(SendRequest::new("first")).await.unwrap();
        chain
            .send(
                SendRequest::new("second").with_overrides(
                    ConfigOverrides::new()
                        .with_embedding(EmbeddingModel::BgeLargeEn)
                        .with_top_k(5),
                ),
            )
            .await
            .unwrap();

        let searches = harness.backend.searches();
        assert_eq!(searches[0], (EmbeddingModel::TextEmbeddingAda002, 3));
        assert_eq!(searches[1], (EmbeddingModel::BgeLargeEn, 5));
    }

    #[tokio::test]
    async fn test_temperature_change_rebuilds_only_the_model() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["a"]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        chain
            .send(
                SendRequest::new("q")
                    .with_overrides(ConfigOverrides::new().with_temperature(0.8)),
            )
            .await
            .unwrap();

        assert_eq!(harness.provider.builds().len(), 2);
        assert_eq!(harness.provider.builds()[1].1, 0.8);
        assert_eq!(harness.backend.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_overrides_rebuild_nothing() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["a"]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        chain
            .send(SendRequest::new("q").with_overrides(
                ConfigOverrides::new().with_model(Model::Gpt35Turbo).with_top_k(3),
            ))
            .await
            .unwrap();

        assert_eq!(harness.provider.builds().len(), 1);
        assert_eq!(harness.backend.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_override_applies_nothing() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["a"]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        let err = chain
            .send(SendRequest::new("q").with_overrides(
                ConfigOverrides::new()
                    .with_model(Model::ChatglmTurbo)
                    .with_top_k(0),
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChainError::Configuration(ConfigurationError::InvalidTopK)
        ));
        assert_eq!(harness.provider.builds().len(), 1);
        assert_eq!(chain.config().await, ChainConfig::default());
        assert!(harness.provider.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_failed_retriever_build_keeps_old_model() {
        let backend = SpyBackend {
            unsupported: Some(EmbeddingModel::BgeLargeZh),
            ..SpyBackend::default()
        };
        let harness = Harness::with_backend(ScriptedProvider::with_answers(&["a"]), backend);
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        let err = chain
            .send(SendRequest::new("q").with_overrides(
                ConfigOverrides::new()
                    .with_model(Model::ChatglmTurbo)
                    .with_embedding(EmbeddingModel::BgeLargeZh),
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChainError::Retrieval(RetrievalError::UnsupportedEmbedding(_))
        ));
        assert_eq!(chain.config().await.model, Model::Gpt35Turbo);

        chain.send(SendRequest::new("q")).await.unwrap();
        assert_eq!(harness.provider.builds().len(), 2);
        assert_eq!(chain.config().await, ChainConfig::default());
    }

    #[tokio::test]
    async fn test_reconfiguration_keeps_memory() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["a1", "a2"]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        chain.send(SendRequest::new("q1")).await.unwrap();
        chain
            .send(SendRequest::new("q2").with_overrides(
                ConfigOverrides::new()
                    .with_model(Model::ErnieBotTurbo)
                    .with_embedding(EmbeddingModel::EmbeddingV1),
            ))
            .await
            .unwrap();

        assert_eq!(chain.history().await.len(), 2);
        assert_eq!(chain.config().await.model, Model::ErnieBotTurbo);
    }

    #[tokio::test]
    async fn test_configure_applies_without_sending() {
        let harness = Harness::new(ScriptedProvider::default());
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        let config = chain
            .configure(ConfigOverrides::new().with_model(Model::ChatglmTurbo).with_grounded(true))
            .await
            .unwrap();

        assert_eq!(config.model, Model::ChatglmTurbo);
        assert!(config.grounded);
        assert_eq!(chain.config().await, config);
        assert!(harness.provider.prompts().is_empty());

        let err = chain
            .configure(ConfigOverrides::new().with_temperature(3.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChainError::Configuration(ConfigurationError::InvalidTemperature(_))
        ));
        assert_eq!(chain.config().await, config);
    }

    // ==================== Failures ====================

    #[tokio::test]
    async fn test_model_unavailable_leaves_memory_unchanged() {
        let provider = ScriptedProvider::with_answers(&["a1"]);
        provider.push_error(ModelError::Unavailable("invalid api key".into()));
        let harness = Harness::new(provider);
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        chain.send(SendRequest::new("q1")).await.unwrap();
        let err = chain.send(SendRequest::new("q2")).await.unwrap_err();

        assert!(matches!(err, ChainError::Model(ModelError::Unavailable(_))));
        assert!(!err.is_retryable());
        assert_eq!(chain.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_transient_failure_skips_condensation() {
        let provider = ScriptedProvider::with_answers(&["standalone"]);
        provider.push_error(ModelError::Transient("rate limited".into()));
        provider.push_answers(&["answer"]);
        let harness = Harness::new(provider);
        let chain = harness.chain(grounded(), ChainOptions::default()).await;

        let err = chain.send(SendRequest::new("q")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(chain.history().await.is_empty());

        let answer = chain.send(SendRequest::new("q")).await.unwrap();
        assert_eq!(answer, "answer");
        // condense, failed answer, retried answer
        assert_eq!(harness.provider.prompts().len(), 3);
    }

    /// Streams one fragment, then drops the sender without finishing.
    struct TruncatingModel {
        model: Model,
    }

    #[async_trait]
    impl ChatModel for TruncatingModel {
        fn model(&self) -> &Model {
            &self.model
        }

        fn temperature(&self) -> f32 {
            0.1
        }

        async fn generate(&self, _messages: &[Message]) -> Result<String, ModelError> {
            Ok("unused".into())
        }

        async fn generate_streaming(
            &self,
            _messages: &[Message],
        ) -> Result<StreamHandle, ModelError> {
            let (tx, rx) = mpsc::channel(4);
            tokio::spawn(async move {
                let _ = tx.send(StreamEvent::Delta("full ".into())).await;
            });
            Ok(StreamHandle::new(rx))
        }
    }

    struct TruncatingProvider;

    #[async_trait]
    impl ChatModelProvider for TruncatingProvider {
        async fn build(
            &self,
            model: &Model,
            _temperature: f32,
        ) -> Result<Arc<dyn ChatModel>, ModelError> {
            Ok(Arc::new(TruncatingModel {
                model: model.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_truncated_stream_is_not_committed() {
        let chain = ConversationChain::new(
            ChainConfig::default(),
            ModelCatalog::default(),
            ChainOptions::default(),
            ChainAdapters {
                models: Arc::new(TruncatingProvider),
                knowledge: Arc::new(SpyBackend::default()),
                loader: Arc::new(StaticLoader { passages: vec![] }),
            },
        )
        .await
        .unwrap();
        let progress = RecordingProgress::default();

        let err = chain
            .send_with_progress(SendRequest::new("q"), &progress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChainError::Model(ModelError::StreamInterrupted(_))
        ));
        assert!(err.is_retryable());
        assert!(chain.history().await.is_empty());
        assert!(!progress.phases.lock().unwrap().contains(&ChainPhase::Committed));
    }

    #[tokio::test]
    async fn test_cancelled_send_leaves_memory_unchanged() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["a"]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;
        let token = CancellationToken::new();
        token.cancel();

        let err = chain
            .send(SendRequest::new("q").with_cancellation(token))
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::Cancelled));
        assert!(chain.history().await.is_empty());
    }

    // ==================== Concurrency ====================

    #[tokio::test]
    async fn test_reject_policy_fails_overlapping_send() {
        let gate = Arc::new(Notify::new());
        let provider = ScriptedProvider {
            gate: Some(gate.clone()),
            ..ScriptedProvider::with_answers(&["a1"])
        };
        let harness = Harness::new(provider);
        let chain = Arc::new(
            harness
                .chain(
                    ChainConfig::default(),
                    ChainOptions::default().with_invocation_policy(InvocationPolicy::Reject),
                )
                .await,
        );

        let first = {
            let chain = chain.clone();
            tokio::spawn(async move { chain.send(SendRequest::new("q1")).await })
        };
        while harness.provider.prompts().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = chain.send(SendRequest::new("q2")).await.unwrap_err();
        assert!(matches!(err, ChainError::ConcurrentInvocation));

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "a1");
        assert_eq!(chain.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_serialize_policy_waits_for_running_send() {
        let gate = Arc::new(Notify::new());
        let provider = ScriptedProvider {
            gate: Some(gate.clone()),
            ..ScriptedProvider::with_answers(&["a1", "a2"])
        };
        let harness = Harness::new(provider);
        let chain = Arc::new(
            harness
                .chain(ChainConfig::default(), ChainOptions::default())
                .await,
        );

        let first = {
            let chain = chain.clone();
            tokio::spawn(async move { chain.send(SendRequest::new("q1")).await })
        };
        while harness.provider.prompts().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let second = {
            let chain = chain.clone();
            tokio::spawn(async move { chain.send(SendRequest::new("q2")).await })
        };

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "a1");
        while harness.provider.prompts().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        gate.notify_one();
        assert_eq!(second.await.unwrap().unwrap(), "a2");

        let history = chain.history().await;
        assert_eq!(history[0].question(), "q1");
        assert_eq!(history[1].question(), "q2");
    }

    // ==================== Upload / Clear ====================

    #[tokio::test]
    async fn test_upload_keeps_configuration_and_memory() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["a"]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;
        chain.send(SendRequest::new("q")).await.unwrap();

        let count = chain.upload(&[PathBuf::from("sky.txt")]).await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(chain.history().await.len(), 1);
        assert_eq!(chain.config().await, ChainConfig::default());
    }

    #[tokio::test]
    async fn test_upload_without_paths_fails() {
        let harness = Harness::new(ScriptedProvider::default());
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;

        let err = chain.upload(&[]).await.unwrap_err();
        assert!(matches!(err, ChainError::Ingestion(IngestError::Empty)));
    }

    #[tokio::test]
    async fn test_clear_history() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["a1", "a2"]));
        let chain = harness
            .chain(ChainConfig::default(), ChainOptions::default())
            .await;
        chain.send(SendRequest::new("q1")).await.unwrap();

        chain.clear_history().await;
        assert!(chain.history().await.is_empty());

        chain.send(SendRequest::new("q2")).await.unwrap();
        let prompts = harness.provider.prompts();
        assert_eq!(prompts[1].len(), 1);
    }

    #[tokio::test]
    async fn test_last_exchange_window_limits_ungrounded_prompt() {
        let harness = Harness::new(ScriptedProvider::with_answers(&["a1", "a2", "a3"]));
        let chain = harness
            .chain(
                ChainConfig::default(),
                ChainOptions::default()
                    .with_history_window(kbchat_domain::HistoryWindow::LastExchange),
            )
            .await;

        for q in ["q1", "q2", "q3"] {
            chain.send(SendRequest::new(q)).await.unwrap();
        }

        let last = &harness.provider.prompts()[2];
        assert_eq!(last.len(), 3);
        assert_eq!(last[0].content, "q2");
    }
}
