//! Conversation session: ingestion, grounded answering, history and stats.
//!
//! A session is either uninitialized (nothing indexed, only `initialize` is
//! useful) or ready. All mutating operations take `&mut self`, so a session
//! shared between tasks must sit behind a lock; see
//! [`SessionRegistry`](crate::rag::SessionRegistry).

use crate::chunker::Chunker;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::loader::load_directory;
use crate::rag::history::ConversationHistory;
use crate::rag::rephrase::rephrase_question;
use crate::rag::stats::SessionStatistics;
use crate::rag::stream::AnswerStream;
use crate::rag::types::{
    AnswerEvaluation, AnswerResponse, InitializeReport, SessionStatsSnapshot, SourceAttribution,
};
use crate::retriever::{RetrievalPolicy, RetrievalResult, Retriever};
use crate::vector_index::VectorIndex;
use ragchat_core::config::RetrievalSettings;
use ragchat_core::{AppConfig, AppError, AppResult};
use ragchat_llm::LanguageModel;
use ragchat_prompt::{PromptBuilder, Turn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Whether a session can answer questions yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Uninitialized,
    Ready,
}

/// Per-call answer options.
#[derive(Debug, Clone, Copy)]
pub struct AnswerOptions {
    /// Rephrase follow-ups and record the exchange in history
    pub use_history: bool,
    pub policy: RetrievalPolicy,
    /// Units to retrieve; the configured default when `None`
    pub k: Option<usize>,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            use_history: true,
            policy: RetrievalPolicy::Basic,
            k: None,
        }
    }
}

/// Everything computed for a question before generation starts.
#[derive(Debug)]
pub(crate) struct PreparedAnswer {
    pub question: String,
    pub search_query: String,
    pub retrieved: RetrievalResult,
    pub context: String,
    pub prompt: String,
    pub use_history: bool,
}

/// One user's conversation over a knowledge base.
#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    state: SessionState,
    chunker: Chunker,
    retriever: Retriever,
    model: LanguageModel,
    prompts: PromptBuilder,
    history: ConversationHistory,
    stats: SessionStatistics,
    retrieval: RetrievalSettings,
    prompt_turns: usize,
}

impl ChatSession {
    /// Session over the index in the configured persist directory.
    ///
    /// Starts ready if that directory already holds a populated index.
    pub fn new(
        config: &AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        model: LanguageModel,
    ) -> AppResult<Self> {
        let index = Arc::new(VectorIndex::open(config.persist_dir(), embedder)?);
        let state = if index.exists() {
            SessionState::Ready
        } else {
            SessionState::Uninitialized
        };

        let session = Self {
            id: Uuid::new_v4(),
            state,
            chunker: Chunker::from_settings(&config.embeddings)?,
            retriever: Retriever::new(index, &config.retrieval),
            model,
            prompts: PromptBuilder::with_overrides(config.prompts_path().as_deref())?,
            history: ConversationHistory::new(config.history.max_turns),
            stats: SessionStatistics::default(),
            retrieval: config.retrieval.clone(),
            prompt_turns: config.history.prompt_turns,
        };

        tracing::info!(
            session = %session.id,
            "Session created ({:?}, model {} via {})",
            session.state,
            session.model.model(),
            session.model.provider_name()
        );
        Ok(session)
    }

    /// Validate `config` and build the embedder and model it describes.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;
        let embedder = create_provider(&config.embeddings)?;
        let model = LanguageModel::from_settings(&config.llm)?;
        Self::new(config, embedder, model)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn statistics(&self) -> &SessionStatistics {
        &self.stats
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        self.retriever.index()
    }

    /// Load, chunk and index every document under `dir`.
    ///
    /// Adds to an existing index. On error the session state is unchanged.
    ///
    /// # Errors
    /// [`AppError::NoDocumentsFound`] if `dir` is missing or yields no units.
    pub async fn initialize(&mut self, dir: &Path) -> AppResult<InitializeReport> {
        tracing::info!(session = %self.id, "Initializing knowledge base from {:?}", dir);

        let loaded = load_directory(dir)?;
        let units = self.chunker.chunk(&loaded.documents);
        if units.is_empty() {
            return Err(AppError::NoDocumentsFound(dir.to_path_buf()));
        }

        let new_chunks = self.index().insert(&units).await?;
        self.state = SessionState::Ready;

        let report = InitializeReport {
            documents: loaded.documents.len(),
            chunks: units.len(),
            new_chunks,
            skipped: loaded.skipped,
        };
        tracing::info!(session = %self.id, "{}", report.message());
        Ok(report)
    }

    /// Answer `question` from the knowledge base.
    ///
    /// Without a knowledge base this returns an unsuccessful response rather
    /// than an error. Generation failures also come back as unsuccessful
    /// responses; they are counted in the statistics but not added to the
    /// history.
    pub async fn answer(
        &mut self,
        question: &str,
        options: AnswerOptions,
    ) -> AppResult<AnswerResponse> {
        let Some(prepared) = self.prepare(question, options).await? else {
            return Ok(AnswerResponse::no_knowledge_base());
        };

        match self.model.generate(&prepared.prompt).await {
            Ok(answer) => Ok(self.commit_answer(prepared, answer)),
            Err(e) => Ok(self.commit_failure(prepared, &e)),
        }
    }

    /// Like [`answer`](Self::answer), but yields the answer as it is
    /// generated.
    ///
    /// History and statistics are updated only when the returned stream is
    /// drained; dropping it early leaves the session as it was.
    pub async fn answer_streaming(
        &mut self,
        question: &str,
        options: AnswerOptions,
    ) -> AppResult<AnswerStream<'_>> {
        let Some(prepared) = self.prepare(question, options).await? else {
            return Ok(AnswerStream::immediate(AnswerResponse::no_knowledge_base()));
        };

        let sources = self.attributions(&prepared.retrieved);
        match self.model.generate_streaming(&prepared.prompt).await {
            Ok(inner) => Ok(AnswerStream::new(self, prepared, sources, inner)),
            Err(e) => Ok(AnswerStream::failed(self, prepared, sources, e)),
        }
    }

    /// Rephrase, retrieve and build the grounded prompt.
    ///
    /// `None` means there is no knowledge base to answer from.
    async fn prepare(
        &mut self,
        question: &str,
        options: AnswerOptions,
    ) -> AppResult<Option<PreparedAnswer>> {
        if self.state == SessionState::Uninitialized {
            tracing::info!(
                session = %self.id,
                "Question asked before any documents were ingested"
            );
            return Ok(None);
        }

        let search_query = if options.use_history && !self.history.is_empty() {
            rephrase_question(
                &self.model,
                &self.prompts,
                self.history.recent(self.prompt_turns),
                question,
            )
            .await
            .into_query()
        } else {
            question.to_string()
        };

        let k = options.k.unwrap_or(self.retrieval.k).max(1);
        let retrieved = match self.retriever.retrieve(options.policy, &search_query, k).await {
            Ok(retrieved) => retrieved,
            Err(AppError::IndexEmpty) => {
                tracing::warn!(session = %self.id, "Index is empty, marking session uninitialized");
                self.state = SessionState::Uninitialized;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let context = retrieved.context();
        let history: &[Turn] = if options.use_history {
            self.history.recent(self.prompt_turns)
        } else {
            &[]
        };
        let prompt = self
            .prompts
            .grounded_answer(&context, history, question, true)?;

        Ok(Some(PreparedAnswer {
            question: question.to_string(),
            search_query,
            retrieved,
            context,
            prompt,
            use_history: options.use_history,
        }))
    }

    fn attributions(&self, retrieved: &RetrievalResult) -> Vec<SourceAttribution> {
        retrieved
            .units
            .iter()
            .map(|r| SourceAttribution::from_retrieved(r, self.retrieval.preview_chars))
            .collect()
    }

    fn record_stats(&mut self, prepared: &PreparedAnswer) {
        self.stats
            .record(prepared.context.chars().count(), prepared.retrieved.len());
    }

    /// Record a completed answer in statistics and, if enabled, history.
    pub(crate) fn commit_answer(
        &mut self,
        prepared: PreparedAnswer,
        answer: String,
    ) -> AnswerResponse {
        self.record_stats(&prepared);
        if prepared.use_history {
            self.history.push_exchange(prepared.question.clone(), answer.clone());
        }

        AnswerResponse {
            sources: self.attributions(&prepared.retrieved),
            retrieved_count: prepared.retrieved.len(),
            answer,
            success: true,
            search_query: Some(prepared.search_query),
            context: prepared.context,
        }
    }

    /// Record a failed generation in statistics only.
    pub(crate) fn commit_failure(
        &mut self,
        prepared: PreparedAnswer,
        error: &AppError,
    ) -> AnswerResponse {
        tracing::warn!(session = %self.id, "Answer generation failed: {}", error);
        self.record_stats(&prepared);

        AnswerResponse {
            answer: generation_failure_message(error),
            sources: self.attributions(&prepared.retrieved),
            retrieved_count: prepared.retrieved.len(),
            success: false,
            search_query: Some(prepared.search_query),
            context: prepared.context,
        }
    }

    /// Clear index, history and statistics together.
    ///
    /// If the index cannot be removed nothing else is cleared.
    pub fn reset(&mut self) -> AppResult<()> {
        self.index().reset()?;
        self.history.clear();
        self.stats.reset();
        self.state = SessionState::Uninitialized;
        tracing::info!(session = %self.id, "Session reset");
        Ok(())
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn stats(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            statistics: self.stats.clone(),
            history_length: self.history.len(),
            knowledge_base_ready: self.state == SessionState::Ready,
            indexed_units: self.index().count().unwrap_or(0),
        }
    }

    /// Ask the model whether `answer` is supported by `context`.
    ///
    /// Diagnostic only; never called while answering.
    pub async fn evaluate_answer(
        &self,
        question: &str,
        answer: &str,
        context: &str,
    ) -> AppResult<AnswerEvaluation> {
        let prompt = self.prompts.evaluation(question, context, answer)?;
        let raw = self.model.generate(&prompt).await?;
        Ok(AnswerEvaluation::parse(&raw))
    }
}

/// Apologetic answer shown when the model could not be reached.
pub(crate) fn generation_failure_message(error: &AppError) -> String {
    format!(
        "Sorry, I couldn't generate a response ({}). Please make sure the language model service is running.",
        error
    )
}
