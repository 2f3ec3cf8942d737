//! Configuration management for ragchat.
//!
//! Configuration is read once at startup and merged from several sources,
//! lowest precedence first:
//! - Built-in defaults
//! - A YAML file (`<workspace>/ragchat.yaml` or `RAGCHAT_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Every component receives its settings from the resulting [`AppConfig`];
//! nothing re-reads the file afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default config file name, relative to the workspace.
pub const CONFIG_FILE_NAME: &str = "ragchat.yaml";

const KNOWN_LLM_PROVIDERS: [&str; 2] = ["ollama", "mock"];
const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["ollama", "mock"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace root; relative paths below are resolved against it
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log output format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub embeddings: EmbeddingSettings,

    pub llm: LlmSettings,

    pub retrieval: RetrievalSettings,

    pub vector_store: VectorStoreSettings,

    pub history: HistorySettings,

    /// Directory of YAML prompt overrides
    pub prompts_dir: Option<PathBuf>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(AppError::Config(format!(
                "Unknown log format: {}. Supported: pretty, json",
                other
            ))),
        }
    }
}

/// Embedding model and chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider ("ollama" or "mock")
    pub provider: String,

    /// Embedding model identifier
    pub model: String,

    /// Vector dimensionality produced by the model
    pub dimensions: usize,

    /// Provider endpoint
    #[serde(alias = "base_url")]
    pub endpoint: String,

    /// Maximum characters per retrievable unit
    pub chunk_size: usize,

    /// Characters shared between adjacent units
    pub chunk_overlap: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            endpoint: "http://localhost:11434".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// LLM provider ("ollama" or "mock")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Provider endpoint
    #[serde(alias = "base_url")]
    pub endpoint: String,

    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.1".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            temperature: 0.1,
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Units returned per query
    pub k: usize,

    /// Minimum cosine similarity kept by threshold retrieval
    pub score_threshold: f32,

    /// Diverse retrieval inspects `k * fetch_k_multiplier` candidates
    pub fetch_k_multiplier: usize,

    /// Relevance weight in maximal marginal relevance (1.0 = pure relevance)
    pub mmr_lambda: f32,

    /// Characters of unit text shown in a source preview
    pub preview_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: 4,
            score_threshold: 0.7,
            fetch_k_multiplier: 3,
            mmr_lambda: 0.5,
            preview_chars: 150,
        }
    }
}

/// Persisted vector index location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub persist_directory: PathBuf,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            persist_directory: PathBuf::from("vector_store"),
        }
    }
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Turns retained in memory (always even)
    pub max_turns: usize,

    /// Most recent turns included in prompts
    pub prompt_turns: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_turns: 10,
            prompt_turns: 4,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    embeddings: Option<EmbeddingSettings>,
    llm: Option<LlmSettings>,
    retrieval: Option<RetrievalSettings>,
    vector_store: Option<VectorStoreSettings>,
    history: Option<HistorySettings>,
    prompts: Option<PromptsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PromptsConfig {
    dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            log_format: LogFormat::default(),
            verbose: false,
            no_color: false,
            embeddings: EmbeddingSettings::default(),
            llm: LlmSettings::default(),
            retrieval: RetrievalSettings::default(),
            vector_store: VectorStoreSettings::default(),
            history: HistorySettings::default(),
            prompts_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment.
    ///
    /// Environment variables:
    /// - `RAGCHAT_WORKSPACE`: Override workspace path
    /// - `RAGCHAT_CONFIG`: Path to config file
    /// - `RAGCHAT_LLM_MODEL`: Language model identifier
    /// - `RAGCHAT_LLM_ENDPOINT`: Language model endpoint
    /// - `RAGCHAT_PERSIST_DIR`: Vector index directory
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use ragchat_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Index: {:?}", config.persist_dir());
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration with an explicit workspace and config file.
    ///
    /// Explicit values take precedence over `RAGCHAT_WORKSPACE` and
    /// `RAGCHAT_CONFIG`.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| env_path("RAGCHAT_WORKSPACE")) {
            config.workspace = workspace;
        }

        config.config_file = config_file.or_else(|| env_path("RAGCHAT_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(CONFIG_FILE_NAME));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(model) = std::env::var("RAGCHAT_LLM_MODEL") {
            config.llm.model = model;
        }

        if let Ok(endpoint) = std::env::var("RAGCHAT_LLM_ENDPOINT") {
            config.llm.endpoint = endpoint;
        }

        if let Some(dir) = env_path("RAGCHAT_PERSIST_DIR") {
            config.vector_store.persist_directory = dir;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(embeddings) = config_file.embeddings {
            result.embeddings = embeddings;
        }
        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(vector_store) = config_file.vector_store {
            result.vector_store = vector_store;
        }
        if let Some(history) = config_file.history {
            result.history = history;
        }
        if let Some(dir) = config_file.prompts.and_then(|p| p.dir) {
            result.prompts_dir = Some(dir);
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        log_format: Option<LogFormat>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.llm.provider = provider;
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if let Some(log_format) = log_format {
            self.log_format = log_format;
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Resolve the vector index directory against the workspace.
    pub fn persist_dir(&self) -> PathBuf {
        self.resolve(&self.vector_store.persist_directory)
    }

    /// Resolve the prompt override directory against the workspace.
    pub fn prompts_path(&self) -> Option<PathBuf> {
        self.prompts_dir.as_ref().map(|dir| self.resolve(dir))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Validate the merged configuration.
    ///
    /// Any failure here is a [`AppError::Config`] and should abort startup.
    pub fn validate(&self) -> AppResult<()> {
        let emb = &self.embeddings;

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&emb.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                emb.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if emb.model.trim().is_empty() {
            return Err(AppError::Config("Embedding model cannot be empty".to_string()));
        }

        if emb.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if emb.chunk_size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if emb.chunk_overlap >= emb.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                emb.chunk_overlap, emb.chunk_size
            )));
        }

        if !KNOWN_LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.llm.provider,
                KNOWN_LLM_PROVIDERS.join(", ")
            )));
        }

        if self.llm.model.trim().is_empty() {
            return Err(AppError::Config("LLM model cannot be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AppError::Config(format!(
                "temperature must be within 0.0-2.0, got {}",
                self.llm.temperature
            )));
        }

        let retrieval = &self.retrieval;

        if retrieval.k == 0 {
            return Err(AppError::Config("k must be greater than zero".to_string()));
        }

        if retrieval.fetch_k_multiplier == 0 {
            return Err(AppError::Config(
                "fetch_k_multiplier must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.score_threshold) {
            return Err(AppError::Config(format!(
                "score_threshold must be within 0.0-1.0, got {}",
                retrieval.score_threshold
            )));
        }

        if !(0.0..=1.0).contains(&retrieval.mmr_lambda) {
            return Err(AppError::Config(format!(
                "mmr_lambda must be within 0.0-1.0, got {}",
                retrieval.mmr_lambda
            )));
        }

        if self.history.max_turns == 0 || self.history.max_turns % 2 != 0 {
            return Err(AppError::Config(format!(
                "history.max_turns must be a positive even number, got {}",
                self.history.max_turns
            )));
        }

        Ok(())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}
