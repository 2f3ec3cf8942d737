//! Knowledge base and conversation pipeline.
//!
//! Documents are loaded from disk, split into retrievable units, embedded and
//! persisted in a local SQLite-backed vector index. A [`ChatSession`] answers
//! questions over that index with a language model, keeping a bounded
//! conversation history and per-session statistics.
//!
//! # Example
//! ```no_run
//! use ragchat_core::AppConfig;
//! use ragchat_knowledge::{AnswerOptions, ChatSession};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let mut session = ChatSession::from_config(&config)?;
//! session.initialize(Path::new("docs")).await?;
//!
//! let response = session.answer("Who created Python?", AnswerOptions::default()).await?;
//! println!("{}", response.answer);
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod embeddings;
pub mod loader;
pub mod mmr;
pub mod rag;
pub mod retriever;
pub mod store;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::Chunker;
pub use embeddings::{create_provider, EmbeddingProvider};
pub use loader::{load_directory, LoadReport, SkippedFile};
pub use rag::{
    AnswerEvaluation, AnswerOptions, AnswerResponse, AnswerStream, ChatSession, InitializeReport,
    SessionRegistry, SessionState, SessionStatsSnapshot, SourceAttribution,
    NO_KNOWLEDGE_BASE_MESSAGE,
};
pub use retriever::{RetrievalPolicy, RetrievalResult, RetrievedUnit, Retriever};
pub use types::{RetrievableUnit, SourceDocument};
pub use vector_index::VectorIndex;
