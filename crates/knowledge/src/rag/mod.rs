//! Conversational retrieval-augmented answering.
//!
//! [`ChatSession`] drives the pipeline: optional follow-up rewriting,
//! retrieval, grounded prompt assembly, generation, then the history and
//! statistics update.

pub mod history;
pub mod registry;
pub mod rephrase;
pub mod session;
pub mod stats;
pub mod stream;
pub mod types;

pub use history::ConversationHistory;
pub use registry::{SessionHandle, SessionRegistry};
pub use rephrase::{rephrase_question, RephraseOutcome};
pub use session::{AnswerOptions, ChatSession, SessionState};
pub use stats::SessionStatistics;
pub use stream::AnswerStream;
pub use types::{
    AnswerEvaluation, AnswerResponse, InitializeReport, SessionStatsSnapshot, SourceAttribution,
    NO_KNOWLEDGE_BASE_MESSAGE,
};
