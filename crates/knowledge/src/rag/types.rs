//! Conversation response types.

use crate::loader::SkippedFile;
use crate::rag::stats::SessionStatistics;
use crate::retriever::RetrievedUnit;
use serde::{Deserialize, Serialize};

/// Answer returned when no knowledge base has been ingested yet.
pub const NO_KNOWLEDGE_BASE_MESSAGE: &str =
    "No knowledge base found. Please initialize with documents first.";

/// Where part of an answer came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub source_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Leading text of the unit, cut at a character boundary
    pub preview: String,
}

impl SourceAttribution {
    pub fn from_retrieved(retrieved: &RetrievedUnit, preview_chars: usize) -> Self {
        Self {
            source_id: retrieved.unit.source_id.clone(),
            location: retrieved.unit.location.clone(),
            preview: truncate_preview(&retrieved.unit.text, preview_chars),
        }
    }
}

/// Outcome of one `answer` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: Vec<SourceAttribution>,
    pub retrieved_count: usize,
    pub success: bool,

    /// Query actually sent to retrieval, after any rephrasing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,

    /// Context block given to the model
    #[serde(skip)]
    pub context: String,
}

impl AnswerResponse {
    /// Soft failure for a session with nothing ingested.
    pub fn no_knowledge_base() -> Self {
        Self {
            answer: NO_KNOWLEDGE_BASE_MESSAGE.to_string(),
            sources: Vec::new(),
            retrieved_count: 0,
            success: false,
            search_query: None,
            context: String::new(),
        }
    }
}

/// Summary of an `initialize` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeReport {
    /// Documents loaded from the directory
    pub documents: usize,
    /// Units produced by chunking
    pub chunks: usize,
    /// Units that were not already in the index
    pub new_chunks: usize,
    pub skipped: Vec<SkippedFile>,
}

impl InitializeReport {
    pub fn message(&self) -> String {
        format!(
            "Successfully processed {} chunks from {} documents",
            self.chunks, self.documents
        )
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatsSnapshot {
    #[serde(flatten)]
    pub statistics: SessionStatistics,
    pub history_length: usize,
    pub knowledge_base_ready: bool,
    pub indexed_units: usize,
}

/// Parsed groundedness check of an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    pub grounded: Option<bool>,
    pub hallucinations: Option<bool>,
    pub explanation: String,
    /// Unparsed model output
    pub raw: String,
}

impl AnswerEvaluation {
    /// Read `Grounded:`, `Hallucinations:` and `Explanation:` lines; missing
    /// or unreadable fields stay `None` or empty.
    pub fn parse(raw: &str) -> Self {
        let mut evaluation = Self {
            grounded: None,
            hallucinations: None,
            explanation: String::new(),
            raw: raw.trim().to_string(),
        };

        for line in raw.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_lowercase().as_str() {
                "grounded" => evaluation.grounded = parse_yes_no(value),
                "hallucinations" => evaluation.hallucinations = parse_yes_no(value),
                "explanation" => evaluation.explanation = value.to_string(),
                _ => {}
            }
        }

        evaluation
    }
}

fn parse_yes_no(value: &str) -> Option<bool> {
    let lower = value.to_lowercase();
    if lower.starts_with("yes") {
        Some(true)
    } else if lower.starts_with("no") {
        Some(false)
    } else {
        None
    }
}

/// First `max_chars` characters of `text`, with `...` when cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
    }
}
