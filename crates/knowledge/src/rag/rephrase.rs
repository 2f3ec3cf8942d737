//! Follow-up question rewriting.

use ragchat_llm::LanguageModel;
use ragchat_prompt::{PromptBuilder, Turn};

/// Result of trying to turn a follow-up into a standalone search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RephraseOutcome {
    /// The model produced a standalone question
    Rewritten(String),
    /// Rewriting failed; the original question is used unchanged
    Fallback { original: String, reason: String },
}

impl RephraseOutcome {
    /// The query to search with.
    pub fn query(&self) -> &str {
        match self {
            RephraseOutcome::Rewritten(query) => query,
            RephraseOutcome::Fallback { original, .. } => original,
        }
    }

    pub fn into_query(self) -> String {
        match self {
            RephraseOutcome::Rewritten(query) => query,
            RephraseOutcome::Fallback { original, .. } => original,
        }
    }
}

/// Ask the model to resolve references in `question` against `history`.
///
/// Never fails: prompt, transport and blank-output problems all become
/// [`RephraseOutcome::Fallback`].
pub async fn rephrase_question(
    model: &LanguageModel,
    prompts: &PromptBuilder,
    history: &[Turn],
    question: &str,
) -> RephraseOutcome {
    let fallback = |reason: String| {
        tracing::warn!("Query rephrasing failed, using original question: {}", reason);
        RephraseOutcome::Fallback {
            original: question.to_string(),
            reason,
        }
    };

    let prompt = match prompts.rephrase(history, question) {
        Ok(prompt) => prompt,
        Err(e) => return fallback(e.to_string()),
    };

    match model.generate(&prompt).await {
        Ok(rewritten) if rewritten.trim().is_empty() => {
            fallback("model returned an empty question".to_string())
        }
        Ok(rewritten) => {
            let rewritten = rewritten.trim().to_string();
            tracing::debug!("Rephrased '{}' as '{}'", question, rewritten);
            RephraseOutcome::Rewritten(rewritten)
        }
        Err(e) => fallback(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_llm::MockLlmClient;
    use std::sync::Arc;

    fn history() -> Vec<Turn> {
        vec![
            Turn::asker("What is Python?"),
            Turn::responder("Python is a programming language."),
        ]
    }

    #[tokio::test]
    async fn test_rewritten_question() {
        let model = LanguageModel::new(
            Arc::new(MockLlmClient::fixed("  What about Python performance?\n")),
            "mock",
        );
        let prompts = PromptBuilder::new().unwrap();

        let outcome = rephrase_question(&model, &prompts, &history(), "What about performance?").await;
        assert_eq!(
            outcome,
            RephraseOutcome::Rewritten("What about Python performance?".to_string())
        );
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_original() {
        let model = LanguageModel::new(Arc::new(MockLlmClient::failing()), "mock");
        let prompts = PromptBuilder::new().unwrap();

        let outcome = rephrase_question(&model, &prompts, &history(), "And speed?").await;
        assert!(matches!(outcome, RephraseOutcome::Fallback { .. }));
        assert_eq!(outcome.query(), "And speed?");
    }

    #[tokio::test]
    async fn test_blank_output_falls_back() {
        let model = LanguageModel::new(Arc::new(MockLlmClient::fixed("   ")), "mock");
        let prompts = PromptBuilder::new().unwrap();

        let outcome = rephrase_question(&model, &prompts, &history(), "And speed?").await;
        assert_eq!(outcome.into_query(), "And speed?");
    }
}
