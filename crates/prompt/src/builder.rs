//! Prompt builder for rendering the conversation templates.

use crate::loader::{list_prompts, load_prompt_file};
use crate::templates::{
    builtin_definitions, is_builtin, EVALUATION_ID, GROUNDED_ANSWER_ID, INSUFFICIENT_INFORMATION,
    REPHRASE_ID,
};
use crate::types::{PromptDefinition, Turn};
use handlebars::Handlebars;
use ragchat_core::{AppError, AppResult};
use serde_json::json;
use std::path::Path;

/// Renders the grounded-answer, rephrase and evaluation prompts.
///
/// Templates are registered once; YAML overrides replace built-ins by id.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    registry: Handlebars<'static>,
}

impl PromptBuilder {
    /// Builder with the built-in templates only.
    pub fn new() -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Prompts are plain text, not HTML
        registry.register_escape_fn(handlebars::no_escape);

        let mut builder = Self { registry };
        for definition in builtin_definitions() {
            builder.register(&definition)?;
        }
        Ok(builder)
    }

    /// Builder with built-ins replaced by any overrides in `prompts_dir`.
    ///
    /// Files whose id is not a known template are skipped with a warning.
    pub fn with_overrides(prompts_dir: Option<&Path>) -> AppResult<Self> {
        let mut builder = Self::new()?;

        let Some(dir) = prompts_dir else {
            return Ok(builder);
        };

        for path in list_prompts(dir)? {
            let definition = load_prompt_file(&path)?;
            if !is_builtin(&definition.id) {
                tracing::warn!(
                    "Ignoring prompt override {:?}: unknown id '{}'",
                    path,
                    definition.id
                );
                continue;
            }
            builder.register(&definition)?;
            tracing::debug!("Overrode prompt template '{}'", definition.id);
        }

        Ok(builder)
    }

    fn register(&mut self, definition: &PromptDefinition) -> AppResult<()> {
        self.registry
            .register_template_string(&definition.id, &definition.template)
            .map_err(|e| {
                AppError::Prompt(format!(
                    "Failed to register template '{}': {}",
                    definition.id, e
                ))
            })
    }

    fn render(&self, id: &str, data: &serde_json::Value) -> AppResult<String> {
        self.registry
            .render(id, data)
            .map_err(|e| AppError::Prompt(format!("Failed to render template '{}': {}", id, e)))
    }

    /// Prompt that answers `question` only from `context`.
    ///
    /// `history` is rendered verbatim; callers pass at most the turns they
    /// want the model to see.
    pub fn grounded_answer(
        &self,
        context: &str,
        history: &[Turn],
        question: &str,
        cite_sources: bool,
    ) -> AppResult<String> {
        self.render(
            GROUNDED_ANSWER_ID,
            &json!({
                "context": context,
                "history": history_data(history),
                "question": question,
                "cite_sources": cite_sources,
                "insufficient": INSUFFICIENT_INFORMATION,
            }),
        )
    }

    /// Prompt that rewrites a follow-up into a standalone question.
    pub fn rephrase(&self, history: &[Turn], question: &str) -> AppResult<String> {
        self.render(
            REPHRASE_ID,
            &json!({
                "history": history_data(history),
                "question": question,
            }),
        )
    }

    /// Prompt that asks whether `answer` is supported by `context`.
    pub fn evaluation(&self, question: &str, context: &str, answer: &str) -> AppResult<String> {
        self.render(
            EVALUATION_ID,
            &json!({
                "question": question,
                "context": context,
                "answer": answer,
            }),
        )
    }
}

fn history_data(history: &[Turn]) -> Vec<serde_json::Value> {
    history
        .iter()
        .map(|turn| json!({ "label": turn.role.label(), "content": turn.content }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_grounded_answer_without_history() {
        let builder = PromptBuilder::new().unwrap();
        let prompt = builder
            .grounded_answer("[Document 1] ...", &[], "Who created Python?", true)
            .unwrap();

        assert!(prompt.contains("ONLY the information from the context"));
        assert!(prompt.contains(INSUFFICIENT_INFORMATION));
        assert!(prompt.contains("Cite the source document"));
        assert!(prompt.contains("Context:\n[Document 1] ..."));
        assert!(!prompt.contains("Previous conversation:"));
        assert!(prompt.ends_with("Human: Who created Python?\n\nAssistant:"));
    }

    #[test]
    fn test_grounded_answer_with_history() {
        let builder = PromptBuilder::new().unwrap();
        let history = vec![
            Turn::asker("What is Python?"),
            Turn::responder("A programming language."),
        ];
        let prompt = builder
            .grounded_answer("ctx", &history, "Who made it?", false)
            .unwrap();

        assert!(prompt.contains(
            "Previous conversation:\nHuman: What is Python?\nAssistant: A programming language.\n\nHuman: Who made it?"
        ));
        assert!(!prompt.contains("Cite the source"));
    }

    #[test]
    fn test_no_html_escaping() {
        let builder = PromptBuilder::new().unwrap();
        let prompt = builder
            .grounded_answer("a < b && c > d", &[], "\"quoted\"", false)
            .unwrap();
        assert!(prompt.contains("a < b && c > d"));
        assert!(prompt.contains("\"quoted\""));
    }

    #[test]
    fn test_rephrase_prompt() {
        let builder = PromptBuilder::new().unwrap();
        let history = vec![Turn::asker("Tell me about Python"), Turn::responder("Sure.")];
        let prompt = builder
            .rephrase(&history, "What about performance?")
            .unwrap();

        assert!(prompt.contains("standalone question"));
        assert!(prompt.contains("Human: Tell me about Python\nAssistant: Sure.\n"));
        assert!(prompt.contains("Follow-up Question: What about performance?"));
    }

    #[test]
    fn test_evaluation_prompt() {
        let builder = PromptBuilder::new().unwrap();
        let prompt = builder.evaluation("q", "c", "a").unwrap();
        assert!(prompt.contains("Answer: a"));
        assert!(prompt.contains("Grounded: Yes/No"));
    }

    #[test]
    fn test_override_replaces_builtin() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("query.rephrase.yml"),
            "id: query.rephrase\ntitle: Short\ntemplate: \"standalone question for {{question}}\"\n",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("unknown.yml"),
            "id: unknown\ntitle: X\ntemplate: \"x\"\n",
        )
        .unwrap();

        let builder = PromptBuilder::with_overrides(Some(temp_dir.path())).unwrap();
        assert_eq!(
            builder.rephrase(&[], "speed").unwrap(),
            "standalone question for speed"
        );
        // Untouched templates keep the built-in text
        assert!(builder
            .grounded_answer("c", &[], "q", true)
            .unwrap()
            .contains("Remember:"));
    }
}
