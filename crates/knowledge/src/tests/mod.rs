//! Cross-module tests: retrieval ranking and the conversation pipeline.


use crate::embeddings::EmbeddingProvider;
use crate::embeddings::MockProvider;
use crate::rag::ChatSession;
use ragchat_core::AppConfig;
use ragchat_core::AppResult;
use ragchat_llm::{LanguageModel, MockLlmClient};
use std::path::Path;
use std::sync::Arc;

/// Embeds text as normalized keyword counts over a fixed vocabulary, so
/// tests can reason about exact distances.
#[derive(Debug)]
pub(crate) struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub(crate) fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn provider_name(&self) -> &str {
        "keyword"
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut vector: Vec<f32> = self
                    .vocabulary
                    .iter()
                    .map(|word| lower.matches(word).count() as f32)
                    .collect();
                crate::embeddings::normalize(&mut vector);
                vector
            })
            .collect())
    }
}

/// Config rooted at `workspace` with offline providers.
pub(crate) fn test_config(workspace: &Path) -> AppConfig {
    let mut config = AppConfig {
        workspace: workspace.to_path_buf(),
        ..Default::default()
    };
    config.embeddings.provider = "mock".to_string();
    config.embeddings.dimensions = 256;
    config.llm.provider = "mock".to_string();
    config
}

/// Session using the trigram embedder and the given scripted client.
pub(crate) fn session_with(workspace: &Path, client: MockLlmClient) -> ChatSession {
    let config = test_config(workspace);
    ChatSession::new(
        &config,
        Arc::new(MockProvider::new(config.embeddings.dimensions)),
        LanguageModel::new(Arc::new(client), "mock"),
    )
    .unwrap()
}

/// Write `files` (name, content) into `dir`, creating it.
pub(crate) fn write_docs(dir: &Path, files: &[(&str, &str)]) {
    std::fs::create_dir_all(dir).unwrap();
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}
