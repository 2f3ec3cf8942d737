//! Text generation on top of an [`LlmClient`].
//!
//! `LanguageModel` binds a client to a model id and sampling settings, and
//! converts every provider failure into [`AppError::GenerationUnavailable`]
//! so callers can surface it as a non-fatal answer.

use crate::client::{LlmClient, LlmRequest};
use crate::factory::create_client;
use futures::{Stream, StreamExt};
use ragchat_core::config::LlmSettings;
use ragchat_core::{AppError, AppResult};
use std::pin::Pin;
use std::sync::Arc;

/// Finite, non-restartable sequence of answer fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// A configured language model.
#[derive(Clone)]
pub struct LanguageModel {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LanguageModel {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Build the client and model described by the `llm` config section.
    pub fn from_settings(settings: &LlmSettings) -> AppResult<Self> {
        let mut model = Self::new(create_client(settings)?, settings.model.clone())
            .with_temperature(settings.temperature);
        model.max_tokens = settings.max_tokens;
        Ok(model)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    fn request(&self, prompt: &str) -> LlmRequest {
        let mut request = LlmRequest::new(prompt, &self.model);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }

    /// Generate a complete answer, trimmed of surrounding whitespace.
    pub async fn generate(&self, prompt: &str) -> AppResult<String> {
        let response = self
            .client
            .complete(&self.request(prompt))
            .await
            .map_err(unavailable)?;

        tracing::debug!(
            completion_tokens = response.usage.completion_tokens,
            "Generation finished"
        );

        Ok(response.content.trim().to_string())
    }

    /// Generate an answer as a stream of text fragments.
    ///
    /// Empty fragments are dropped and the stream ends after the provider's
    /// final chunk. Errors inside the stream are `GenerationUnavailable`.
    pub async fn generate_streaming(&self, prompt: &str) -> AppResult<TextStream> {
        let request = self.request(prompt).with_streaming();
        let stream = self.client.stream(&request).await.map_err(unavailable)?;

        let fragments = stream
            .scan(false, |finished, chunk| {
                if *finished {
                    return futures::future::ready(None);
                }
                let item = match chunk {
                    Ok(chunk) => {
                        *finished = chunk.done;
                        Ok(chunk.content)
                    }
                    Err(e) => {
                        *finished = true;
                        Err(unavailable(e))
                    }
                };
                futures::future::ready(Some(item))
            })
            .filter(|item| {
                futures::future::ready(!matches!(item, Ok(text) if text.is_empty()))
            });

        Ok(Box::pin(fragments))
    }
}

impl std::fmt::Debug for LanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageModel")
            .field("provider", &self.client.provider_name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn unavailable(err: AppError) -> AppError {
    match err {
        AppError::GenerationUnavailable(_) => err,
        other => AppError::GenerationUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockLlmClient;

    #[tokio::test]
    async fn test_generate_trims_output() {
        let model = LanguageModel::new(Arc::new(MockLlmClient::fixed("  Guido.\n")), "m");
        assert_eq!(model.generate("who?").await.unwrap(), "Guido.");
    }

    #[tokio::test]
    async fn test_generate_failure_is_unavailable() {
        let model = LanguageModel::new(Arc::new(MockLlmClient::failing()), "m");
        let err = model.generate("who?").await.unwrap_err();
        assert!(matches!(err, AppError::GenerationUnavailable(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_streaming_drops_empty_final_chunk() {
        let model = LanguageModel::new(Arc::new(MockLlmClient::fixed("a b")), "m");
        let fragments: Vec<String> = model
            .generate_streaming("p")
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["a ".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_request_carries_sampling_settings() {
        let client = MockLlmClient::with_responder(|request| {
            Ok(format!(
                "{:?}/{:?}",
                request.temperature, request.max_tokens
            ))
        });
        let model = LanguageModel::new(Arc::new(client), "m")
            .with_temperature(0.5)
            .with_max_tokens(64);
        assert_eq!(model.generate("p").await.unwrap(), "Some(0.5)/Some(64)");
    }
}
