//! LLM provider factory.
//!
//! Resolves the configured provider name into a client implementation.

use crate::client::LlmClient;
use crate::providers::{MockLlmClient, OllamaClient};
use ragchat_core::config::LlmSettings;
use ragchat_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client from the `llm` configuration section.
///
/// # Errors
/// Returns [`AppError::Config`] if the provider is unknown or the HTTP
/// client cannot be built.
pub fn create_client(settings: &LlmSettings) -> AppResult<Arc<dyn LlmClient>> {
    match settings.provider.to_lowercase().as_str() {
        "ollama" => {
            let client = OllamaClient::with_timeout(
                settings.endpoint.as_str(),
                Duration::from_secs(settings.timeout_secs),
            )
            .map_err(|e| AppError::Config(e.to_string()))?;
            tracing::debug!(endpoint = %settings.endpoint, model = %settings.model, "Created Ollama client");
            Ok(Arc::new(client))
        }
        "mock" => {
            tracing::warn!("Using the extractive mock LLM; answers are copied from context");
            Ok(Arc::new(MockLlmClient::extractive()))
        }
        other => Err(AppError::Config(format!(
            "Unknown provider: {}. Supported: ollama, mock",
            other
        ))),
    }
}
