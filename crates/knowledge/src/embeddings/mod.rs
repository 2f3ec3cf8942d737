//! Embedding providers for retrievable units and queries.
//!
//! The provider is chosen from [`EmbeddingSettings`](ragchat_core::config::EmbeddingSettings);
//! the index records the model and dimensions it was built with.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, normalize, EmbeddingProvider};
pub use providers::{MockProvider, OllamaProvider};
