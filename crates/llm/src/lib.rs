//! LLM integration crate for ragchat.
//!
//! Provides a provider-agnostic abstraction over language model runtimes
//! plus the [`LanguageModel`] wrapper the conversation pipeline talks to.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **Mock**: Scripted, offline client used for tests and demos
//!
//! # Example
//! ```no_run
//! use ragchat_llm::{LanguageModel, providers::OllamaClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let model = LanguageModel::new(Arc::new(OllamaClient::new()), "llama3.1");
//! let answer = model.generate("Hello, world!").await?;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod generator;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::create_client;
pub use generator::{LanguageModel, TextStream};
pub use providers::{MockLlmClient, OllamaClient};
