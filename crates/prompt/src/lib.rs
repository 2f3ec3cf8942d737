//! Prompt system for ragchat.
//!
//! - Conversation turn types shared with the orchestrator
//! - Built-in Handlebars templates for grounded answers, question rewriting
//!   and answer evaluation
//! - YAML overrides loaded from a prompts directory

pub mod builder;
pub mod loader;
pub mod templates;
pub mod types;

// Re-export main types
pub use builder::PromptBuilder;
pub use loader::{list_prompts, load_prompt, load_prompt_file};
pub use templates::INSUFFICIENT_INFORMATION;
pub use types::{PromptDefinition, Role, Turn};
