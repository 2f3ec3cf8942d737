//! Prompt and conversation types.

use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions
    Asker,
    /// The assistant answering them
    Responder,
}

impl Role {
    /// Speaker label used when a turn is rendered into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Asker => "Human",
            Role::Responder => "Assistant",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn asker(content: impl Into<String>) -> Self {
        Self {
            role: Role::Asker,
            content: content.into(),
        }
    }

    pub fn responder(content: impl Into<String>) -> Self {
        Self {
            role: Role::Responder,
            content: content.into(),
        }
    }
}

/// A prompt template definition, built in or loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Template identifier (e.g., "answer.grounded")
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Free-form notes for whoever maintains the override
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Template string with Handlebars syntax
    pub template: String,
}
