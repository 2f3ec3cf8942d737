//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Where a loaded document came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    /// Stable identifier: the file path relative to the ingested directory
    pub source_id: String,

    /// Absolute or workspace-relative path of the file
    pub path: PathBuf,

    /// Location inside the file (page, section), when the format has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// When the document was read
    pub loaded_at: DateTime<Utc>,
}

/// Raw text of one document plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl SourceDocument {
    /// In-memory document, mostly useful for tests and programmatic ingestion.
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        let source_id = source_id.into();
        Self {
            text: text.into(),
            metadata: DocumentMetadata {
                path: PathBuf::from(&source_id),
                source_id,
                location: None,
                loaded_at: Utc::now(),
            },
        }
    }
}

/// An immutable, independently retrievable chunk of a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievableUnit {
    /// Content hash of source, location, position and text
    pub id: String,

    /// Document this unit was cut from
    pub source_id: String,

    /// Opaque location inherited from the document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Emission order within the document, starting at 0
    pub position: u32,

    /// Non-empty text content
    pub text: String,
}

impl RetrievableUnit {
    pub fn new(
        source_id: impl Into<String>,
        location: Option<String>,
        position: u32,
        text: impl Into<String>,
    ) -> Self {
        let source_id = source_id.into();
        let text = text.into();
        let id = calculate_hash(&[
            source_id.as_str(),
            location.as_deref().unwrap_or(""),
            &position.to_string(),
            text.as_str(),
        ]);

        Self {
            id,
            source_id,
            location,
            position,
            text,
        }
    }
}

/// A unit together with its embedding vector, as stored by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub unit: RetrievableUnit,
    pub vector: Vec<f32>,
}

/// SHA-256 over length-prefixed parts, hex encoded.
///
/// Length prefixes keep `["ab", "c"]` and `["a", "bc"]` distinct.
pub fn calculate_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_id_is_deterministic() {
        let a = RetrievableUnit::new("a.txt", None, 0, "hello");
        let b = RetrievableUnit::new("a.txt", None, 0, "hello");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn test_unit_id_depends_on_position_and_source() {
        let a = RetrievableUnit::new("a.txt", None, 0, "hello");
        assert_ne!(a.id, RetrievableUnit::new("a.txt", None, 1, "hello").id);
        assert_ne!(a.id, RetrievableUnit::new("b.txt", None, 0, "hello").id);
        assert_ne!(
            a.id,
            RetrievableUnit::new("a.txt", Some("2".to_string()), 0, "hello").id
        );
    }

    #[test]
    fn test_hash_parts_are_delimited() {
        assert_ne!(calculate_hash(&["ab", "c"]), calculate_hash(&["a", "bc"]));
    }
}
