//! Document loading for ingestion.
//!
//! Walks a directory (or reads a single file) and returns the raw text of
//! every supported document. Unsupported or unreadable files are skipped
//! with a warning and listed in the report; they never abort ingestion.

use crate::types::{DocumentMetadata, SourceDocument};
use chrono::Utc;
use ragchat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Content type classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    PlainText,
    Unsupported(String),
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "md" | "markdown" => Self::Markdown,
            "txt" | "text" => Self::PlainText,
            "" => Self::Unsupported("(no extension)".to_string()),
            other => Self::Unsupported(other.to_string()),
        }
    }
}

/// A file that was seen but not loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of loading a directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<SourceDocument>,
    pub skipped: Vec<SkippedFile>,
}

/// Load every supported document under `path`.
///
/// `path` may be a directory (walked recursively, hidden entries ignored,
/// files in name order) or a single file.
///
/// # Errors
/// [`AppError::NoDocumentsFound`] if `path` does not exist.
pub fn load_directory(path: &Path) -> AppResult<LoadReport> {
    if !path.exists() {
        return Err(AppError::NoDocumentsFound(path.to_path_buf()));
    }

    let mut report = LoadReport::default();

    let walker = WalkDir::new(path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let file_path = entry.path();
        match load_file(path, file_path) {
            Ok(document) => report.documents.push(document),
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", file_path, e);
                report.skipped.push(SkippedFile {
                    path: file_path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Loaded {} documents from {:?} ({} skipped)",
        report.documents.len(),
        path,
        report.skipped.len()
    );

    Ok(report)
}

/// Load one file, identified relative to the ingestion `root`.
pub fn load_file(root: &Path, path: &Path) -> AppResult<SourceDocument> {
    let content_type = ContentType::from_path(path);

    if let ContentType::Unsupported(ext) = &content_type {
        return Err(AppError::UnsupportedDocumentType(ext.clone()));
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    let text = match content_type {
        ContentType::Markdown => clean_markdown(&raw),
        _ => raw,
    };

    Ok(SourceDocument {
        text,
        metadata: DocumentMetadata {
            source_id: source_id(root, path),
            path: path.to_path_buf(),
            location: None,
            loaded_at: Utc::now(),
        },
    })
}

/// Path relative to the root with `/` separators; the file name when the
/// root is the file itself.
fn source_id(root: &Path, path: &Path) -> String {
    let relative = path
        .strip_prefix(root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new(path.file_name().unwrap_or(path.as_os_str())));

    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Strip markdown markup that carries no meaning for retrieval.
///
/// Heading markers and fence lines go; paragraph breaks stay so the chunker
/// can still split on them.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        // Skip horizontal rules and code fences
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        result.push_str(trimmed);
        result.push('\n');
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(
            ContentType::from_path(Path::new("notes.MD")),
            ContentType::Markdown
        );
        assert_eq!(
            ContentType::from_path(Path::new("file.txt")),
            ContentType::PlainText
        );
        assert_eq!(
            ContentType::from_path(Path::new("report.pdf")),
            ContentType::Unsupported("pdf".to_string())
        );
    }

    #[test]
    fn test_clean_markdown_keeps_paragraphs() {
        let input = "# Header\n\nSome text\n\n```rust\ncode\n```\n\nMore text";
        let output = clean_markdown(input);
        assert!(output.starts_with("Header\n\nSome text"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_load_directory_skips_unsupported() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "Alpha").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested/b.md"), "# Beta\nbody").unwrap();
        fs::write(temp.path().join("c.pdf"), "%PDF-1.4").unwrap();
        fs::write(temp.path().join(".hidden.txt"), "secret").unwrap();

        let report = load_directory(temp.path()).unwrap();

        let ids: Vec<&str> = report
            .documents
            .iter()
            .map(|d| d.metadata.source_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a.txt", "nested/b.md"]);
        assert_eq!(report.documents[1].text, "Beta\nbody");

        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("pdf"));
    }

    #[test]
    fn test_load_single_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("only.txt");
        fs::write(&file, "content").unwrap();

        let report = load_directory(&file).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].metadata.source_id, "only.txt");
    }

    #[test]
    fn test_missing_directory() {
        let temp = TempDir::new().unwrap();
        let err = load_directory(&temp.path().join("absent")).unwrap_err();
        assert!(matches!(err, AppError::NoDocumentsFound(_)));
    }

    #[test]
    fn test_non_utf8_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("bin.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let report = load_directory(temp.path()).unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }
}
