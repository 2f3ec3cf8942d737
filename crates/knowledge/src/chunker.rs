//! Recursive text chunking with configurable size and overlap.
//!
//! Text is split on the coarsest separator present (paragraph break, line
//! break, space), and any piece still longer than `chunk_size` is split again
//! with the next finer separator, down to single grapheme clusters. Pieces
//! are then merged greedily back into chunks of at most `chunk_size`
//! characters, carrying up to `chunk_overlap` characters of trailing context
//! into the next chunk.
//!
//! Separators stay attached to the start of the piece that follows them, so
//! concatenating all pieces reproduces the input exactly.

use crate::types::{RetrievableUnit, SourceDocument};
use ragchat_core::config::EmbeddingSettings;
use ragchat_core::{AppError, AppResult};
use std::collections::VecDeque;
use unicode_segmentation::UnicodeSegmentation;

/// Separators tried in order; the empty string means "grapheme clusters".
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits documents into overlapping retrievable units.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Chunker {
    /// Create a chunker; `chunk_overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> AppResult<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Chunk every document. Positions restart at 0 for each document and
    /// empty documents contribute nothing.
    pub fn chunk(&self, documents: &[SourceDocument]) -> Vec<RetrievableUnit> {
        let mut units = Vec::new();

        for document in documents {
            let before = units.len();
            units.extend(
                self.split_text(&document.text)
                    .into_iter()
                    .enumerate()
                    .map(|(position, text)| {
                        RetrievableUnit::new(
                            document.metadata.source_id.clone(),
                            document.metadata.location.clone(),
                            position as u32,
                            text,
                        )
                    }),
            );

            tracing::debug!(
                "Chunked {} into {} units",
                document.metadata.source_id,
                units.len() - before
            );
        }

        units
    }

    /// Split raw text into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Coarsest separator that occurs in the text; "" always matches
        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(sep.as_str()))
            .map(|(i, sep)| (i, sep.as_str()))
            .unwrap_or((separators.len(), ""));
        let finer = separators.get(index + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    /// Greedily merge pieces into chunks, keeping overlap between neighbours.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window);

                // Drop from the front until the remainder is a valid overlap
                // and the next piece fits
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        push_trimmed(&mut chunks, &window);
        chunks
    }
}

fn push_trimmed(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split `text` before each occurrence of `separator`.
///
/// The empty separator splits into extended grapheme clusters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.graphemes(true).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(0, 0).is_err());
    }

    #[test]
    fn test_short_text_is_single_unit() {
        let chunker = Chunker::new(1000, 200).unwrap();
        let text = "Python is a high-level programming language.\n\nIt was created by Guido van Rossum.";
        let docs = vec![SourceDocument::new("python.txt", text)];

        let units = chunker.chunk(&docs);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, text);
        assert_eq!(units[0].position, 0);
        assert_eq!(units[0].source_id, "python.txt");
    }

    #[test]
    fn test_empty_and_blank_text_yield_nothing() {
        let chunker = Chunker::new(100, 10).unwrap();
        let docs = vec![
            SourceDocument::new("empty.txt", ""),
            SourceDocument::new("blank.txt", "  \n\n \t "),
        ];
        assert!(chunker.chunk(&docs).is_empty());
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let chunker = Chunker::new(50, 10).unwrap();
        let text = "Rust gives you control over memory without a garbage collector. \
                    Ownership rules are checked at compile time.\n\n\
                    Cargo builds, tests and documents your crates.\n\
                    Traits describe shared behaviour; generics are monomorphized."
            .repeat(3);

        let chunks = chunker.split_text(&text);
        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50, "chunk too long: {:?}", chunk);
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_reconstruction_without_overlap() {
        let chunker = Chunker::new(40, 0).unwrap();
        let text = "First paragraph has several words in it.\n\nSecond one is here\nwith a line break and a rather long tail of extra words.";

        let chunks = chunker.split_text(text);
        assert!(chunks.len() > 1);
        assert_eq!(strip_whitespace(&chunks.concat()), strip_whitespace(text));
    }

    #[test]
    fn test_reconstruction_with_overlap() {
        let chunker = Chunker::new(30, 12).unwrap();
        let text = "Xred Xtan Xblue Xgold Xpink Xgrey Xnavy Xteal Xlime Xplum Xrust Xsand Xjade Xruby Xmint Xsage";

        let chunks: Vec<String> = chunker
            .split_text(text)
            .iter()
            .map(|chunk| strip_whitespace(chunk))
            .collect();
        assert!(chunks.len() > 2);

        let mut rebuilt = chunks[0].clone();
        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let shared = (1..next.len())
                .rev()
                .find(|&len| prev.ends_with(&next[..len]))
                .unwrap_or(0);
            assert!(shared > 0, "{:?} should overlap {:?}", next, prev);
            rebuilt.push_str(&next[shared..]);
        }
        assert_eq!(rebuilt, strip_whitespace(text));
    }

    #[test]
    fn test_overlap_repeats_trailing_words() {
        let chunker = Chunker::new(30, 12).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";

        let chunks = chunker.split_text(text);
        assert!(chunks.len() >= 2);
        let last_word_of_first = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].starts_with(last_word_of_first) || chunks[1].contains(last_word_of_first));
    }

    #[test]
    fn test_unbroken_text_falls_back_to_graphemes() {
        let chunker = Chunker::new(10, 0).unwrap();
        let text = "é".repeat(25);

        let chunks = chunker.split_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_positions_restart_per_document() {
        let chunker = Chunker::new(20, 0).unwrap();
        let docs = vec![
            SourceDocument::new("a.txt", "one two three four five six seven"),
            SourceDocument::new("b.txt", "eight nine ten eleven twelve"),
        ];

        let units = chunker.chunk(&docs);
        let b_positions: Vec<u32> = units
            .iter()
            .filter(|u| u.source_id == "b.txt")
            .map(|u| u.position)
            .collect();
        assert_eq!(b_positions[0], 0);
        assert!(units.iter().any(|u| u.source_id == "a.txt" && u.position == 1));
    }

    #[test]
    fn test_split_keeping_separator_prefixes_pieces() {
        assert_eq!(
            split_keeping_separator("a b c", " "),
            vec!["a", " b", " c"]
        );
        assert_eq!(split_keeping_separator(" lead", " "), vec![" lead"]);
    }
}
