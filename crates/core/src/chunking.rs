use crate::error::RagError;
use crate::models::RagOptions;
use std::collections::VecDeque;
use tracing::warn;

/// Recursive separator splitter.
///
/// Text is cut on the first separator from `separators` that occurs in it
/// (the empty separator means single characters). Pieces shorter than
/// `chunk_size` are greedily merged; longer pieces are split again with the
/// remaining separators. Consecutive merged chunks share up to
/// `chunk_overlap` characters, aligned to piece boundaries. All lengths are
/// counted in `char`s.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap {chunk_overlap} must be smaller than chunk_size {chunk_size}"
            )));
        }
        if separators.is_empty() {
            return Err(RagError::InvalidConfig(
                "at least one separator is required".to_string(),
            ));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    pub fn from_options(options: &RagOptions) -> Result<Self, RagError> {
        Self::new(
            options.chunk_size,
            options.chunk_overlap,
            options.separators.clone(),
        )
    }

    /// Splits every section on its own and concatenates the results, so no
    /// overlap is carried across section boundaries.
    pub fn refine<S: AsRef<str>>(&self, sections: &[S]) -> Vec<String> {
        sections
            .iter()
            .flat_map(|section| self.split_text(section.as_ref()))
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }

            if remaining.is_empty() {
                let oversized = piece.trim();
                if !oversized.is_empty() {
                    chunks.push(oversized.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        size = total,
                        limit = self.chunk_size,
                        "created a chunk longer than the configured size"
                    );
                }

                if !window.is_empty() {
                    if let Some(chunk) = join_window(&window) {
                        merged.push(chunk);
                    }

                    while total > self.chunk_overlap
                        || (total > 0 && total + len > self.chunk_size)
                    {
                        match window.pop_front() {
                            Some((_, dropped)) => total -= dropped,
                            None => break,
                        }
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            merged.push(chunk);
        }

        merged
    }
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        let options = RagOptions::default();
        Self {
            chunk_size: options.chunk_size,
            chunk_overlap: options.chunk_overlap,
            separators: options.separators,
        }
    }
}

/// Chunk refinement with the default size, overlap and separators.
pub fn refine_chunks<S: AsRef<str>>(sections: &[S]) -> Vec<String> {
    RecursiveSplitter::default().refine(sections)
}

fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (position, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator.as_str(), &separators[position + 1..]);
        }
    }

    let last = separators.last().map(String::as_str).unwrap_or("");
    (last, &[])
}

/// Splits `text` on `separator`, keeping each separator at the start of the
/// piece that follows it. Empty pieces are dropped.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (position, _) in text.match_indices(separator) {
        if position > start {
            pieces.push(&text[start..position]);
        }
        start = position;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

fn join_window(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined = window.iter().map(|(piece, _)| *piece).collect::<String>();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
