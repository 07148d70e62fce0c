use crate::error::RagError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_HEADING_KEYWORDS: [&str; 6] =
    ["Chapter", "Section", "Unit", "Lesson", "Topic", "Subsection"];

pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Knobs for the ingestion and answering pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
    pub heading_keywords: Vec<String>,
    pub top_k: usize,
    pub chat_model: String,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            heading_keywords: DEFAULT_HEADING_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            top_k: 5,
            chat_model: "llama3".to_string(),
        }
    }
}

impl RagOptions {
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separators.is_empty() {
            return Err(RagError::InvalidConfig(
                "at least one separator is required".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(RagError::InvalidConfig(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.chat_model.trim().is_empty() {
            return Err(RagError::InvalidConfig("chat_model is empty".to_string()));
        }
        Ok(())
    }
}

/// A chunk returned by a similarity search, best match first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
}

/// Written next to the vectors so a reopened index can be checked against
/// the active embedder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub source_path: Option<String>,
    pub source_checksum: Option<String>,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub source: Option<PathBuf>,
    pub pages: usize,
    pub sections: usize,
    pub chunks: usize,
}
