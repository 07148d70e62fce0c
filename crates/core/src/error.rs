use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("pdf had no readable page text: {0}")]
    NoText(PathBuf),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding backend returned {status}: {details}")]
    Backend { status: u16, details: String },

    #[error("expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding dimension {got} does not match {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("index was built with embedding model {stored}, active model is {active}")]
    EmbeddingModelMismatch { stored: String, active: String },

    #[error("vector dimension {got} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding count {embeddings} doesn't match chunk count {chunks}")]
    CountMismatch { chunks: usize, embeddings: usize },

    #[error("corrupt index: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat backend returned {status}: {details}")]
    Backend { status: u16, details: String },

    #[error("chat response had no message content")]
    MissingContent,
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("document not found: {0}")]
    DocumentNotFound(PathBuf),

    #[error("document produced no chunks")]
    EmptyDocument,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index failed: {0}")]
    Index(#[from] IndexError),

    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),
}
