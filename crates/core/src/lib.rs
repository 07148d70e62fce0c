pub mod chat;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod models;
pub mod ollama;
pub mod sections;
pub mod session;
pub mod store;
pub mod stores;

pub use chat::{ChatMessage, ChatModel};
pub use chunking::{refine_chunks, RecursiveSplitter};
pub use embeddings::{
    cosine_similarity, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{CompletionError, EmbeddingError, ExtractionError, IndexError, RagError};
pub use extractor::{digest_file, join_pages, LopdfExtractor, PageText, PdfExtractor};
pub use models::{
    IndexManifest, IngestionReport, RagOptions, ScoredChunk, DEFAULT_HEADING_KEYWORDS,
    DEFAULT_SEPARATORS,
};
pub use ollama::{OllamaClient, OllamaEmbedder, DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL};
pub use sections::{split_by_titles, SectionSplitter};
pub use session::{build_prompt, Answer, IndexState, RagSession, NO_INDEX_MESSAGE};
pub use store::{IndexHandle, IndexStore};
pub use stores::{DiskIndex, DiskStore, QdrantIndex, QdrantStore};
