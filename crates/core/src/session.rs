use crate::chat::{ChatMessage, ChatModel};
use crate::chunking::RecursiveSplitter;
use crate::embeddings::Embedder;
use crate::error::RagError;
use crate::extractor::{digest_file, join_pages, LopdfExtractor, PdfExtractor};
use crate::models::{IndexManifest, IngestionReport, RagOptions, ScoredChunk};
use crate::sections::SectionSplitter;
use crate::store::{IndexHandle, IndexStore};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, warn};

pub const NO_INDEX_MESSAGE: &str = "No database found. Please upload a file first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unloaded,
    Loaded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Nothing has been ingested or loaded; no collaborator was called.
    NoIndex,
    Grounded {
        response: String,
        context: Vec<ScoredChunk>,
    },
}

impl Answer {
    pub fn text(&self) -> &str {
        match self {
            Answer::NoIndex => NO_INDEX_MESSAGE,
            Answer::Grounded { response, .. } => response,
        }
    }
}

/// Owns the pipeline collaborators and the single active index.
///
/// The index starts unloaded and becomes loaded either by [`RagSession::load`]
/// finding a persisted index or by a successful ingestion. Ingestion replaces
/// the previous index wholesale.
pub struct RagSession<E, S, C>
where
    E: Embedder,
    S: IndexStore,
    C: ChatModel,
{
    options: RagOptions,
    splitter: SectionSplitter,
    refiner: RecursiveSplitter,
    extractor: Box<dyn PdfExtractor>,
    embedder: E,
    store: S,
    chat: C,
    index: Option<S::Handle>,
}

impl<E, S, C> RagSession<E, S, C>
where
    E: Embedder,
    S: IndexStore,
    C: ChatModel,
{
    pub fn new(options: RagOptions, embedder: E, store: S, chat: C) -> Result<Self, RagError> {
        options.validate()?;
        let splitter = SectionSplitter::new(&options.heading_keywords)?;
        let refiner = RecursiveSplitter::from_options(&options)?;

        Ok(Self {
            options,
            splitter,
            refiner,
            extractor: Box::new(LopdfExtractor),
            embedder,
            store,
            chat,
            index: None,
        })
    }

    pub fn with_extractor(mut self, extractor: impl PdfExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn state(&self) -> IndexState {
        if self.index.is_some() {
            IndexState::Loaded
        } else {
            IndexState::Unloaded
        }
    }

    pub fn index(&self) -> Option<&S::Handle> {
        self.index.as_ref()
    }

    /// Opens the persisted index if there is one. A missing index is not an
    /// error; the session simply stays unloaded.
    pub fn load(&mut self) -> Result<IndexState, RagError> {
        match self.store.open(self.embedder.model_name())? {
            Some(handle) => {
                info!(chunk_count = handle.len(), "vector index loaded");
                self.index = Some(handle);
            }
            None => warn!("{NO_INDEX_MESSAGE}"),
        }
        Ok(self.state())
    }

    /// Section splitting followed by chunk refinement. Returns the number of
    /// sections and the chunks.
    pub fn prepare_chunks(&self, text: &str) -> (usize, Vec<String>) {
        let sections = self.splitter.split(text);
        let chunks = self.refiner.refine(&sections);
        (sections.len(), chunks)
    }

    pub fn ingest_pdf(&mut self, path: &Path) -> Result<IngestionReport, RagError> {
        if !path.is_file() {
            warn!(path = %path.display(), "file not found");
            return Err(RagError::DocumentNotFound(path.to_path_buf()));
        }

        info!(path = %path.display(), "processing file");
        let pages = self.extractor.extract_pages(path)?;
        let text = join_pages(&pages);
        let checksum = digest_file(path)?;

        let mut report = self.ingest(
            &text,
            Some(path.to_string_lossy().to_string()),
            Some(checksum),
        )?;
        report.source = Some(path.to_path_buf());
        report.pages = pages.len();
        Ok(report)
    }

    pub fn ingest_text(&mut self, text: &str) -> Result<IngestionReport, RagError> {
        self.ingest(text, None, None)
    }

    fn ingest(
        &mut self,
        text: &str,
        source_path: Option<String>,
        source_checksum: Option<String>,
    ) -> Result<IngestionReport, RagError> {
        let (sections, chunks) = self.prepare_chunks(text);
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument);
        }
        debug!(sections, chunk_count = chunks.len(), "document chunked");

        let embeddings = self.embedder.embed_batch(&chunks)?;
        let manifest = IndexManifest {
            embedding_model: self.embedder.model_name().to_string(),
            dimensions: embeddings.first().map(Vec::len).unwrap_or(0),
            chunk_count: chunks.len(),
            source_path,
            source_checksum,
            built_at: Utc::now(),
        };

        let handle = self.store.build(&chunks, embeddings, &manifest)?;
        self.index = Some(handle);

        info!(sections, chunk_count = chunks.len(), "document processed and stored");
        Ok(IngestionReport {
            source: None,
            pages: 0,
            sections,
            chunks: chunks.len(),
        })
    }

    /// The `top_k` nearest chunks, or `None` while no index is loaded.
    pub fn retrieve(&self, question: &str) -> Result<Option<Vec<ScoredChunk>>, RagError> {
        let Some(index) = &self.index else {
            return Ok(None);
        };

        info!(top_k = self.options.top_k, "embedding query and searching");
        let query_vector = self.embedder.embed(question)?;
        let hits = index.search(&query_vector, self.options.top_k)?;
        Ok(Some(hits))
    }

    pub fn ask(&self, question: &str) -> Result<Answer, RagError> {
        let Some(context) = self.retrieve(question)? else {
            warn!("{NO_INDEX_MESSAGE}");
            return Ok(Answer::NoIndex);
        };

        let prompt = build_prompt(&context, question);
        let response = self
            .chat
            .complete(&self.options.chat_model, &[ChatMessage::user(prompt)])?;

        Ok(Answer::Grounded { response, context })
    }

    /// Sends `prompt` to the chat model as-is, without retrieval.
    pub fn direct_query(&self, prompt: &str) -> Result<String, RagError> {
        let response = self
            .chat
            .complete(&self.options.chat_model, &[ChatMessage::user(prompt)])?;
        Ok(response)
    }
}

pub fn build_prompt(context: &[ScoredChunk], question: &str) -> String {
    let context = context
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!("Based on the textbook content:\n\n{context}\n\nAnswer the question: {question}")
}
