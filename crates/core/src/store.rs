use crate::error::IndexError;
use crate::models::{IndexManifest, ScoredChunk};

/// A loaded, searchable set of chunk vectors.
pub trait IndexHandle {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` chunks ranked best first. Ties are ordered however the
    /// backend orders them.
    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError>;
}

/// Where indexes live. Building always replaces whatever the store held.
pub trait IndexStore {
    type Handle: IndexHandle;

    fn build(
        &self,
        chunks: &[String],
        embeddings: Vec<Vec<f32>>,
        manifest: &IndexManifest,
    ) -> Result<Self::Handle, IndexError>;

    /// `Ok(None)` when nothing has been persisted yet.
    fn open(&self, embedding_model: &str) -> Result<Option<Self::Handle>, IndexError>;
}

/// Checks that chunks and embeddings line up and share one dimension, which
/// is returned.
pub(crate) fn validate_embeddings(
    chunks: &[String],
    embeddings: &[Vec<f32>],
) -> Result<usize, IndexError> {
    if chunks.len() != embeddings.len() {
        return Err(IndexError::CountMismatch {
            chunks: chunks.len(),
            embeddings: embeddings.len(),
        });
    }

    let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
    for embedding in embeddings {
        if embedding.len() != dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                got: embedding.len(),
            });
        }
    }

    Ok(dimensions)
}
