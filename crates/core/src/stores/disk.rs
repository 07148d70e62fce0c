use crate::embeddings::cosine_similarity;
use crate::error::IndexError;
use crate::models::{IndexManifest, ScoredChunk};
use crate::store::{validate_embeddings, IndexHandle, IndexStore};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info};

const MANIFEST_FILE: &str = "manifest.json";
const CHUNKS_FILE: &str = "chunks.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    text: String,
    vector: Vec<f32>,
}

/// Flat vector store persisted to a directory: `manifest.json` plus one JSON
/// record per chunk in `chunks.jsonl`. Search is a full cosine scan.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn exists(&self) -> bool {
        self.manifest_path().is_file()
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    fn chunks_path(&self) -> PathBuf {
        self.root.join(CHUNKS_FILE)
    }

    fn read_records(&self, manifest: &IndexManifest) -> Result<Vec<StoredChunk>, IndexError> {
        let reader = BufReader::new(File::open(self.chunks_path())?);
        let mut records = Vec::with_capacity(manifest.chunk_count);

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: StoredChunk = serde_json::from_str(&line)?;
            if record.vector.len() != manifest.dimensions {
                return Err(IndexError::Corrupt(format!(
                    "record has {} dimensions, manifest says {}",
                    record.vector.len(),
                    manifest.dimensions
                )));
            }
            records.push(record);
        }

        if records.len() != manifest.chunk_count {
            return Err(IndexError::Corrupt(format!(
                "found {} chunks, manifest says {}",
                records.len(),
                manifest.chunk_count
            )));
        }

        Ok(records)
    }
}

impl IndexStore for DiskStore {
    type Handle = DiskIndex;

    fn build(
        &self,
        chunks: &[String],
        embeddings: Vec<Vec<f32>>,
        manifest: &IndexManifest,
    ) -> Result<DiskIndex, IndexError> {
        let dimensions = validate_embeddings(chunks, &embeddings)?;
        fs::create_dir_all(&self.root)?;

        let records = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(text, vector)| StoredChunk { text, vector })
            .collect::<Vec<_>>();

        let mut writer = BufWriter::new(File::create(self.chunks_path())?);
        for record in &records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        let manifest = IndexManifest {
            dimensions,
            chunk_count: records.len(),
            ..manifest.clone()
        };
        fs::write(self.manifest_path(), serde_json::to_vec_pretty(&manifest)?)?;

        info!(
            path = %self.root.display(),
            chunk_count = records.len(),
            dimensions,
            "persisted vector index"
        );

        Ok(DiskIndex { manifest, records })
    }

    fn open(&self, embedding_model: &str) -> Result<Option<DiskIndex>, IndexError> {
        if !self.exists() {
            debug!(path = %self.root.display(), "no persisted index");
            return Ok(None);
        }

        let manifest: IndexManifest = serde_json::from_slice(&fs::read(self.manifest_path())?)?;
        if manifest.embedding_model != embedding_model {
            return Err(IndexError::EmbeddingModelMismatch {
                stored: manifest.embedding_model,
                active: embedding_model.to_string(),
            });
        }

        let records = self.read_records(&manifest)?;
        info!(
            path = %self.root.display(),
            chunk_count = records.len(),
            "loaded vector index"
        );

        Ok(Some(DiskIndex { manifest, records }))
    }
}

#[derive(Debug, Clone)]
pub struct DiskIndex {
    manifest: IndexManifest,
    records: Vec<StoredChunk>,
}

impl DiskIndex {
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn chunks(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.text.as_str())
    }
}

impl IndexHandle for DiskIndex {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if !self.records.is_empty() && query_vector.len() != self.manifest.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.manifest.dimensions,
                got: query_vector.len(),
            });
        }

        let mut scored = self
            .records
            .iter()
            .map(|record| ScoredChunk {
                text: record.text.clone(),
                score: cosine_similarity(query_vector, &record.vector),
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(k);
        Ok(scored)
    }
}
