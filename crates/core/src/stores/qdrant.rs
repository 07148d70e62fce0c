use crate::error::{IndexError, RagError};
use crate::models::{IndexManifest, ScoredChunk};
use crate::store::{validate_embeddings, IndexHandle, IndexStore};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const UPSERT_BATCH_SIZE: usize = 256;

/// Vector store kept in a Qdrant collection. Building drops and recreates the
/// collection; the embedding model is stored in every point's payload.
#[derive(Debug, Clone)]
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(endpoint: &str, collection: impl Into<String>) -> Result<Self, RagError> {
        let parsed = Url::parse(endpoint)?;
        let client = Client::builder().timeout(None::<Duration>).build()?;

        Ok(Self {
            endpoint: parsed.as_str().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    fn recreate_collection(&self, vector_size: usize) -> Result<(), IndexError> {
        let response = self.client.delete(self.collection_url()).send()?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status()));
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": {
                    "size": vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        Ok(())
    }

    fn stored_model(&self) -> Result<Option<String>, IndexError> {
        let response = self
            .client
            .post(format!("{}/points/scroll", self.collection_url()))
            .json(&json!({ "limit": 1, "with_payload": true, "with_vector": false }))
            .send()?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json()?;
        Ok(parsed
            .pointer("/result/points/0/payload/embedding_model")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

impl IndexStore for QdrantStore {
    type Handle = QdrantIndex;

    fn build(
        &self,
        chunks: &[String],
        embeddings: Vec<Vec<f32>>,
        manifest: &IndexManifest,
    ) -> Result<QdrantIndex, IndexError> {
        let dimensions = validate_embeddings(chunks, &embeddings)?;
        self.recreate_collection(dimensions)?;

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .enumerate()
            .map(|(index, (text, embedding))| {
                json!({
                    "id": index,
                    "vector": embedding,
                    "payload": {
                        "text": text,
                        "chunk_index": index,
                        "embedding_model": manifest.embedding_model,
                        "source_path": manifest.source_path,
                    },
                })
            })
            .collect::<Vec<_>>();

        for batch in points.chunks(UPSERT_BATCH_SIZE) {
            let response = self
                .client
                .put(format!("{}/points?wait=true", self.collection_url()))
                .json(&json!({ "points": batch }))
                .send()?;

            if !response.status().is_success() {
                return Err(backend_error(response.status()));
            }
            debug!(collection = %self.collection, size = batch.len(), "upserted points");
        }

        info!(
            collection = %self.collection,
            chunk_count = chunks.len(),
            dimensions,
            "rebuilt qdrant collection"
        );

        Ok(QdrantIndex {
            store: self.clone(),
            dimensions,
            len: chunks.len(),
        })
    }

    fn open(&self, embedding_model: &str) -> Result<Option<QdrantIndex>, IndexError> {
        let response = self.client.get(self.collection_url()).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let info: Value = response.json()?;
        let (dimensions, len) = parse_collection_info(&info)?;

        if let Some(stored) = self.stored_model()? {
            if stored != embedding_model {
                return Err(IndexError::EmbeddingModelMismatch {
                    stored,
                    active: embedding_model.to_string(),
                });
            }
        }

        Ok(Some(QdrantIndex {
            store: self.clone(),
            dimensions,
            len,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct QdrantIndex {
    store: QdrantStore,
    dimensions: usize,
    len: usize,
}

impl IndexHandle for QdrantIndex {
    fn len(&self) -> usize {
        self.len
    }

    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if query_vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query_vector.len(),
            });
        }

        let response = self
            .store
            .client
            .post(format!("{}/points/search", self.store.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json()?;
        parse_search_hits(&parsed)
    }
}

fn backend_error(status: StatusCode) -> IndexError {
    IndexError::BackendResponse {
        backend: "qdrant".to_string(),
        details: status.to_string(),
    }
}

fn parse_collection_info(info: &Value) -> Result<(usize, usize), IndexError> {
    let dimensions = info
        .pointer("/result/config/params/vectors/size")
        .and_then(Value::as_u64)
        .ok_or_else(|| IndexError::BackendResponse {
            backend: "qdrant".to_string(),
            details: "collection info has no vector size".to_string(),
        })?;
    let len = info
        .pointer("/result/points_count")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok((dimensions as usize, len as usize))
}

fn parse_search_hits(parsed: &Value) -> Result<Vec<ScoredChunk>, IndexError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| IndexError::BackendResponse {
            backend: "qdrant".to_string(),
            details: format!("search response has no result array: {parsed}"),
        })?;

    hits.iter()
        .map(|hit| {
            let text = hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .ok_or_else(|| IndexError::BackendResponse {
                    backend: "qdrant".to_string(),
                    details: format!("search hit has no text payload: {hit}"),
                })?;

            Ok(ScoredChunk {
                text: text.to_string(),
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockito::{Matcher, Server};

    const COLLECTION_PATH: &str = "/collections/chunks";

    fn manifest(model: &str) -> IndexManifest {
        IndexManifest {
            embedding_model: model.to_string(),
            dimensions: 0,
            chunk_count: 0,
            source_path: None,
            source_checksum: None,
            built_at: Utc::now(),
        }
    }

    fn vectors(count: usize) -> Vec<Vec<f32>> {
        (0..count).map(|index| vec![1.0, index as f32]).collect()
    }

    fn upsert_body(texts: &[&str], model: &str) -> Value {
        let points = texts
            .iter()
            .enumerate()
            .map(|(index, text)| {
                json!({
                    "id": index,
                    "vector": [1.0, index as f32],
                    "payload": {
                        "text": text,
                        "chunk_index": index,
                        "embedding_model": model,
                        "source_path": null,
                    },
                })
            })
            .collect::<Vec<_>>();
        json!({ "points": points })
    }

    fn collection_info(points_count: usize) -> String {
        json!({
            "result": {
                "status": "green",
                "points_count": points_count,
                "config": {"params": {"vectors": {"size": 2, "distance": "Cosine"}}}
            },
            "status": "ok"
        })
        .to_string()
    }

    fn scroll_page(model: &str) -> String {
        json!({
            "result": {
                "points": [{"id": 0, "payload": {"text": "a", "embedding_model": model}}],
                "next_page_offset": 1
            },
            "status": "ok"
        })
        .to_string()
    }

    #[test]
    fn rebuilding_replaces_the_collection_instead_of_appending(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut server = Server::new();
        let drop_collection = server
            .mock("DELETE", COLLECTION_PATH)
            .with_status(200)
            .with_body(r#"{"result": true, "status": "ok"}"#)
            .expect(2)
            .create();
        let create_collection = server
            .mock("PUT", COLLECTION_PATH)
            .match_body(Matcher::Json(json!({
                "vectors": {"size": 2, "distance": "Cosine"}
            })))
            .with_status(200)
            .with_body(r#"{"result": true, "status": "ok"}"#)
            .expect(2)
            .create();
        let first_upsert = server
            .mock("PUT", "/collections/chunks/points")
            .match_query(Matcher::UrlEncoded("wait".into(), "true".into()))
            .match_body(Matcher::Json(upsert_body(&["a", "b", "c"], "nomic")))
            .with_status(200)
            .create();
        let second_upsert = server
            .mock("PUT", "/collections/chunks/points")
            .match_query(Matcher::UrlEncoded("wait".into(), "true".into()))
            .match_body(Matcher::Json(upsert_body(&["d", "e"], "nomic")))
            .with_status(200)
            .create();
        let info = server
            .mock("GET", COLLECTION_PATH)
            .with_status(200)
            .with_body(collection_info(2))
            .create();
        let scroll = server
            .mock("POST", "/collections/chunks/points/scroll")
            .with_status(200)
            .with_body(scroll_page("nomic"))
            .create();

        let store = QdrantStore::new(&server.url(), "chunks")?;
        let first = store.build(
            &["a".to_string(), "b".to_string(), "c".to_string()],
            vectors(3),
            &manifest("nomic"),
        )?;
        assert_eq!(first.len(), 3);

        let second = store.build(
            &["d".to_string(), "e".to_string()],
            vectors(2),
            &manifest("nomic"),
        )?;
        assert_eq!(second.len(), 2);

        let reopened = store.open("nomic")?.ok_or("collection should exist")?;
        assert_eq!(reopened.len(), 2);

        drop_collection.assert();
        create_collection.assert();
        first_upsert.assert();
        second_upsert.assert();
        info.assert();
        scroll.assert();
        Ok(())
    }

    #[test]
    fn opening_with_another_embedding_model_is_rejected() -> Result<(), RagError> {
        let mut server = Server::new();
        let _info = server
            .mock("GET", COLLECTION_PATH)
            .with_status(200)
            .with_body(collection_info(4))
            .create();
        let _scroll = server
            .mock("POST", "/collections/chunks/points/scroll")
            .with_status(200)
            .with_body(scroll_page("all-minilm"))
            .create();

        let store = QdrantStore::new(&server.url(), "chunks")?;
        match store.open("nomic-embed-text") {
            Err(IndexError::EmbeddingModelMismatch { stored, active }) => {
                assert_eq!(stored, "all-minilm");
                assert_eq!(active, "nomic-embed-text");
            }
            other => panic!("expected a model mismatch, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn missing_collection_opens_as_absent() -> Result<(), Box<dyn std::error::Error>> {
        let mut server = Server::new();
        let _info = server
            .mock("GET", COLLECTION_PATH)
            .with_status(404)
            .with_body(r#"{"status": {"error": "Not found"}}"#)
            .create();

        let store = QdrantStore::new(&server.url(), "chunks")?;
        assert!(store.open("nomic")?.is_none());
        Ok(())
    }

    #[test]
    fn search_returns_hits_from_the_collection() -> Result<(), Box<dyn std::error::Error>> {
        let mut server = Server::new();
        let search = server
            .mock("POST", "/collections/chunks/points/search")
            .match_body(Matcher::PartialJson(json!({"limit": 2, "with_payload": true})))
            .with_status(200)
            .with_body(
                json!({
                    "result": [
                        {"id": 1, "score": 0.9, "payload": {"text": "Osmosis moves water."}},
                        {"id": 0, "score": 0.4, "payload": {"text": "Cells divide."}}
                    ],
                    "status": "ok"
                })
                .to_string(),
            )
            .create();

        let index = QdrantIndex {
            store: QdrantStore::new(&server.url(), "chunks")?,
            dimensions: 2,
            len: 2,
        };
        let hits = index.search(&[1.0, 0.0], 2)?;

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "Osmosis moves water.");
        assert_eq!(hits[1].text, "Cells divide.");
        search.assert();
        Ok(())
    }

    #[test]
    fn search_error_body_is_an_error() -> Result<(), RagError> {
        let mut server = Server::new();
        let _search = server
            .mock("POST", "/collections/chunks/points/search")
            .with_status(200)
            .with_body(r#"{"status": {"error": "Wrong input: Vector dimension error"}}"#)
            .create();

        let index = QdrantIndex {
            store: QdrantStore::new(&server.url(), "chunks")?,
            dimensions: 2,
            len: 2,
        };
        assert!(matches!(
            index.search(&[1.0, 0.0], 2),
            Err(IndexError::BackendResponse { .. })
        ));
        Ok(())
    }

    #[test]
    fn search_hits_keep_backend_order() -> Result<(), IndexError> {
        let parsed = json!({
            "result": [
                {"id": 3, "score": 0.91, "payload": {"text": "Ribosomes build proteins."}},
                {"id": 0, "score": 0.55, "payload": {"text": "Cells divide."}}
            ],
            "status": "ok"
        });

        let hits = parse_search_hits(&parsed)?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "Ribosomes build proteins.");
        assert_eq!(hits[1].text, "Cells divide.");
        assert!(hits[0].score > hits[1].score);
        Ok(())
    }

    #[test]
    fn malformed_search_responses_are_rejected() {
        let error_body = json!({"status": {"error": "Wrong input: Vector dimension error"}});
        assert!(matches!(
            parse_search_hits(&error_body),
            Err(IndexError::BackendResponse { .. })
        ));

        let hit_without_text = json!({"result": [{"id": 1, "score": 0.8}]});
        assert!(matches!(
            parse_search_hits(&hit_without_text),
            Err(IndexError::BackendResponse { .. })
        ));
    }

    #[test]
    fn collection_info_reports_size_and_count() -> Result<(), IndexError> {
        let info = json!({
            "result": {
                "status": "green",
                "points_count": 42,
                "config": {"params": {"vectors": {"size": 768, "distance": "Cosine"}}}
            }
        });

        assert_eq!(parse_collection_info(&info)?, (768, 42));
        Ok(())
    }

    #[test]
    fn collection_info_without_vector_size_is_rejected() {
        let info = json!({"result": {"points_count": 1}});
        assert!(parse_collection_info(&info).is_err());
    }

    #[test]
    fn endpoint_must_be_a_url() {
        assert!(QdrantStore::new("not a url", "chunks").is_err());
        assert!(QdrantStore::new("http://localhost:6333/", "chunks").is_ok());
    }
}
