use crate::chat::{ChatMessage, ChatModel};
use crate::embeddings::Embedder;
use crate::error::{CompletionError, EmbeddingError, RagError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

/// Blocking client for a local Ollama server. No request timeout is set;
/// generation on a laptop can take minutes.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    endpoint: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(endpoint: &str) -> Result<Self, RagError> {
        let parsed = Url::parse(endpoint)?;
        let client = Client::builder().timeout(None::<Duration>).build()?;

        Ok(Self {
            endpoint: parsed.as_str().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.endpoint))
            .json(&EmbedRequest {
                model,
                input: inputs,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::Backend {
                status: status.as_u16(),
                details: response.text().unwrap_or_default(),
            });
        }

        let payload: EmbedResponse = response.json()?;
        if payload.embeddings.len() != inputs.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: inputs.len(),
                got: payload.embeddings.len(),
            });
        }

        Ok(payload.embeddings)
    }

    pub fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .json(&ChatRequest {
                model,
                messages,
                stream: false,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::Backend {
                status: status.as_u16(),
                details: response.text().unwrap_or_default(),
            });
        }

        let payload: ChatResponse = response.json()?;
        content_of(payload)
    }
}

impl ChatModel for OllamaClient {
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        debug!(model, messages = messages.len(), "chat completion request");
        self.chat(model, messages)
    }
}

fn content_of(payload: ChatResponse) -> Result<String, CompletionError> {
    payload
        .message
        .map(|message| message.content)
        .ok_or(CompletionError::MissingContent)
}

/// Embedder backed by an Ollama embedding model such as `nomic-embed-text`.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.client.embed(&self.model, &[text.to_string()])?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            got: 0,
        })
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            debug!(model = %self.model, size = batch.len(), "embedding batch");
            vectors.extend(self.client.embed(&self.model, batch)?);
        }

        if let Some(first) = vectors.first() {
            let expected = first.len();
            if let Some(odd) = vectors.iter().find(|vector| vector.len() != expected) {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    got: odd.len(),
                });
            }
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embed_response_is_parsed() -> Result<(), serde_json::Error> {
        let payload: EmbedResponse = serde_json::from_value(json!({
            "model": "nomic-embed-text",
            "embeddings": [[0.1, 0.2], [0.3, 0.4]]
        }))?;
        assert_eq!(payload.embeddings, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
        Ok(())
    }

    #[test]
    fn chat_response_content_is_returned_verbatim() -> Result<(), Box<dyn std::error::Error>> {
        let payload: ChatResponse = serde_json::from_value(json!({
            "model": "llama3",
            "message": {"role": "assistant", "content": "  Mitochondria.\n"},
            "done": true
        }))?;
        assert_eq!(content_of(payload)?, "  Mitochondria.\n");
        Ok(())
    }

    #[test]
    fn chat_response_without_message_is_an_error() -> Result<(), serde_json::Error> {
        let payload: ChatResponse = serde_json::from_value(json!({"done": true}))?;
        assert!(matches!(
            content_of(payload),
            Err(CompletionError::MissingContent)
        ));
        Ok(())
    }

    #[test]
    fn chat_request_disables_streaming() -> Result<(), serde_json::Error> {
        let messages = vec![ChatMessage::user("hi")];
        let body = serde_json::to_value(ChatRequest {
            model: "llama3",
            messages: &messages,
            stream: false,
        })?;
        assert_eq!(
            body,
            json!({"model": "llama3", "messages": [{"role": "user", "content": "hi"}], "stream": false})
        );
        Ok(())
    }

    #[test]
    fn endpoint_is_validated_and_normalized() -> Result<(), RagError> {
        let client = OllamaClient::new("http://localhost:11434/")?;
        assert_eq!(client.endpoint(), "http://localhost:11434");
        assert!(OllamaClient::new("not a url").is_err());
        Ok(())
    }
}
