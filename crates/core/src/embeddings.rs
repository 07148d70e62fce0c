use crate::error::EmbeddingError;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Turns text into vectors. Ingestion and querying must go through the same
/// embedder; `model_name` is persisted with the index to enforce that.
pub trait Embedder {
    fn model_name(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts)
    }
}

/// Hashed character-trigram embedder. Deterministic and offline, which makes
/// it useful without an embedding service.
#[derive(Debug, Clone)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
    model_name: String,
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_name: format!("char-trigram-{dimensions}"),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vectorize(text))
    }
}

/// Cosine similarity; zero when either side has no magnitude.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left
        .iter()
        .zip(right.iter())
        .map(|(l, r)| l * r)
        .sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_is_deterministic() -> Result<(), EmbeddingError> {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Photosynthesis converts light")?;
        let second = embedder.embed("Photosynthesis converts light")?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn embedder_outputs_expected_length() -> Result<(), EmbeddingError> {
        let embedder = CharacterNgramEmbedder::new(32);
        assert_eq!(embedder.embed("abc")?.len(), 32);
        assert_eq!(embedder.model_name(), "char-trigram-32");
        Ok(())
    }

    #[test]
    fn similar_texts_score_higher_than_unrelated_ones() -> Result<(), EmbeddingError> {
        let embedder = CharacterNgramEmbedder::default();
        let query = embedder.embed("cell membrane transport")?;
        let close = embedder.embed("transport across the cell membrane")?;
        let far = embedder.embed("the french revolution of 1789")?;

        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
        Ok(())
    }

    #[test]
    fn zero_vectors_have_zero_similarity() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn boxed_embedder_delegates() -> Result<(), EmbeddingError> {
        let boxed: Box<dyn Embedder> = Box::new(CharacterNgramEmbedder::new(8));
        let vectors = boxed.embed_batch(&["one".to_string(), "two".to_string()])?;
        assert_eq!(vectors.len(), 2);
        assert_eq!(boxed.model_name(), "char-trigram-8");
        Ok(())
    }
}
