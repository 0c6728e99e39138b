//! Text embedding interface and the deterministic hashing embedder.
//!
//! Similarity is cosine over L2-normalized vectors, clamped into [0, 1]
//! (negative cosine counts as zero relevance).

use crate::error::EmbeddingError;
use async_trait::async_trait;
use md5::{Digest, Md5};

#[async_trait]
/// Embedding provider abstraction used by the coordinator.
pub trait TextEmbedder: Send + Sync {
    /// Fixed output dimension shared by every vector adapter.
    fn dimension(&self) -> usize;

    /// Turn text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Deterministic embedder using character trigram and word feature hashing.
///
/// Output vectors are L2-normalized. Over-length input is truncated to
/// `max_input_chars` before hashing, so truncation is deterministic.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    max_input_chars: usize,
}

impl HashingEmbedder {
    /// Create an embedder with the given dimension and input ceiling.
    pub fn new(dimension: usize, max_input_chars: usize) -> Self {
        Self {
            dimension,
            max_input_chars,
        }
    }
}

#[async_trait]
impl TextEmbedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let text = truncate_chars(&text, self.max_input_chars);
        let mut vector = vec![0.0f32; self.dimension];

        let chars: Vec<char> = text.chars().collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            let bucket = (hash_feature(&trigram) % self.dimension as u128) as usize;
            vector[bucket] += 1.0;
        }

        // Words carry more signal than trigrams.
        for word in text.split_whitespace() {
            let bucket = (hash_feature(word) % self.dimension as u128) as usize;
            vector[bucket] += 2.0;
        }

        normalize(&mut vector);
        Ok(vector)
    }
}

/// Hash a feature string into a stable bucket index source.
fn hash_feature(feature: &str) -> u128 {
    let mut hasher = Md5::new();
    hasher.update(feature.as_bytes());
    u128::from_be_bytes(hasher.finalize().into())
}

/// Truncate a string to a maximum character count.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}

/// Scale a vector to unit length in place; zero vectors are left untouched.
fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity of two vectors; zero for mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine similarity mapped into the [0, 1] score range.
pub fn similarity_score(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b).clamp(0.0, 1.0)
}
