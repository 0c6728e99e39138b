use async_trait::async_trait;
use mnemo_rs_memory::{EmbeddingError, TextEmbedder};

/// Embedder that always fails, for exercising degraded paths.
pub struct FailingEmbedder {
    dimension: usize,
}

impl FailingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl TextEmbedder for FailingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Provider(
            "injected embedding failure".to_string(),
        ))
    }
}
