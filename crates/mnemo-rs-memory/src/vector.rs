//! In-process vector index with linear-scan cosine search.
//!
//! This is the default nearest-neighbor capability; any ANN technology can
//! replace it behind [`BackendAdapter`]. Content and metadata are carried as
//! opaque payload and never interpreted here.

use crate::adapter::{BackendAdapter, BackendKind, Capability};
use crate::embedding::similarity_score;
use crate::error::BackendError;
use crate::model::{MemoryMetadata, MemoryRecord, ScoredCandidate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Default adapter name for the in-process vector index.
const DEFAULT_NAME: &str = "memory-vector";

/// One indexed vector plus its opaque payload.
#[derive(Debug, Clone)]
struct VectorEntry {
    embedding: Vec<f32>,
    content: String,
    metadata: MemoryMetadata,
    created_at: DateTime<Utc>,
}

/// Vector store over an in-process map, fixed dimension per instance.
pub struct InMemoryVectorStore {
    name: String,
    dimension: usize,
    entries: RwLock<HashMap<Uuid, VectorEntry>>,
}

impl InMemoryVectorStore {
    /// Create an empty index for the given embedding dimension.
    pub fn new(dimension: usize) -> Self {
        Self::with_name(DEFAULT_NAME, dimension)
    }

    /// Create an empty index with an explicit adapter name.
    pub fn with_name(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BackendAdapter for InMemoryVectorStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Vector
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Put, Capability::Delete, Capability::Nearest]
    }

    fn embedding_dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    async fn put(&self, record: &MemoryRecord) -> Result<(), BackendError> {
        let Some(embedding) = record.embedding.clone() else {
            return Err(BackendError::MissingEmbedding);
        };
        if embedding.len() != self.dimension {
            return Err(BackendError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        let entry = VectorEntry {
            embedding,
            content: record.content.clone(),
            metadata: record.metadata.clone(),
            created_at: record.created_at,
        };
        self.entries.write().insert(record.id, entry);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, BackendError> {
        Ok(self.entries.write().remove(&id).is_some())
    }

    async fn nearest(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredCandidate>, BackendError> {
        if embedding.len() != self.dimension {
            return Err(BackendError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        let entries = self.entries.read();
        let mut candidates: Vec<ScoredCandidate> = entries
            .iter()
            .map(|(id, entry)| ScoredCandidate {
                record_id: *id,
                similarity_score: similarity_score(embedding, &entry.embedding),
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
                created_at: entry.created_at,
            })
            .collect();
        candidates.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        candidates.truncate(top_k);
        debug!(
            "nearest returned {} candidates (backend={}, top_k={})",
            candidates.len(),
            self.name,
            top_k
        );
        Ok(candidates)
    }

    async fn count(&self) -> Result<usize, BackendError> {
        Ok(self.entries.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryVectorStore;
    use crate::adapter::BackendAdapter;
    use crate::error::BackendError;
    use crate::model::{MemoryMetadata, MemoryRecord};
    use pretty_assertions::assert_eq;

    fn record(content: &str, embedding: Option<Vec<f32>>) -> MemoryRecord {
        MemoryRecord::new(content, MemoryMetadata::default(), embedding, "test")
    }

    #[tokio::test]
    async fn nearest_orders_by_score_and_truncates() {
        let store = InMemoryVectorStore::new(2);
        let close = record("close", Some(vec![1.0, 0.0]));
        let mid = record("mid", Some(vec![0.7, 0.7]));
        let far = record("far", Some(vec![0.0, 1.0]));
        store.put(&close).await.expect("put");
        store.put(&mid).await.expect("put");
        store.put(&far).await.expect("put");

        let hits = store.nearest(&[1.0, 0.0], 2).await.expect("nearest");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record_id, close.id);
        assert_eq!(hits[1].record_id, mid.id);
        assert!(hits[0].similarity_score >= hits[1].similarity_score);
    }

    #[tokio::test]
    async fn rejects_records_without_embedding() {
        let store = InMemoryVectorStore::new(2);
        let err = store
            .put(&record("degraded", None))
            .await
            .expect_err("missing embedding");
        assert!(matches!(err, BackendError::MissingEmbedding));
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch() {
        let store = InMemoryVectorStore::new(2);
        let err = store
            .put(&record("bad", Some(vec![1.0, 0.0, 0.0])))
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(
            err,
            BackendError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));

        let err = store.nearest(&[1.0], 5).await.expect_err("query mismatch");
        assert!(matches!(err, BackendError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = InMemoryVectorStore::new(2);
        let stored = record("entry", Some(vec![1.0, 0.0]));
        store.put(&stored).await.expect("put");

        assert!(store.delete(stored.id).await.expect("first delete"));
        assert!(!store.delete(stored.id).await.expect("second delete"));
        assert_eq!(store.count().await.expect("count"), 0);
    }
}
