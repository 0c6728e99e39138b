//! Capability interface implemented by every storage backend.

use crate::error::BackendError;
use crate::model::{CacheEntry, MemoryRecord, MetadataFilters, ScoredCandidate};
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Storage role a backend plays in the subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Approximate nearest-neighbor index.
    Vector,
    /// Short-lived key-value cache.
    Cache,
    /// Authoritative persistent store.
    Durable,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Vector => write!(f, "vector"),
            BackendKind::Cache => write!(f, "cache"),
            BackendKind::Durable => write!(f, "durable"),
        }
    }
}

/// A single operation a backend may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Write a record.
    Put,
    /// Read a record by id.
    Get,
    /// Remove a record by id.
    Delete,
    /// Nearest-neighbor search.
    Nearest,
    /// Metadata-filtered enumeration.
    Scan,
    /// TTL key-value operations.
    CacheKv,
}

#[async_trait]
/// Uniform adapter over one concrete storage technology.
///
/// Adapters implement a subset of the operations; unsupported calls return
/// [`BackendError::Unsupported`]. The advertised [`Capability`] set and the
/// defaults below must stay in agreement.
pub trait BackendAdapter: Send + Sync {
    /// Stable adapter name used in logs and `origin_backend`.
    fn name(&self) -> &str;

    /// Storage role of this adapter.
    fn kind(&self) -> BackendKind;

    /// Operations this adapter supports.
    fn capabilities(&self) -> &'static [Capability];

    /// Fixed embedding dimension for vector backends.
    fn embedding_dimension(&self) -> Option<usize> {
        None
    }

    /// Lightweight liveness check used by the background probe.
    async fn probe(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Write a record.
    async fn put(&self, _record: &MemoryRecord) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("put"))
    }

    /// Read a record by id.
    async fn get(&self, _id: Uuid) -> Result<Option<MemoryRecord>, BackendError> {
        Err(BackendError::Unsupported("get"))
    }

    /// Remove a record by id, reporting whether it existed.
    async fn delete(&self, _id: Uuid) -> Result<bool, BackendError> {
        Err(BackendError::Unsupported("delete"))
    }

    /// Return the `top_k` nearest candidates to the query vector.
    async fn nearest(
        &self,
        _embedding: &[f32],
        _top_k: usize,
    ) -> Result<Vec<ScoredCandidate>, BackendError> {
        Err(BackendError::Unsupported("nearest"))
    }

    /// Enumerate records matching the metadata filters.
    async fn scan(&self, _filters: &MetadataFilters) -> Result<Vec<MemoryRecord>, BackendError> {
        Err(BackendError::Unsupported("scan"))
    }

    /// Store a cache entry under an opaque key.
    async fn cache_put(&self, _key: &str, _entry: CacheEntry) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("cache_put"))
    }

    /// Read a cache entry; expired entries read as absent.
    async fn cache_get(&self, _key: &str) -> Result<Option<CacheEntry>, BackendError> {
        Err(BackendError::Unsupported("cache_get"))
    }

    /// Remove a cache entry.
    async fn cache_delete(&self, _key: &str) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("cache_delete"))
    }

    /// Number of stored entries, for stats reporting.
    async fn count(&self) -> Result<usize, BackendError> {
        Err(BackendError::Unsupported("count"))
    }
}
