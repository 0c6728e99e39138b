//! Error taxonomy for memory operations.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Input text was empty after trimming.
    #[error("cannot embed empty text")]
    EmptyInput,
    /// The embedding provider failed transiently.
    #[error("embedding provider failed: {0}")]
    Provider(String),
    /// The provider returned a vector of the wrong dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors returned by individual backend adapters.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The adapter does not implement this capability.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The record carries no embedding.
    #[error("record has no embedding")]
    MissingEmbedding,
    /// A vector did not match the adapter's fixed dimension.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),
}

/// Caller-visible errors for coordinator operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Request rejected before any backend call was made.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// The id is absent from the durable store.
    #[error("record not found: {0}")]
    RecordNotFound(Uuid),
    /// A similarity query could not be embedded and no metadata fallback applies.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),
    /// A required backend could not serve the operation.
    #[error("backend unavailable: {backend}: {reason}")]
    BackendUnavailable { backend: String, reason: String },
    /// The operation exceeded its deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// Startup-time wiring error (adapter set or dimensions).
    #[error("configuration error: {0}")]
    Configuration(String),
}
