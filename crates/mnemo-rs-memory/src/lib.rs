//! Data model, embedding, backend adapters, and registry for the mnemo
//! memory subsystem.

pub mod adapter;
pub mod cache;
pub mod durable;
pub mod embedding;
pub mod error;
pub mod model;
pub mod registry;
pub mod vector;

/// Backend capability interface.
pub use adapter::{BackendAdapter, BackendKind, Capability};
/// In-process TTL cache store.
pub use cache::{InMemoryCacheStore, record_cache_key};
/// SQLite durable store.
pub use durable::SqliteDurableStore;
/// Embedding interface, default embedder, and similarity scoring.
pub use embedding::{HashingEmbedder, TextEmbedder, cosine_similarity, similarity_score};
/// Error taxonomy.
pub use error::{BackendError, EmbeddingError, MemoryError};
/// Record, query, and result models.
pub use model::{
    CacheEntry, FilterValue, MemoryMetadata, MemoryRecord, MetadataFilters, ScoredCandidate,
    SearchOutcome, SearchQuery, SearchResult,
};
/// Registry and health tracking.
pub use registry::{
    BackendHealth, BackendRegistry, BackendRegistryBuilder, HealthState, RegisteredBackend,
};
/// In-memory vector store.
pub use vector::InMemoryVectorStore;
