use async_trait::async_trait;
use mnemo_rs_memory::{
    BackendAdapter, BackendError, BackendKind, CacheEntry, Capability, MemoryRecord,
    MetadataFilters, ScoredCandidate,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn injected_failure() -> BackendError {
    BackendError::Unreachable("injected failure".to_string())
}

/// Backend whose every operation fails, for exercising unavailability.
pub struct FailingBackend {
    name: String,
    kind: BackendKind,
    dimension: Option<usize>,
}

impl FailingBackend {
    pub fn durable() -> Self {
        Self {
            name: "failing-durable".to_string(),
            kind: BackendKind::Durable,
            dimension: None,
        }
    }

    pub fn vector(dimension: usize) -> Self {
        Self {
            name: "failing-vector".to_string(),
            kind: BackendKind::Vector,
            dimension: Some(dimension),
        }
    }

    pub fn cache() -> Self {
        Self {
            name: "failing-cache".to_string(),
            kind: BackendKind::Cache,
            dimension: None,
        }
    }
}

#[async_trait]
impl BackendAdapter for FailingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn capabilities(&self) -> &'static [Capability] {
        match self.kind {
            BackendKind::Durable => &[
                Capability::Put,
                Capability::Get,
                Capability::Delete,
                Capability::Scan,
            ],
            BackendKind::Vector => &[Capability::Put, Capability::Delete, Capability::Nearest],
            BackendKind::Cache => &[Capability::CacheKv],
        }
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.dimension
    }

    async fn probe(&self) -> Result<(), BackendError> {
        Err(injected_failure())
    }

    async fn put(&self, _record: &MemoryRecord) -> Result<(), BackendError> {
        Err(injected_failure())
    }

    async fn get(&self, _id: Uuid) -> Result<Option<MemoryRecord>, BackendError> {
        Err(injected_failure())
    }

    async fn delete(&self, _id: Uuid) -> Result<bool, BackendError> {
        Err(injected_failure())
    }

    async fn nearest(
        &self,
        _embedding: &[f32],
        _top_k: usize,
    ) -> Result<Vec<ScoredCandidate>, BackendError> {
        Err(injected_failure())
    }

    async fn scan(&self, _filters: &MetadataFilters) -> Result<Vec<MemoryRecord>, BackendError> {
        Err(injected_failure())
    }

    async fn cache_put(&self, _key: &str, _entry: CacheEntry) -> Result<(), BackendError> {
        Err(injected_failure())
    }

    async fn cache_get(&self, _key: &str) -> Result<Option<CacheEntry>, BackendError> {
        Err(injected_failure())
    }

    async fn cache_delete(&self, _key: &str) -> Result<(), BackendError> {
        Err(injected_failure())
    }

    async fn count(&self) -> Result<usize, BackendError> {
        Err(injected_failure())
    }
}

/// Wrapper that delays every operation before delegating, for deadline and
/// timeout tests.
pub struct SlowBackend {
    inner: Arc<dyn BackendAdapter>,
    delay: Duration,
}

impl SlowBackend {
    pub fn new(inner: Arc<dyn BackendAdapter>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl BackendAdapter for SlowBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn capabilities(&self) -> &'static [Capability] {
        self.inner.capabilities()
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.inner.embedding_dimension()
    }

    async fn probe(&self) -> Result<(), BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.probe().await
    }

    async fn put(&self, record: &MemoryRecord) -> Result<(), BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.put(record).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<MemoryRecord>, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(id).await
    }

    async fn nearest(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredCandidate>, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.nearest(embedding, top_k).await
    }

    async fn scan(&self, filters: &MetadataFilters) -> Result<Vec<MemoryRecord>, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.scan(filters).await
    }

    async fn cache_put(&self, key: &str, entry: CacheEntry) -> Result<(), BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.cache_put(key, entry).await
    }

    async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.cache_get(key).await
    }

    async fn cache_delete(&self, key: &str) -> Result<(), BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.cache_delete(key).await
    }

    async fn count(&self) -> Result<usize, BackendError> {
        self.inner.count().await
    }
}
