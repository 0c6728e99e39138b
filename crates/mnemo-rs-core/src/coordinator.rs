//! Central orchestrator for store, search, delete, and cache operations.
//!
//! The durable store is the single authority: writes block on it alone, and
//! vector/cache propagation happens off the caller's path through the
//! propagation queue. Reads fan out in parallel under a deadline and degrade
//! to a durable scan when similarity search cannot be served.

use crate::policy::CoordinatorPolicy;
use crate::propagation::{PropagationJob, PropagationQueue, spawn_worker};
use crate::rank;
use futures_util::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use mnemo_rs_config::MnemoConfig;
use mnemo_rs_memory::{
    BackendKind, BackendRegistry, CacheEntry, HealthState, MemoryError, MemoryMetadata,
    MemoryRecord, RegisteredBackend, ScoredCandidate, SearchOutcome, SearchQuery, SearchResult,
    TextEmbedder,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Memory subsystem facade owning the fan-out and consistency policy.
pub struct MemoryCoordinator {
    registry: Arc<BackendRegistry>,
    embedder: Arc<dyn TextEmbedder>,
    policy: CoordinatorPolicy,
    propagation: PropagationQueue,
    probe_handle: JoinHandle<()>,
}

impl std::fmt::Debug for MemoryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCoordinator").finish_non_exhaustive()
    }
}

impl MemoryCoordinator {
    /// Build a coordinator from config, spawning its background tasks.
    ///
    /// Must be called within a tokio runtime. Embedding dimension agreement
    /// across vector backends is checked here, never per call.
    pub fn new(
        registry: Arc<BackendRegistry>,
        embedder: Arc<dyn TextEmbedder>,
        config: &MnemoConfig,
    ) -> Result<Self, MemoryError> {
        Self::with_policy(registry, embedder, CoordinatorPolicy::from_config(config))
    }

    /// Build a coordinator from an already-resolved policy.
    pub fn with_policy(
        registry: Arc<BackendRegistry>,
        embedder: Arc<dyn TextEmbedder>,
        policy: CoordinatorPolicy,
    ) -> Result<Self, MemoryError> {
        registry.validate_embedding_dimension(embedder.dimension())?;
        let (propagation, _worker) = spawn_worker(
            Arc::clone(&registry),
            policy.backend_op_timeout,
            policy.cache_default_ttl,
            policy.queue_capacity,
        );
        let probe_handle = tokio::spawn(probe_loop(Arc::clone(&registry), policy.probe_interval));
        info!(
            "memory coordinator started (backends={}, dimension={})",
            registry.backends().len(),
            embedder.dimension()
        );
        Ok(Self {
            registry,
            embedder,
            policy,
            propagation,
            probe_handle,
        })
    }

    /// Persist a new record, returning its id once the durable write lands.
    ///
    /// Embedding failure degrades the record instead of failing the call;
    /// vector indexing and cache priming happen asynchronously afterwards.
    pub async fn store(
        &self,
        content: &str,
        metadata: MemoryMetadata,
    ) -> Result<Uuid, MemoryError> {
        if content.trim().is_empty() {
            return Err(MemoryError::InvalidQuery(
                "content must not be empty".to_string(),
            ));
        }
        let embedding = match self.embedder.embed(content).await {
            Ok(vector) => Some(vector),
            Err(err) => {
                warn!("embedding failed; storing degraded record (error={err})");
                None
            }
        };

        let durable = self.registry.durable();
        if !durable.health.is_available() {
            return Err(unavailable(durable, "marked unavailable"));
        }
        let record = MemoryRecord::new(content, metadata, embedding, durable.adapter.name());
        match tokio::time::timeout(self.policy.durable_write_timeout, durable.adapter.put(&record))
            .await
        {
            Ok(Ok(())) => {
                durable.health.record_success();
                info!(
                    "record stored (record_id={}, degraded={})",
                    record.id,
                    record.is_degraded()
                );
                let id = record.id;
                if record.embedding.is_some() {
                    self.propagation
                        .submit(PropagationJob::VectorPut(record.clone()));
                }
                self.propagation.submit(PropagationJob::CachePrime(record));
                Ok(id)
            }
            Ok(Err(err)) => {
                durable.health.record_failure();
                Err(unavailable(durable, &err.to_string()))
            }
            Err(_) => {
                durable.health.record_failure();
                Err(unavailable(durable, "write timed out"))
            }
        }
    }

    /// Run a similarity search under the default deadline.
    pub async fn search(&self, query: SearchQuery) -> Result<SearchOutcome, MemoryError> {
        self.search_with_deadline(query, self.policy.search_deadline)
            .await
    }

    /// Run a similarity search under a caller-supplied deadline.
    ///
    /// Candidates gathered before the deadline are ranked and returned with
    /// `deadline_exceeded` set rather than discarding the whole call.
    pub async fn search_with_deadline(
        &self,
        query: SearchQuery,
        deadline: Duration,
    ) -> Result<SearchOutcome, MemoryError> {
        query.validate()?;

        let Some(embedding) = self.resolve_query_embedding(&query).await? else {
            // No usable embedding; metadata filters alone serve the query.
            return self.scan_fallback(&query).await;
        };

        let vector_backends = self.registry.available_vector_backends();
        if vector_backends.is_empty() {
            debug!("no vector backend available; serving search from durable scan");
            return self.scan_fallback(&query).await;
        }

        let mut fan_out = FuturesUnordered::new();
        for backend in vector_backends {
            let adapter = Arc::clone(&backend.adapter);
            let embedding = embedding.clone();
            let top_k = query.top_k;
            let op_timeout = self.policy.backend_op_timeout;
            fan_out.push(async move {
                let outcome =
                    tokio::time::timeout(op_timeout, adapter.nearest(&embedding, top_k)).await;
                (backend, outcome)
            });
        }

        let mut batches = Vec::new();
        let mut deadline_exceeded = false;
        let timer = tokio::time::sleep(deadline);
        tokio::pin!(timer);
        while !fan_out.is_empty() {
            tokio::select! {
                _ = &mut timer => {
                    deadline_exceeded = true;
                    warn!(
                        "search deadline exceeded; returning partial results (pending={})",
                        fan_out.len()
                    );
                    break;
                }
                Some((backend, outcome)) = fan_out.next() => match outcome {
                    Ok(Ok(candidates)) => {
                        backend.health.record_success();
                        batches.push(candidates);
                    }
                    Ok(Err(err)) => {
                        backend.health.record_failure();
                        warn!(
                            "nearest failed (backend={}, error={})",
                            backend.adapter.name(),
                            err
                        );
                    }
                    Err(_) => {
                        backend.health.record_failure();
                        warn!("nearest timed out (backend={})", backend.adapter.name());
                    }
                },
            }
        }

        if batches.is_empty() && !deadline_exceeded {
            debug!("every vector backend failed; serving search from durable scan");
            return self.scan_fallback(&query).await;
        }

        let mut candidates = rank::merge_candidates(batches);
        candidates.retain(|candidate| {
            candidate.similarity_score >= query.similarity_threshold
                && candidate.metadata.matches(&query.filters)
        });
        let candidates = self.drop_stale_candidates(candidates).await;

        let mut results: Vec<SearchResult> =
            candidates.into_iter().map(SearchResult::scored).collect();
        rank::rank_and_truncate(&mut results, query.top_k);
        debug!(
            "search completed (results={}, partial={})",
            results.len(),
            deadline_exceeded
        );
        Ok(SearchOutcome {
            results,
            deadline_exceeded,
        })
    }

    /// Remove a record; authoritative removal is the durable one.
    ///
    /// Vector and cache copies are cleaned asynchronously; any copy missed
    /// here is dropped lazily when a search hits it and the durable lookup
    /// misses.
    pub async fn delete(&self, id: Uuid) -> Result<(), MemoryError> {
        let durable = self.registry.durable();
        if !durable.health.is_available() {
            return Err(unavailable(durable, "marked unavailable"));
        }
        match tokio::time::timeout(self.policy.durable_write_timeout, durable.adapter.delete(id))
            .await
        {
            Ok(Ok(true)) => {
                durable.health.record_success();
                info!("record deleted (record_id={id})");
                self.propagation.submit(PropagationJob::Remove(id));
                Ok(())
            }
            Ok(Ok(false)) => {
                durable.health.record_success();
                Err(MemoryError::RecordNotFound(id))
            }
            Ok(Err(err)) => {
                durable.health.record_failure();
                Err(unavailable(durable, &err.to_string()))
            }
            Err(_) => {
                durable.health.record_failure();
                Err(unavailable(durable, "delete timed out"))
            }
        }
    }

    /// Store a value in the cache under an opaque key.
    pub async fn cache_put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), MemoryError> {
        let Some(cache) = self.registry.cache() else {
            return Err(MemoryError::BackendUnavailable {
                backend: "cache".to_string(),
                reason: "no cache backend configured".to_string(),
            });
        };
        if !cache.health.is_available() {
            return Err(unavailable(cache, "marked unavailable"));
        }
        let entry = CacheEntry::new(value, ttl.unwrap_or(self.policy.cache_default_ttl));
        match tokio::time::timeout(
            self.policy.backend_op_timeout,
            cache.adapter.cache_put(key, entry),
        )
        .await
        {
            Ok(Ok(())) => {
                cache.health.record_success();
                Ok(())
            }
            Ok(Err(err)) => {
                cache.health.record_failure();
                Err(unavailable(cache, &err.to_string()))
            }
            Err(_) => {
                cache.health.record_failure();
                Err(unavailable(cache, "cache write timed out"))
            }
        }
    }

    /// Read a cached value; absent, expired, or unreachable all read as
    /// `None`, never an error.
    pub async fn cache_get(&self, key: &str) -> Option<serde_json::Value> {
        let cache = self.registry.cache()?;
        if !cache.health.is_available() {
            return None;
        }
        match tokio::time::timeout(
            self.policy.backend_op_timeout,
            cache.adapter.cache_get(key),
        )
        .await
        {
            Ok(Ok(entry)) => {
                cache.health.record_success();
                entry.map(|entry| entry.value)
            }
            Ok(Err(err)) => {
                cache.health.record_failure();
                warn!("cache read failed (key={key}, error={err})");
                None
            }
            Err(_) => {
                cache.health.record_failure();
                warn!("cache read timed out (key={key})");
                None
            }
        }
    }

    /// Report per-backend health and entry counts.
    pub async fn stats(&self) -> MemoryStats {
        let mut backends = Vec::new();
        for backend in self.registry.backends() {
            let entries = match tokio::time::timeout(
                self.policy.backend_op_timeout,
                backend.adapter.count(),
            )
            .await
            {
                Ok(Ok(count)) => Some(count),
                _ => None,
            };
            backends.push(BackendStatus {
                name: backend.adapter.name().to_string(),
                kind: backend.adapter.kind(),
                state: backend.health.state(),
                entries,
            });
        }
        MemoryStats { backends }
    }

    /// Wait until previously enqueued side-effect propagation completes.
    pub async fn flush(&self) {
        self.propagation.flush().await;
    }

    /// Drain pending propagation and stop background tasks.
    pub async fn shutdown(&self) {
        self.propagation.flush().await;
        self.probe_handle.abort();
        info!("memory coordinator stopped");
    }

    /// Resolve the query vector, or `None` when the metadata fallback
    /// should serve the query instead.
    async fn resolve_query_embedding(
        &self,
        query: &SearchQuery,
    ) -> Result<Option<Vec<f32>>, MemoryError> {
        if let Some(vector) = &query.query_embedding {
            if vector.len() != self.embedder.dimension() {
                return Err(MemoryError::InvalidQuery(format!(
                    "query embedding dimension {} does not match configured dimension {}",
                    vector.len(),
                    self.embedder.dimension()
                )));
            }
            return Ok(Some(vector.clone()));
        }
        let Some(text) = &query.query_text else {
            return Ok(None);
        };
        match self.embedder.embed(text).await {
            Ok(vector) => Ok(Some(vector)),
            Err(err) if !query.filters.is_empty() => {
                warn!("query embedding failed; falling back to metadata scan (error={err})");
                Ok(None)
            }
            Err(err) => Err(MemoryError::EmbeddingUnavailable(err)),
        }
    }

    /// Drop candidates whose id misses in the durable store, enqueueing lazy
    /// cleanup of the orphaned copies.
    async fn drop_stale_candidates(
        &self,
        candidates: Vec<ScoredCandidate>,
    ) -> Vec<ScoredCandidate> {
        let durable = self.registry.durable();
        if !durable.health.is_available() {
            return candidates;
        }
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match tokio::time::timeout(
                self.policy.backend_op_timeout,
                durable.adapter.get(candidate.record_id),
            )
            .await
            {
                Ok(Ok(Some(_))) => {
                    durable.health.record_success();
                    kept.push(candidate);
                }
                Ok(Ok(None)) => {
                    durable.health.record_success();
                    debug!(
                        "dropping stale vector hit (record_id={})",
                        candidate.record_id
                    );
                    self.propagation
                        .submit(PropagationJob::Remove(candidate.record_id));
                }
                Ok(Err(err)) => {
                    durable.health.record_failure();
                    warn!(
                        "durable existence check failed (record_id={}, error={})",
                        candidate.record_id, err
                    );
                    kept.push(candidate);
                }
                Err(_) => {
                    durable.health.record_failure();
                    warn!(
                        "durable existence check timed out (record_id={})",
                        candidate.record_id
                    );
                    kept.push(candidate);
                }
            }
        }
        kept
    }

    /// Serve a search from the durable store scan with unscored results.
    async fn scan_fallback(&self, query: &SearchQuery) -> Result<SearchOutcome, MemoryError> {
        let durable = self.registry.durable();
        if !durable.health.is_available() {
            return Err(unavailable(durable, "marked unavailable"));
        }
        match tokio::time::timeout(
            self.policy.backend_op_timeout,
            durable.adapter.scan(&query.filters),
        )
        .await
        {
            Ok(Ok(records)) => {
                durable.health.record_success();
                let mut results: Vec<SearchResult> =
                    records.into_iter().map(SearchResult::unscored).collect();
                rank::rank_and_truncate(&mut results, query.top_k);
                debug!("fallback scan served search (results={})", results.len());
                Ok(SearchOutcome {
                    results,
                    deadline_exceeded: false,
                })
            }
            Ok(Err(err)) => {
                durable.health.record_failure();
                Err(unavailable(durable, &err.to_string()))
            }
            Err(_) => {
                durable.health.record_failure();
                Err(unavailable(durable, "scan timed out"))
            }
        }
    }
}

impl Drop for MemoryCoordinator {
    fn drop(&mut self) {
        self.probe_handle.abort();
    }
}

/// Subsystem-wide health and size snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryStats {
    /// Status per configured backend.
    pub backends: Vec<BackendStatus>,
}

/// Health and size of one backend.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BackendStatus {
    /// Adapter name.
    pub name: String,
    /// Storage role.
    pub kind: BackendKind,
    /// Current health state.
    pub state: HealthState,
    /// Entry count, when the backend reported one in time.
    pub entries: Option<usize>,
}

/// Periodically probe non-healthy backends so they can rejoin fan-out.
async fn probe_loop(registry: Arc<BackendRegistry>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        registry.probe_unavailable().await;
    }
}

fn unavailable(backend: &RegisteredBackend, reason: &str) -> MemoryError {
    MemoryError::BackendUnavailable {
        backend: backend.adapter.name().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryCoordinator;
    use mnemo_rs_config::MnemoConfig;
    use mnemo_rs_memory::{
        BackendAdapter, BackendRegistry, FilterValue, HashingEmbedder, HealthState,
        InMemoryCacheStore, InMemoryVectorStore, MemoryError, MemoryMetadata, MetadataFilters,
        SearchQuery, SqliteDurableStore, TextEmbedder, record_cache_key,
    };
    use mnemo_rs_test_utils::{FailingBackend, FailingEmbedder, SlowBackend};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    const DIM: usize = 256;

    struct Harness {
        coordinator: MemoryCoordinator,
        registry: Arc<BackendRegistry>,
        durable: Arc<SqliteDurableStore>,
        vector: Arc<InMemoryVectorStore>,
        cache: Arc<InMemoryCacheStore>,
        embedder: Arc<HashingEmbedder>,
    }

    fn harness() -> Harness {
        let durable = Arc::new(SqliteDurableStore::in_memory().expect("open durable"));
        let vector = Arc::new(InMemoryVectorStore::new(DIM));
        let cache = Arc::new(InMemoryCacheStore::new());
        let registry = Arc::new(
            BackendRegistry::builder()
                .with_backend(durable.clone())
                .with_backend(vector.clone())
                .with_backend(cache.clone())
                .build()
                .expect("registry"),
        );
        let embedder = Arc::new(HashingEmbedder::new(DIM, 1024));
        let coordinator = MemoryCoordinator::new(
            registry.clone(),
            embedder.clone(),
            &MnemoConfig::default(),
        )
        .expect("coordinator");
        Harness {
            coordinator,
            registry,
            durable,
            vector,
            cache,
            embedder,
        }
    }

    fn metadata(category: &str, importance: u8) -> MemoryMetadata {
        MemoryMetadata {
            category: Some(category.to_string()),
            importance,
            ..MemoryMetadata::default()
        }
    }

    fn category_filter(category: &str) -> MetadataFilters {
        let mut filters = MetadataFilters::new();
        filters.insert(
            "category".to_string(),
            FilterValue::One(category.to_string()),
        );
        filters
    }

    #[tokio::test]
    async fn store_persists_then_propagates() {
        let h = harness();
        let id = h
            .coordinator
            .store("hello world", metadata("note", 5))
            .await
            .expect("store");
        h.coordinator.flush().await;

        let durable_copy = h.durable.get(id).await.expect("get").expect("persisted");
        assert_eq!(durable_copy.content, "hello world");
        assert!(!durable_copy.is_degraded());
        assert_eq!(h.vector.count().await.expect("count"), 1);
        assert!(
            h.cache
                .cache_get(&record_cache_key(id))
                .await
                .expect("cache get")
                .is_some()
        );
    }

    #[tokio::test]
    async fn store_rejects_empty_content() {
        let h = harness();
        let err = h
            .coordinator
            .store("   ", MemoryMetadata::default())
            .await
            .expect_err("empty content");
        assert!(matches!(err, MemoryError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn search_orders_by_score_then_importance() {
        let h = harness();
        let a = h
            .coordinator
            .store("Python is great", metadata("pref", 8))
            .await
            .expect("store a");
        let b = h
            .coordinator
            .store("Rust is fast", metadata("pref", 3))
            .await
            .expect("store b");
        h.coordinator.flush().await;

        let outcome = h
            .coordinator
            .search(SearchQuery::text("programming languages").with_top_k(2))
            .await
            .expect("search");
        assert!(!outcome.deadline_exceeded);
        assert_eq!(outcome.results.len(), 2);

        let ids: Vec<Uuid> = outcome.results.iter().map(|r| r.record_id).collect();
        assert!(ids.contains(&a) && ids.contains(&b));

        let first = outcome.results[0].similarity_score.expect("scored");
        let second = outcome.results[1].similarity_score.expect("scored");
        assert!(first >= second);
        if first == second {
            // Equal scores break ties by importance (8 over 3).
            assert_eq!(outcome.results[0].record_id, a);
        }
    }

    #[tokio::test]
    async fn threshold_excludes_low_scores() {
        let h = harness();
        let a = h
            .coordinator
            .store("Python is great", metadata("pref", 8))
            .await
            .expect("store a");
        h.coordinator
            .store("Rust is fast", metadata("pref", 3))
            .await
            .expect("store b");
        h.coordinator.flush().await;

        let query_embedding = h.embedder.embed("Python is great").await.expect("embed");
        let outcome = h
            .coordinator
            .search(SearchQuery::embedding(query_embedding).with_threshold(0.9))
            .await
            .expect("search");

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].record_id, a);
        for result in &outcome.results {
            assert!(result.similarity_score.expect("scored") >= 0.9);
        }
    }

    #[tokio::test]
    async fn durable_failure_fails_store_without_orphans() {
        let vector = Arc::new(InMemoryVectorStore::new(DIM));
        let cache = Arc::new(InMemoryCacheStore::new());
        let registry = Arc::new(
            BackendRegistry::builder()
                .with_backend(Arc::new(FailingBackend::durable()))
                .with_backend(vector.clone())
                .with_backend(cache.clone())
                .build()
                .expect("registry"),
        );
        let coordinator = MemoryCoordinator::new(
            registry,
            Arc::new(HashingEmbedder::new(DIM, 1024)),
            &MnemoConfig::default(),
        )
        .expect("coordinator");

        let err = coordinator
            .store("hello", MemoryMetadata::default())
            .await
            .expect_err("durable down");
        assert!(matches!(err, MemoryError::BackendUnavailable { .. }));

        coordinator.flush().await;
        assert_eq!(vector.count().await.expect("count"), 0);
        assert_eq!(cache.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn degraded_record_is_filter_searchable_only() {
        let durable = Arc::new(SqliteDurableStore::in_memory().expect("open durable"));
        let vector = Arc::new(InMemoryVectorStore::new(DIM));
        let registry = Arc::new(
            BackendRegistry::builder()
                .with_backend(durable.clone())
                .with_backend(vector.clone())
                .build()
                .expect("registry"),
        );
        let coordinator = MemoryCoordinator::new(
            registry,
            Arc::new(FailingEmbedder::new(DIM)),
            &MnemoConfig::default(),
        )
        .expect("coordinator");

        let id = coordinator
            .store("hello", metadata("pref", 5))
            .await
            .expect("degraded store");
        coordinator.flush().await;
        assert_eq!(vector.count().await.expect("count"), 0);

        // Similarity search never sees the record.
        let outcome = coordinator
            .search(SearchQuery::embedding(vec![0.1; DIM]))
            .await
            .expect("similarity search");
        assert!(outcome.results.is_empty());

        // The embedder also fails for the query text, but a metadata filter
        // lets the search fall back to a durable scan.
        let outcome = coordinator
            .search(SearchQuery::text("hello").with_filter(
                "category",
                FilterValue::One("pref".to_string()),
            ))
            .await
            .expect("filter search");
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].record_id, id);
        assert_eq!(outcome.results[0].similarity_score, None);

        // Without filters the failed embedding is fatal to the call.
        let err = coordinator
            .search(SearchQuery::text("hello"))
            .await
            .expect_err("no fallback");
        assert!(matches!(err, MemoryError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn unavailable_vector_backends_fall_back_to_scan() {
        let h = harness();
        h.coordinator
            .store("Python is great", metadata("pref", 8))
            .await
            .expect("store");
        h.coordinator.flush().await;

        for backend in h.registry.vector_backends() {
            for _ in 0..3 {
                backend.health.record_failure();
            }
            assert_eq!(backend.health.state(), HealthState::Unavailable);
        }

        let outcome = h
            .coordinator
            .search(SearchQuery::text("Python").with_filter(
                "category",
                FilterValue::One("pref".to_string()),
            ))
            .await
            .expect("fallback search");
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].similarity_score, None);
        assert!(!outcome.deadline_exceeded);
    }

    #[tokio::test]
    async fn metadata_only_query_scans_durable() {
        let h = harness();
        h.coordinator
            .store("Python is great", metadata("pref", 8))
            .await
            .expect("store");
        h.coordinator
            .store("meeting at noon", metadata("event", 2))
            .await
            .expect("store");
        h.coordinator.flush().await;

        let outcome = h
            .coordinator
            .search(SearchQuery::filters_only(category_filter("pref")))
            .await
            .expect("scan search");
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].content, "Python is great");
        assert_eq!(outcome.results[0].similarity_score, None);
    }

    #[tokio::test]
    async fn delete_is_idempotent_with_not_found() {
        let h = harness();
        let id = h
            .coordinator
            .store("hello", MemoryMetadata::default())
            .await
            .expect("store");

        h.coordinator.delete(id).await.expect("first delete");
        let err = h.coordinator.delete(id).await.expect_err("second delete");
        assert!(matches!(err, MemoryError::RecordNotFound(missing) if missing == id));

        h.coordinator.flush().await;
        assert_eq!(h.vector.count().await.expect("count"), 0);
        assert_eq!(
            h.cache
                .cache_get(&record_cache_key(id))
                .await
                .expect("cache get"),
            None
        );
    }

    #[tokio::test]
    async fn invalid_queries_are_rejected_before_backends() {
        let h = harness();

        let err = h
            .coordinator
            .search(SearchQuery::text("x").with_top_k(0))
            .await
            .expect_err("zero top_k");
        assert!(matches!(err, MemoryError::InvalidQuery(_)));

        let err = h
            .coordinator
            .search(SearchQuery::filters_only(MetadataFilters::new()))
            .await
            .expect_err("no query");
        assert!(matches!(err, MemoryError::InvalidQuery(_)));

        let err = h
            .coordinator
            .search(SearchQuery::embedding(vec![0.0; DIM + 1]))
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(err, MemoryError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn deadline_returns_partial_results() {
        let durable = Arc::new(SqliteDurableStore::in_memory().expect("open durable"));
        let fast = Arc::new(InMemoryVectorStore::new(DIM));
        let slow = Arc::new(SlowBackend::new(
            Arc::new(InMemoryVectorStore::with_name("memory-vector-slow", DIM)),
            Duration::from_millis(300),
        ));
        let registry = Arc::new(
            BackendRegistry::builder()
                .with_backend(durable)
                .with_backend(fast.clone())
                .with_backend(slow)
                .build()
                .expect("registry"),
        );
        let coordinator = MemoryCoordinator::new(
            registry,
            Arc::new(HashingEmbedder::new(DIM, 1024)),
            &MnemoConfig::default(),
        )
        .expect("coordinator");

        let id = coordinator
            .store("Python is great", metadata("pref", 8))
            .await
            .expect("store");
        coordinator.flush().await;

        let outcome = coordinator
            .search_with_deadline(
                SearchQuery::text("Python"),
                Duration::from_millis(100),
            )
            .await
            .expect("partial search");
        assert!(outcome.deadline_exceeded);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].record_id, id);
    }

    #[tokio::test]
    async fn stale_vector_hits_are_dropped_and_reconciled() {
        let h = harness();
        let id = h
            .coordinator
            .store("hello world", metadata("note", 5))
            .await
            .expect("store");
        h.coordinator.flush().await;

        // Remove the durable copy out of band; the index copy is now stale.
        assert!(h.durable.delete(id).await.expect("direct delete"));
        assert_eq!(h.vector.count().await.expect("count"), 1);

        let outcome = h
            .coordinator
            .search(SearchQuery::text("hello world"))
            .await
            .expect("search");
        assert!(outcome.results.is_empty());

        h.coordinator.flush().await;
        assert_eq!(h.vector.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn cache_round_trip_and_expiry() {
        let h = harness();
        h.coordinator
            .cache_put("session:1", json!({"topic": "rust"}), None)
            .await
            .expect("cache put");
        assert_eq!(
            h.coordinator.cache_get("session:1").await,
            Some(json!({"topic": "rust"}))
        );

        h.coordinator
            .cache_put("session:2", json!("gone"), Some(Duration::ZERO))
            .await
            .expect("cache put");
        assert_eq!(h.coordinator.cache_get("session:2").await, None);
        assert_eq!(h.coordinator.cache_get("absent").await, None);
    }

    #[tokio::test]
    async fn cache_put_without_cache_backend_errors() {
        let registry = Arc::new(
            BackendRegistry::builder()
                .with_backend(Arc::new(SqliteDurableStore::in_memory().expect("open")))
                .build()
                .expect("registry"),
        );
        let coordinator = MemoryCoordinator::new(
            registry,
            Arc::new(HashingEmbedder::new(DIM, 1024)),
            &MnemoConfig::default(),
        )
        .expect("coordinator");

        let err = coordinator
            .cache_put("key", json!(1), None)
            .await
            .expect_err("no cache backend");
        assert!(matches!(err, MemoryError::BackendUnavailable { .. }));
        assert_eq!(coordinator.cache_get("key").await, None);
    }

    #[tokio::test]
    async fn stats_report_backend_state_and_counts() {
        let h = harness();
        h.coordinator
            .store("hello", MemoryMetadata::default())
            .await
            .expect("store");
        h.coordinator.flush().await;

        let stats = h.coordinator.stats().await;
        assert_eq!(stats.backends.len(), 3);
        for status in &stats.backends {
            assert_eq!(status.state, HealthState::Healthy);
            assert_eq!(status.entries, Some(1));
        }
    }

    #[tokio::test]
    async fn dimension_mismatch_is_a_startup_error() {
        let registry = Arc::new(
            BackendRegistry::builder()
                .with_backend(Arc::new(SqliteDurableStore::in_memory().expect("open")))
                .with_backend(Arc::new(InMemoryVectorStore::new(DIM + 1)))
                .build()
                .expect("registry"),
        );
        let err = MemoryCoordinator::new(
            registry,
            Arc::new(HashingEmbedder::new(DIM, 1024)),
            &MnemoConfig::default(),
        )
        .expect_err("dimension mismatch");
        assert!(matches!(err, MemoryError::Configuration(_)));
    }
}
