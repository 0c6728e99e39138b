//! Fire-and-forget propagation of side effects to optional backends.
//!
//! Jobs run on a single worker task fed by a bounded queue, which gives
//! at-most-one-in-flight-per-record ordering. Failures update backend health
//! and are logged; they are never surfaced to the caller, whose durable copy
//! is already safe.

use log::{debug, warn};
use mnemo_rs_memory::{
    BackendError, BackendRegistry, CacheEntry, MemoryRecord, RegisteredBackend, record_cache_key,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One queued side effect.
pub(crate) enum PropagationJob {
    /// Index an embedded record in every vector backend.
    VectorPut(MemoryRecord),
    /// Prime the cache with a freshly persisted record.
    CachePrime(MemoryRecord),
    /// Remove a record's vector and cache copies.
    Remove(Uuid),
    /// Acknowledge once every prior job has been processed.
    Flush(oneshot::Sender<()>),
}

/// Submission handle for the propagation worker.
pub(crate) struct PropagationQueue {
    tx: mpsc::Sender<PropagationJob>,
}

impl PropagationQueue {
    /// Enqueue a job without blocking; a full queue drops the job.
    pub(crate) fn submit(&self, job: PropagationJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("propagation queue full; dropping side-effect job");
            }
            Err(TrySendError::Closed(_)) => {
                warn!("propagation worker stopped; dropping side-effect job");
            }
        }
    }

    /// Wait until every previously enqueued job has been processed.
    pub(crate) async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(PropagationJob::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

/// Spawn the propagation worker, returning its queue and join handle.
pub(crate) fn spawn_worker(
    registry: Arc<BackendRegistry>,
    op_timeout: Duration,
    cache_ttl: Duration,
    capacity: usize,
) -> (PropagationQueue, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let handle = tokio::spawn(worker_loop(registry, rx, op_timeout, cache_ttl));
    (PropagationQueue { tx }, handle)
}

async fn worker_loop(
    registry: Arc<BackendRegistry>,
    mut rx: mpsc::Receiver<PropagationJob>,
    op_timeout: Duration,
    cache_ttl: Duration,
) {
    while let Some(job) = rx.recv().await {
        match job {
            PropagationJob::VectorPut(record) => {
                for backend in registry.vector_backends() {
                    if !backend.health.is_available() {
                        continue;
                    }
                    apply(backend, op_timeout, "vector put", backend.adapter.put(&record)).await;
                }
                debug!("vector propagation finished (record_id={})", record.id);
            }
            PropagationJob::CachePrime(record) => {
                let Some(cache) = registry.cache() else {
                    continue;
                };
                if !cache.health.is_available() {
                    continue;
                }
                let value = match serde_json::to_value(&record) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(
                            "cache prime skipped; record not serializable (record_id={}, error={})",
                            record.id, err
                        );
                        continue;
                    }
                };
                let key = record_cache_key(record.id);
                let entry = CacheEntry::new(value, cache_ttl);
                apply(cache, op_timeout, "cache prime", cache.adapter.cache_put(&key, entry))
                    .await;
            }
            PropagationJob::Remove(id) => {
                for backend in registry.vector_backends() {
                    if !backend.health.is_available() {
                        continue;
                    }
                    apply(backend, op_timeout, "vector delete", backend.adapter.delete(id)).await;
                }
                if let Some(cache) = registry.cache()
                    && cache.health.is_available()
                {
                    let key = record_cache_key(id);
                    apply(cache, op_timeout, "cache delete", cache.adapter.cache_delete(&key))
                        .await;
                }
            }
            PropagationJob::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("propagation worker stopped");
}

/// Run one backend call under the operation timeout, recording health.
async fn apply<T, Fut>(
    backend: &RegisteredBackend,
    op_timeout: Duration,
    operation: &str,
    call: Fut,
) where
    Fut: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(op_timeout, call).await {
        Ok(Ok(_)) => backend.health.record_success(),
        Ok(Err(err)) => {
            backend.health.record_failure();
            warn!(
                "{operation} failed (backend={}, state={}, error={})",
                backend.adapter.name(),
                backend.health.state(),
                err
            );
        }
        Err(_) => {
            backend.health.record_failure();
            warn!(
                "{operation} timed out (backend={}, state={})",
                backend.adapter.name(),
                backend.health.state()
            );
        }
    }
}
