//! Adapter registry and per-backend health tracking.
//!
//! The registry is an explicit value constructed at startup and shared by
//! reference; the only mutable state it carries is the per-adapter health
//! counters, updated with atomic operations and never while performing I/O.

use crate::adapter::{BackendAdapter, BackendKind};
use crate::error::MemoryError;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

const STATE_HEALTHY: u8 = 0;
const STATE_DEGRADED: u8 = 1;
const STATE_UNAVAILABLE: u8 = 2;

/// Liveness classification for one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Operating normally.
    Healthy,
    /// Recent failures below the unavailability threshold, or on probation
    /// after recovering from unavailable.
    Degraded,
    /// Excluded from fan-out until a background probe succeeds.
    Unavailable,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Atomic health counters for one adapter.
#[derive(Debug)]
pub struct BackendHealth {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    failure_threshold: u32,
}

impl BackendHealth {
    /// Create a healthy tracker with the given unavailability threshold.
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            state: AtomicU8::new(STATE_HEALTHY),
            consecutive_failures: AtomicU32::new(0),
            failure_threshold,
        }
    }

    /// Current health state.
    pub fn state(&self) -> HealthState {
        match self.state.load(Ordering::Acquire) {
            STATE_UNAVAILABLE => HealthState::Unavailable,
            STATE_DEGRADED => HealthState::Degraded,
            _ => HealthState::Healthy,
        }
    }

    /// Whether the adapter participates in fan-out (healthy or degraded).
    pub fn is_available(&self) -> bool {
        self.state() != HealthState::Unavailable
    }

    /// Record a successful call.
    ///
    /// Resets the failure counter; an unavailable adapter steps back to
    /// degraded for one probation cycle before returning to healthy, which
    /// prevents flapping.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(match current {
                    STATE_UNAVAILABLE => STATE_DEGRADED,
                    STATE_DEGRADED => STATE_HEALTHY,
                    other => other,
                })
            });
    }

    /// Record a failed or timed-out call.
    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        let next = if failures >= self.failure_threshold {
            STATE_UNAVAILABLE
        } else {
            STATE_DEGRADED
        };
        // Severity only escalates on failure; recovery goes through
        // record_success.
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.max(next))
            });
    }
}

/// One configured adapter plus its health tracker.
pub struct RegisteredBackend {
    /// The adapter implementation.
    pub adapter: Arc<dyn BackendAdapter>,
    /// Health counters for this adapter.
    pub health: BackendHealth,
}

/// Immutable adapter set resolved per capability, with health tracking.
pub struct BackendRegistry {
    backends: Vec<RegisteredBackend>,
    durable_index: usize,
    cache_index: Option<usize>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry").finish_non_exhaustive()
    }
}

impl BackendRegistry {
    /// Start building a registry.
    pub fn builder() -> BackendRegistryBuilder {
        BackendRegistryBuilder::default()
    }

    /// All configured backends.
    pub fn backends(&self) -> &[RegisteredBackend] {
        &self.backends
    }

    /// The mandatory durable backend.
    pub fn durable(&self) -> &RegisteredBackend {
        &self.backends[self.durable_index]
    }

    /// The optional cache backend.
    pub fn cache(&self) -> Option<&RegisteredBackend> {
        self.cache_index.map(|index| &self.backends[index])
    }

    /// Every configured vector backend regardless of health.
    pub fn vector_backends(&self) -> Vec<&RegisteredBackend> {
        self.backends
            .iter()
            .filter(|backend| backend.adapter.kind() == BackendKind::Vector)
            .collect()
    }

    /// Vector backends currently eligible for fan-out.
    pub fn available_vector_backends(&self) -> Vec<&RegisteredBackend> {
        self.vector_backends()
            .into_iter()
            .filter(|backend| backend.health.is_available())
            .collect()
    }

    /// Verify every vector backend agrees with the embedder dimension.
    ///
    /// Mismatched dimensions are a startup configuration error, never a
    /// call-time failure.
    pub fn validate_embedding_dimension(&self, expected: usize) -> Result<(), MemoryError> {
        for backend in &self.backends {
            if let Some(dimension) = backend.adapter.embedding_dimension()
                && dimension != expected
            {
                return Err(MemoryError::Configuration(format!(
                    "backend {} expects dimension {dimension}, embedder produces {expected}",
                    backend.adapter.name()
                )));
            }
        }
        Ok(())
    }

    /// Probe every non-healthy backend once, recording the outcome.
    pub async fn probe_unavailable(&self) {
        for backend in &self.backends {
            let previous = backend.health.state();
            if previous == HealthState::Healthy {
                continue;
            }
            match backend.adapter.probe().await {
                Ok(()) => {
                    backend.health.record_success();
                    info!(
                        "backend probe succeeded (backend={}, previous_state={}, state={})",
                        backend.adapter.name(),
                        previous,
                        backend.health.state()
                    );
                }
                Err(err) => {
                    backend.health.record_failure();
                    debug!(
                        "backend probe failed (backend={}, error={})",
                        backend.adapter.name(),
                        err
                    );
                }
            }
        }
    }
}

/// Builder assembling the startup adapter set.
#[derive(Default)]
pub struct BackendRegistryBuilder {
    adapters: Vec<Arc<dyn BackendAdapter>>,
    failure_threshold: Option<u32>,
}

impl BackendRegistryBuilder {
    /// Register an adapter.
    pub fn with_backend(mut self, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Override the consecutive-failure threshold (default 3).
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Validate the adapter set and build the registry.
    ///
    /// Exactly one durable backend is required; at most one cache backend is
    /// allowed; vector backends may be configured redundantly.
    pub fn build(self) -> Result<BackendRegistry, MemoryError> {
        let threshold = self.failure_threshold.unwrap_or(3);
        let mut durable_index = None;
        let mut cache_index = None;

        let mut backends = Vec::with_capacity(self.adapters.len());
        for (index, adapter) in self.adapters.into_iter().enumerate() {
            match adapter.kind() {
                BackendKind::Durable => {
                    if durable_index.is_some() {
                        return Err(MemoryError::Configuration(
                            "multiple durable backends configured".to_string(),
                        ));
                    }
                    durable_index = Some(index);
                }
                BackendKind::Cache => {
                    if cache_index.is_some() {
                        return Err(MemoryError::Configuration(
                            "multiple cache backends configured".to_string(),
                        ));
                    }
                    cache_index = Some(index);
                }
                BackendKind::Vector => {}
            }
            backends.push(RegisteredBackend {
                adapter,
                health: BackendHealth::new(threshold),
            });
        }

        let Some(durable_index) = durable_index else {
            return Err(MemoryError::Configuration(
                "a durable backend is required".to_string(),
            ));
        };
        if backends
            .iter()
            .all(|backend| backend.adapter.kind() != BackendKind::Vector)
        {
            warn!("no vector backend configured; similarity search will fall back to scans");
        }
        info!("backend registry built (backends={})", backends.len());
        Ok(BackendRegistry {
            backends,
            durable_index,
            cache_index,
        })
    }
}
