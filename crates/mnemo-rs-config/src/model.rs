//! Configuration schema for the memory subsystem.

use serde::{Deserialize, Serialize};

/// Root config for the mnemo memory subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MnemoConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub durable: DurableConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
}

impl MnemoConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MnemoConfigBuilder {
        MnemoConfigBuilder::new()
    }
}

/// Builder for assembling a `MnemoConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MnemoConfigBuilder {
    config: MnemoConfig,
}

impl MnemoConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: MnemoConfig::default(),
        }
    }

    /// Replace the embedding configuration.
    pub fn embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.config.embedding = embedding;
        self
    }

    /// Replace the durable store configuration.
    pub fn durable(mut self, durable: DurableConfig) -> Self {
        self.config.durable = durable;
        self
    }

    /// Replace the cache store configuration.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Replace the health tracking configuration.
    pub fn health(mut self, health: HealthConfig) -> Self {
        self.config.health = health;
        self
    }

    /// Replace the timeout configuration.
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    /// Replace the propagation queue configuration.
    pub fn propagation(mut self, propagation: PropagationConfig) -> Self {
        self.config.propagation = propagation;
        self
    }

    /// Finalize and return the built `MnemoConfig`.
    pub fn build(self) -> MnemoConfig {
        self.config
    }
}

/// Embedding generation configuration shared by every vector adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Fixed output dimension for every embedding.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// Maximum input length in characters; longer text is truncated.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_embedding_dimension(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

/// Default embedding dimension.
fn default_embedding_dimension() -> usize {
    384
}

/// Default maximum embeddable input length in characters.
fn default_max_input_chars() -> usize {
    8192
}

/// Durable store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DurableConfig {
    /// Database file path; an in-memory database is used when absent.
    #[serde(default)]
    pub path: Option<String>,
}

/// Cache store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default TTL in seconds applied when the caller supplies none.
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Default cache entry TTL in seconds (24 hours).
fn default_cache_ttl_secs() -> u64 {
    86_400
}

/// Backend health tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failures before a backend is marked unavailable.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Interval between background probes of unavailable backends.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

/// Default consecutive-failure threshold.
fn default_failure_threshold() -> u32 {
    3
}

/// Default probe interval in seconds.
fn default_probe_interval_secs() -> u64 {
    30
}

/// Per-operation timeout configuration in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for a single read call against any backend.
    #[serde(default = "default_backend_op_ms")]
    pub backend_op_ms: u64,
    /// Hard timeout for the synchronous durable write in store/delete.
    #[serde(default = "default_durable_write_ms")]
    pub durable_write_ms: u64,
    /// Default overall deadline for a search call.
    #[serde(default = "default_search_deadline_ms")]
    pub search_deadline_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            backend_op_ms: default_backend_op_ms(),
            durable_write_ms: default_durable_write_ms(),
            search_deadline_ms: default_search_deadline_ms(),
        }
    }
}

/// Default per-backend read timeout in milliseconds.
fn default_backend_op_ms() -> u64 {
    500
}

/// Default durable write timeout in milliseconds.
fn default_durable_write_ms() -> u64 {
    2_000
}

/// Default search deadline in milliseconds.
fn default_search_deadline_ms() -> u64 {
    2_000
}

/// Propagation queue configuration for fire-and-forget side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Bounded capacity of the propagation job queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Default propagation queue capacity.
fn default_queue_capacity() -> usize {
    256
}
