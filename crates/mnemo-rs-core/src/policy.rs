//! Config-to-runtime policy translation for the coordinator.

use mnemo_rs_config::MnemoConfig;
use std::time::Duration;

/// Resolved timing and capacity limits applied by the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorPolicy {
    /// Timeout for a single read call against any backend.
    pub backend_op_timeout: Duration,
    /// Hard timeout for the synchronous durable write in store/delete.
    pub durable_write_timeout: Duration,
    /// Default overall deadline for a search call.
    pub search_deadline: Duration,
    /// Interval between background probes of non-healthy backends.
    pub probe_interval: Duration,
    /// TTL applied to cache entries when the caller supplies none.
    pub cache_default_ttl: Duration,
    /// Bounded capacity of the propagation job queue.
    pub queue_capacity: usize,
}

impl CoordinatorPolicy {
    /// Translate config into runtime policy.
    pub fn from_config(config: &MnemoConfig) -> Self {
        Self {
            backend_op_timeout: Duration::from_millis(config.timeouts.backend_op_ms),
            durable_write_timeout: Duration::from_millis(config.timeouts.durable_write_ms),
            search_deadline: Duration::from_millis(config.timeouts.search_deadline_ms),
            probe_interval: Duration::from_secs(config.health.probe_interval_secs),
            cache_default_ttl: Duration::from_secs(config.cache.default_ttl_secs),
            queue_capacity: config.propagation.queue_capacity,
        }
    }
}

impl Default for CoordinatorPolicy {
    /// Policy derived from default config values.
    fn default() -> Self {
        Self::from_config(&MnemoConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::CoordinatorPolicy;
    use mnemo_rs_config::MnemoConfig;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn policy_mirrors_config_values() {
        let config = MnemoConfig::load_from_str(
            r#"{
                timeouts: { backend_op_ms: 100, durable_write_ms: 400, search_deadline_ms: 900 },
                health: { probe_interval_secs: 5 },
                cache: { default_ttl_secs: 120 },
                propagation: { queue_capacity: 8 },
            }"#,
        )
        .expect("load");

        let policy = CoordinatorPolicy::from_config(&config);
        assert_eq!(policy.backend_op_timeout, Duration::from_millis(100));
        assert_eq!(policy.durable_write_timeout, Duration::from_millis(400));
        assert_eq!(policy.search_deadline, Duration::from_millis(900));
        assert_eq!(policy.probe_interval, Duration::from_secs(5));
        assert_eq!(policy.cache_default_ttl, Duration::from_secs(120));
        assert_eq!(policy.queue_capacity, 8);
    }
}
