//! Config file loading and invariant validation.

use crate::{ConfigError, MnemoConfig};
use log::{debug, info};
use std::fs;
use std::path::Path;

impl MnemoConfig {
    /// Load a config from a JSON5 file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Load a config from JSON5 contents.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: serde_json::Value = json5::from_str(contents)?;
        let config: MnemoConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidField {
                path: "embedding.dimension".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.embedding.max_input_chars == 0 {
            return Err(ConfigError::InvalidField {
                path: "embedding.max_input_chars".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.health.failure_threshold == 0 {
            return Err(ConfigError::InvalidField {
                path: "health.failure_threshold".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.timeouts.backend_op_ms == 0
            || self.timeouts.durable_write_ms == 0
            || self.timeouts.search_deadline_ms == 0
        {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.propagation.queue_capacity == 0 {
            return Err(ConfigError::InvalidField {
                path: "propagation.queue_capacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
