//! Configuration schema and loading for the mnemo memory subsystem.

pub mod error;
pub mod loader;
pub mod model;

/// Config error type.
pub use error::ConfigError;
/// Config schema and builder.
pub use model::{
    CacheConfig, DurableConfig, EmbeddingConfig, HealthConfig, MnemoConfig, MnemoConfigBuilder,
    PropagationConfig, TimeoutConfig,
};
