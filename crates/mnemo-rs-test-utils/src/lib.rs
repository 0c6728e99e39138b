//! Test helpers shared across mnemo crates.

pub mod adapter;
pub mod embedder;

pub use adapter::{FailingBackend, SlowBackend};
pub use embedder::FailingEmbedder;
