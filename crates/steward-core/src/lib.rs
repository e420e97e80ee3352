//! Steward Core Components
//!
//! This crate provides the daemon-side plumbing around the engine:
//! configuration, the project registry and request metrics.

mod config;
mod error;
mod metrics;
mod project_manager;

pub use config::{InferenceConfig, StewardConfig};
pub use error::CoreError;
pub use metrics::Metrics;
pub use project_manager::{ProjectManager, Resolved};
