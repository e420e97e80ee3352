//! Core error types for Steward.

use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Invalid project path
    #[error("Invalid project path: {0}")]
    InvalidPath(String),
}
