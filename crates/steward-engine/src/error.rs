//! Engine error types.

use steward_store::StoreError;
use thiserror::Error;

/// Errors surfaced by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced memory, task or checkpoint does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation needs prior state that does not exist
    #[error("State error: {0}")]
    State(String),

    /// Record set could not be written
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }
}
