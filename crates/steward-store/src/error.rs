//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing record sets
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record set exists but cannot be decoded
    #[error("Corrupt record set at {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StoreError = io_err.into();
        let msg = err.to_string();
        assert!(msg.contains("IO error"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_error_display_corrupt() {
        let err = StoreError::Corrupt {
            path: PathBuf::from("/tmp/memory/abc.json"),
            reason: "expected value".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Corrupt record set"));
        assert!(msg.contains("abc.json"));
        assert!(msg.contains("expected value"));
    }
}
