//! Error types for the ban subsystem.

use thiserror::Error;

/// Errors that can occur while managing ban records
#[derive(Debug, Error)]
pub enum BanError {
    /// Invalid state transition attempted on a ban record
    #[error("Invalid state transition")]
    InvalidStateTransition,

    /// Ban record not found
    #[error("Ban not found: {0}")]
    NotFound(String),

    /// Durable storage fault (I/O or serialization)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Legacy migration aborted
    #[error("Migration error: {0}")]
    Migration(String),

    /// Generic error
    #[error("Ban error: {0}")]
    Other(String),
}

impl From<std::io::Error> for BanError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_yaml::Error> for BanError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<String> for BanError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

/// Result type for ban operations
pub type BanResult<T> = Result<T, BanError>;
