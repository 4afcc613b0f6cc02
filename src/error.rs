//! Error types for the feed layer.

use crate::types::RowId;
use thiserror::Error;

/// Main error type for feed operations.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Malformed or out-of-range pagination or input arguments.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An opaque cursor failed to decode.
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// The backing data source could not serve the request.
    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    /// A subscription predicate failed while evaluating a payload.
    #[error("Predicate error: {0}")]
    PredicateError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Checksum mismatch for row {row}: expected {expected}, got {got}")]
    ChecksumMismatch { row: RowId, expected: u32, got: u32 },

    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    #[error("Table is locked by another process")]
    Locked,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedError {
    /// Whether the error was caused by the request itself rather than the
    /// infrastructure behind it.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FeedError::InvalidArgument(_)
                | FeedError::InvalidCursor(_)
                | FeedError::NotFound(_)
                | FeedError::Forbidden(_)
                | FeedError::Unauthenticated
        )
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for FeedError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        FeedError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for FeedError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        FeedError::Deserialization(e.to_string())
    }
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
