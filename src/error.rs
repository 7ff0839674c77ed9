//! Error types for the Limitd service.

use thiserror::Error;

/// Main error type for Limitd operations.
///
/// Validation and not-found failures are distinct variants so transport
/// adapters can map them to status codes structurally instead of comparing
/// error values.
#[derive(Error, Debug)]
pub enum LimitdError {
    /// The caller-supplied key is empty or whitespace-only
    #[error("input key is invalid: must be non-empty")]
    InvalidKey,

    /// The caller-supplied limit is zero or negative
    #[error("input limit is invalid: must be greater than zero")]
    InvalidLimit,

    /// The caller-supplied window is zero
    #[error("input window is invalid: must be greater than zero")]
    InvalidWindow,

    /// The caller-supplied cost is zero or negative
    #[error("input cost is invalid: must be greater than zero")]
    InvalidCost,

    /// Reset targeted a key with no stored state
    #[error("key not found")]
    KeyNotFound,

    /// Redis driver errors (connection, protocol, malformed stored values)
    #[error("storage error: {0}")]
    Storage(#[from] redis::RedisError),

    /// Backend failures not covered by the driver error type
    #[error("backend error: {0}")]
    Backend(String),

    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(String),

    /// gRPC server errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LimitdError {
    /// Whether this error was raised by argument validation, before any
    /// storage access.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LimitdError::InvalidKey
                | LimitdError::InvalidLimit
                | LimitdError::InvalidWindow
                | LimitdError::InvalidCost
        )
    }
}

/// Result type alias for Limitd operations.
pub type Result<T> = std::result::Result<T, LimitdError>;
