//! Errors from the Remote Store

use hymnal_network::NetworkError;
use thiserror::Error;

/// Result type for Remote Store operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors from Remote Store operations
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The addressed record does not exist remotely
    #[error("Not found: {0}")]
    NotFound(String),

    /// The store answered with something that is not the expected shape
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The store refused the write
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The store could not be reached or is not serving requests
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// Returns true if retrying later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Network(e) => e.is_retryable(),
            RemoteError::Unavailable(_) => true,
            _ => false,
        }
    }

    /// Returns true if the store reported the record as missing
    pub fn is_not_found(&self) -> bool {
        match self {
            RemoteError::NotFound(_) => true,
            RemoteError::Network(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::InvalidDocument(err.to_string())
    }
}
