// crates/sync-engine/src/error.rs
//! Error types for sync operations

use hymnal_core::{AppError, ErrorSeverity};
use hymnal_network::NetworkError;
use hymnal_remote::RemoteError;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the sync engine
///
/// Degraded-mode failures (cloud mirror unreachable, one tune failing to
/// download) are absorbed inside the engine and never appear here.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The operation needs the network and the device is offline
    #[error("Cannot {operation} while offline")]
    Offline { operation: String },

    /// The operation needs a signed-in user
    #[error("Sign in required to {operation}")]
    NotSignedIn { operation: String },

    /// The hymn exists in neither store
    #[error("Hymn not found: {identifier}")]
    NotFound { identifier: String },

    /// Local Store failure; any batch in progress was rolled back
    #[error("Storage error: {0}")]
    Storage(AppError),

    /// Remote Store failure on an operation that needs the cloud
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// A tune download failed
    #[error("Download failed: {0}")]
    Download(#[from] NetworkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A preference key or value was rejected
    #[error("Invalid preference {key}: {reason}")]
    InvalidPreference { key: String, reason: String },
}

impl SyncError {
    pub fn offline(operation: impl Into<String>) -> Self {
        Self::Offline {
            operation: operation.into(),
        }
    }

    pub fn not_signed_in(operation: impl Into<String>) -> Self {
        Self::NotSignedIn {
            operation: operation.into(),
        }
    }

    pub fn not_found(identifier: impl std::fmt::Display) -> Self {
        Self::NotFound {
            identifier: identifier.to_string(),
        }
    }

    /// True for policy rejections caused by missing connectivity
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// How badly the failure affects the app
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Storage(e) => e.severity(),
            Self::Remote(e) if e.is_transient() => ErrorSeverity::Recoverable,
            Self::Download(e) if e.is_retryable() => ErrorSeverity::Recoverable,
            _ => ErrorSeverity::Degraded,
        }
    }

    /// Logs the failure at the level its severity calls for
    pub(crate) fn log(&self, context: &str) {
        match self.severity() {
            ErrorSeverity::Fatal => log::error!("{}: {}", context, self),
            ErrorSeverity::Degraded => log::warn!("{}: {}", context, self),
            ErrorSeverity::Recoverable => log::info!("{}: {}", context, self),
        }
    }

    /// Text suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            Self::Offline { operation } => format!("Connect to the internet to {}.", operation),
            Self::NotSignedIn { operation } => format!("Sign in to {}.", operation),
            Self::NotFound { .. } => "This hymn is not available offline.".to_string(),
            Self::Storage(e) => e.user_message(),
            Self::Remote(e) if e.is_transient() => {
                "The hymn server is not responding. Please try again later.".to_string()
            }
            Self::Remote(_) => "The hymn server rejected the request.".to_string(),
            Self::Download(_) => "The tune could not be downloaded.".to_string(),
            Self::Io(_) => "A file operation failed. Please try again.".to_string(),
            Self::InvalidPreference { key, .. } => {
                format!("The setting '{}' could not be changed.", key)
            }
        }
    }
}

impl From<AppError> for SyncError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::RecordNotFound { identifier, .. } => Self::NotFound { identifier },
            AppError::InvalidPreference { key, reason } => Self::InvalidPreference { key, reason },
            other => Self::Storage(other),
        }
    }
}
