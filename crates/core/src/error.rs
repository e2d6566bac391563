//! Error types and recovery strategies for the hymnal subsystem
//!
//! Errors are classified into three severity tiers:
//! - **Recoverable**: can be retried automatically (a locked or busy database)
//! - **Degraded**: a feature is unavailable but the app continues (bad content, missing record)
//! - **Fatal**: requires user intervention (corrupted database, disk full)
//!
//! Each error carries a user-facing message so the presentation layer never
//! has to show SQL or file system details.

use std::fmt;
use std::io;
use thiserror::Error;

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// Feature degraded but app can continue
    Degraded,
    /// Critical error requiring user action
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type shared by the storage and domain layers
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Database Errors =====
    /// Database operation failed
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database is corrupted and needs repair
    #[error("Database corrupted: {details}")]
    DatabaseCorrupted { details: String },

    /// Database migration failed
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    /// Record not found in database
    #[error("Record not found: {entity} with {identifier}")]
    RecordNotFound { entity: String, identifier: String },

    // ===== File System Errors =====
    /// General I/O error
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: io::Error,
    },

    // ===== Domain Errors =====
    /// A hymn record failed validation
    #[error("Invalid hymn {identifier}: {reasons:?}")]
    InvalidHymn {
        identifier: String,
        reasons: Vec<String>,
    },

    /// A preference key or value was rejected
    #[error("Invalid preference: {key} - {reason}")]
    InvalidPreference { key: String, reason: String },

    // ===== Generic Errors =====
    /// Generic internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DatabaseError { .. } => ErrorSeverity::Recoverable,

            Self::RecordNotFound { .. }
            | Self::InvalidHymn { .. }
            | Self::InvalidPreference { .. }
            | Self::IoError { .. }
            | Self::InternalError { .. } => ErrorSeverity::Degraded,

            Self::DatabaseCorrupted { .. } | Self::MigrationFailed { .. } => ErrorSeverity::Fatal,
        }
    }

    /// Returns a user-friendly error message suitable for display in the UI
    pub fn user_message(&self) -> String {
        match self {
            Self::DatabaseError { .. } => {
                "Hymn storage is temporarily unavailable. Please try again.".to_string()
            }
            Self::DatabaseCorrupted { .. } | Self::MigrationFailed { .. } => {
                "Offline hymn storage is damaged. Clear offline data and download again."
                    .to_string()
            }
            Self::RecordNotFound { .. } => {
                "This hymn is not available offline.".to_string()
            }
            Self::IoError { .. } => "A file operation failed. Please try again.".to_string(),
            Self::InvalidHymn { .. } => "This hymn's content is incomplete.".to_string(),
            Self::InvalidPreference { key, .. } => {
                format!("The setting '{}' could not be changed.", key)
            }
            Self::InternalError { .. } => {
                "An unexpected error occurred. Please try again.".to_string()
            }
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Helper to create a database error from any error type
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a not-found error for a hymn identifier
    pub fn hymn_not_found(identifier: impl fmt::Display) -> Self {
        Self::RecordNotFound {
            entity: "Hymn".to_string(),
            identifier: identifier.to_string(),
        }
    }

    /// Returns true if this error reports a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        Self::IoError {
            message: err.to_string(),
            source: err,
        }
    }
}
