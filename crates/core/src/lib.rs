pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ErrorSeverity, Result};
pub use types::{
    FavoritesList, FontSize, HymnKey, HymnPatch, HymnRecord, PreferenceSet, RecentList, Refrain,
    RemoteId, Stanza, Theme, Timestamp, UserId, Validator,
};
