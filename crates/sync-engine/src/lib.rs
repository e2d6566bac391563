// crates/sync-engine/src/lib.rs
//! Offline-first sync engine for the hymnal
//!
//! Reconciles three kinds of data between the on-device Local Store and the
//! cloud Remote Store:
//! - The hymn catalog: watermark-based incremental sync and full resync
//! - Per-user preferences: cloud wins at session start, device wins on edit
//! - Favorites and recently viewed hymns: a bootstrap rule, no merging
//!
//! Tunes are downloaded for offline playback by [`TuneManager`].
//!
//! # Example
//!
//! ```no_run
//! use hymnal_config::ConfigManager;
//! use hymnal_sync_engine::{HymnalSync, SessionState, SilentProgress};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::new()?;
//! let config = manager.load_or_default();
//! let session = SessionState::new();
//!
//! let sync = HymnalSync::open(&config, &manager.data_dir(&config), Arc::new(session)).await?;
//! let snapshot = sync.start_session().await?;
//! if snapshot.preferences.offline_download {
//!     sync.sync_catalog(&SilentProgress).await?;
//! }
//! let view = sync.catalog().load_hymns().await?;
//! println!("{} hymns", view.hymns.len());
//! # Ok(())
//! # }
//! ```

mod catalog;
mod engine;
mod error;
mod favorites;
mod preferences;
mod progress;
mod secure_store;
mod session;
mod tunes;
mod types;

pub use catalog::CatalogSync;
pub use engine::{HymnalSync, SessionSnapshot, SyncConfig, SyncServices};
pub use error::{SyncError, SyncResult};
pub use favorites::{FavoritesSync, UserLists};
pub use preferences::PreferenceSync;
pub use progress::{ListenerError, ProgressListener, SilentProgress};
pub use secure_store::{MemorySecureStorage, SecureStorage, SqliteSecureStorage};
pub use session::{SessionProvider, SessionState};
pub use tunes::{tune_file_name, AssetDownloader, TuneManager};
pub use types::{
    CatalogSource, CatalogView, Progress, SkipReason, SyncOutcome, SyncPhase, TuneReport,
};
