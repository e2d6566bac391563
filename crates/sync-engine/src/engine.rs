// crates/sync-engine/src/engine.rs
//! The sync engine facade

use crate::catalog::CatalogSync;
use crate::error::{SyncError, SyncResult};
use crate::favorites::{FavoritesSync, UserLists};
use crate::preferences::PreferenceSync;
use crate::progress::ProgressListener;
use crate::secure_store::{SecureStorage, SqliteSecureStorage};
use crate::session::SessionProvider;
use crate::tunes::{AssetDownloader, TuneManager};
use crate::types::{SyncOutcome, TuneReport};
use hymnal_config::Config;
use hymnal_core::types::RECENT_LIMIT;
use hymnal_core::{PreferenceSet, UserId};
use hymnal_database::{
    close, connect, initialize_schema, optimize, verify_integrity, DatabaseConfig, DbPool,
};
use hymnal_network::{
    Client, ClientConfig, ConnectivityChecker, DownloadManager, NetworkMonitor, RetryPolicy,
};
use hymnal_remote::{HttpRemoteStore, RemoteStore};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Settings for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Where downloaded tunes are stored
    pub tune_dir: PathBuf,
    /// Maximum number of recently viewed hymns kept per user
    pub recent_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tune_dir: PathBuf::from("tunes"),
            recent_limit: RECENT_LIMIT,
        }
    }
}

impl SyncConfig {
    /// Derives engine settings from the application configuration
    pub fn from_config(config: &Config, data_dir: &Path) -> Self {
        Self {
            tune_dir: config.storage.tune_dir(data_dir),
            recent_limit: config.app.recent_limit,
        }
    }
}

/// The engine's collaborators
pub struct SyncServices {
    pub remote: Arc<dyn RemoteStore>,
    pub network: Arc<dyn NetworkMonitor>,
    pub session: Arc<dyn SessionProvider>,
    pub secure_storage: Arc<dyn SecureStorage>,
    pub downloader: Arc<dyn AssetDownloader>,
}

/// What the presentation layer needs when a session starts
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub user: Option<UserId>,
    pub preferences: PreferenceSet,
    pub lists: UserLists,
}

/// Offline-first hymnal sync engine
///
/// Wires catalog, preference, favorites and tune handling to one Local Store
/// and keeps the preference flags that gate syncing (`offlineDownload`,
/// `syncFavorites`) applied to the flows they control.
pub struct HymnalSync {
    pool: DbPool,
    session: Arc<dyn SessionProvider>,
    catalog: CatalogSync,
    preferences: PreferenceSync,
    favorites: FavoritesSync,
    tunes: TuneManager,
}

impl HymnalSync {
    /// Creates an engine over an initialized Local Store
    pub fn new(pool: DbPool, services: SyncServices, config: SyncConfig) -> Self {
        let SyncServices {
            remote,
            network,
            session,
            secure_storage,
            downloader,
        } = services;

        Self {
            catalog: CatalogSync::new(pool.clone(), remote.clone(), network.clone()),
            preferences: PreferenceSync::new(pool.clone(), remote.clone(), network.clone()),
            favorites: FavoritesSync::new(pool.clone(), secure_storage, remote, network.clone())
                .with_recent_limit(config.recent_limit),
            tunes: TuneManager::new(pool.clone(), downloader, network, config.tune_dir),
            session,
            pool,
        }
    }

    /// Opens the on-disk Local Store and HTTP backend described by `config`
    ///
    /// Secure entries are kept in the Local Store; hosts with a platform
    /// keystore should build [`SyncServices`] themselves and call
    /// [`new`](Self::new).
    pub async fn open(
        config: &Config,
        data_dir: &Path,
        session: Arc<dyn SessionProvider>,
    ) -> SyncResult<Self> {
        tokio::fs::create_dir_all(data_dir).await?;

        let db_path = config.storage.database_file(data_dir);
        let db_config = DatabaseConfig::new(db_path.to_string_lossy().to_string())
            .with_wal(config.storage.wal_enabled)
            .with_max_connections(config.storage.max_connections);
        let pool = connect(db_config).await?;
        initialize_schema(&pool).await?;

        let client = Client::with_config(ClientConfig {
            timeout: config.remote.timeout(),
            retry_policy: Some(
                RetryPolicy::new(config.remote.retry_attempts)
                    .with_initial_delay(Duration::from_millis(200)),
            ),
            api_key: config.remote.api_key.clone(),
            ..ClientConfig::default()
        })
        .map_err(|e| SyncError::Remote(e.into()))?;

        let services = SyncServices {
            remote: Arc::new(HttpRemoteStore::new(client.clone(), &config.remote.base_url)?),
            network: Arc::new(ConnectivityChecker::with_urls(
                client.clone(),
                config.remote.probe_urls.clone(),
            )),
            session,
            secure_storage: Arc::new(SqliteSecureStorage::new(pool.clone())),
            downloader: Arc::new(DownloadManager::new(client)),
        };

        log::info!("Opened hymnal store at {}", db_path.display());
        Ok(Self::new(pool, services, SyncConfig::from_config(config, data_dir)))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn catalog(&self) -> &CatalogSync {
        &self.catalog
    }

    pub fn preferences(&self) -> &PreferenceSync {
        &self.preferences
    }

    pub fn favorites(&self) -> &FavoritesSync {
        &self.favorites
    }

    pub fn tunes(&self) -> &TuneManager {
        &self.tunes
    }

    /// The signed-in user, or the anonymous identity
    fn user(&self) -> UserId {
        self.session.current_user().unwrap_or_else(UserId::anonymous)
    }

    fn apply_flags(&self, preferences: &PreferenceSet) {
        self.catalog.set_offline_download(preferences.offline_download);
        self.favorites.set_sync_enabled(preferences.sync_favorites);
    }

    /// Loads the current user's preferences and lists
    ///
    /// Preferences load first because `syncFavorites` decides whether the
    /// lists are reconciled with the cloud.
    pub async fn start_session(&self) -> SyncResult<SessionSnapshot> {
        let user = self.user();
        let preferences = self.preferences.load(&user).await?;
        self.apply_flags(&preferences);
        let lists = self.favorites.load(&user).await?;

        Ok(SessionSnapshot {
            user: (!user.is_anonymous()).then_some(user),
            preferences,
            lists,
        })
    }

    /// Runs an incremental catalog sync under the current preferences
    pub async fn sync_catalog(&self, listener: &dyn ProgressListener) -> SyncResult<SyncOutcome> {
        self.catalog.incremental_sync(listener).await
    }

    /// Sets a top-level preference for the current user
    pub async fn update_preference(&self, key: &str, value: Value) -> SyncResult<PreferenceSet> {
        let preferences = self.preferences.update(&self.user(), key, value).await?;
        self.apply_flags(&preferences);
        Ok(preferences)
    }

    /// Sets a nested preference for the current user
    pub async fn update_nested_preference(
        &self,
        parent: &str,
        child: &str,
        value: Value,
    ) -> SyncResult<PreferenceSet> {
        let preferences = self
            .preferences
            .update_nested(&self.user(), parent, child, value)
            .await?;
        self.apply_flags(&preferences);
        Ok(preferences)
    }

    pub async fn reset_preferences(&self) -> SyncResult<PreferenceSet> {
        let preferences = self.preferences.reset(&self.user()).await?;
        self.apply_flags(&preferences);
        Ok(preferences)
    }

    /// Pulls preferences from the cloud; needs a signed-in user
    pub async fn force_sync_preferences(&self) -> SyncResult<bool> {
        let user = self.session.current_user();
        let applied = self.preferences.force_sync_from_cloud(user.as_ref()).await?;
        if applied {
            self.apply_flags(&self.preferences.current().await);
        }
        Ok(applied)
    }

    pub async fn toggle_favorite(&self, hymn_id: &str) -> SyncResult<bool> {
        self.favorites.toggle(hymn_id).await
    }

    pub async fn record_view(&self, hymn_id: &str) -> SyncResult<()> {
        self.favorites.record_view(hymn_id).await.map(|_| ())
    }

    /// Downloads every hymn and every missing tune
    pub async fn download_everything(
        &self,
        listener: &dyn ProgressListener,
    ) -> SyncResult<(SyncOutcome, TuneReport)> {
        let outcome = self.catalog.force_full_sync(listener).await?;
        let tunes = self.tunes.download_all(listener).await?;
        Ok((outcome, tunes))
    }

    /// Forgets the signed-out user's in-memory state
    ///
    /// With `clear_local` their lists and preference row are deleted from
    /// this device as well. Cloud copies are never touched.
    pub async fn sign_out(&self, user: &UserId, clear_local: bool) -> SyncResult<()> {
        if clear_local {
            self.favorites.clear_user_data(user).await?;
            self.preferences.clear_local(user).await?;
        }
        self.favorites.unload().await;
        self.apply_flags(&PreferenceSet::default());
        log::info!("Signed out {}", user);
        Ok(())
    }

    /// Deletes cached hymns, downloaded tunes and the sync watermark
    pub async fn clear_offline_data(&self) -> SyncResult<u64> {
        self.tunes.clear_all().await?;
        self.catalog.clear_offline_data(self.tunes.tune_dir()).await
    }

    /// Checks the Local Store and drops tune paths whose file is gone
    ///
    /// Returns the number of tune paths cleared.
    pub async fn maintain(&self) -> SyncResult<usize> {
        verify_integrity(&self.pool).await?;
        let cleared = self.tunes.verify_downloads().await?;
        optimize(&self.pool).await?;
        Ok(cleared)
    }

    /// Closes the Local Store
    pub async fn close(self) {
        close(self.pool).await;
    }
}
