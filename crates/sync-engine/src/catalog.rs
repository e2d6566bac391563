// crates/sync-engine/src/catalog.rs
//! Hymn catalog sync
//!
//! The Local Store mirrors the Remote Store's catalog. Incremental syncs
//! request only records with `updatedAt` after a watermark and apply them in
//! one transaction; the watermark moves only after that transaction commits.
//! Records that fail validation are logged and left out of the batch.
//!
//! ```text
//! Idle -> CheckingWatermark -> FetchingRemoteDelta -> ApplyingLocal -> Done
//!                                      |                    |
//!                                      +------> Failed <----+
//! ```

use crate::progress::{report, ProgressListener};
use crate::types::{CatalogView, Progress, SkipReason, SyncOutcome, SyncPhase};
use crate::{SyncError, SyncResult};
use hymnal_core::{HymnKey, HymnPatch, HymnRecord, RemoteId, Timestamp, Validator};
use hymnal_database::queries::{
    clear_last_sync_time, delete_all_hymns, find_hymn, get_all_hymns, get_downloaded_audio_count,
    get_hymn_count, get_last_sync_time, max_updated_at, set_last_sync_time, upsert_hymn,
    upsert_hymns_batch,
};
use hymnal_database::search::{search_hymns, SearchResult};
use hymnal_database::DbPool;
use hymnal_network::NetworkMonitor;
use hymnal_remote::RemoteStore;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

const OFFLINE_EMPTY_NOTICE: &str =
    "Connect to the internet to download hymns for offline use.";

/// Keeps the local hymn catalog in step with the Remote Store
pub struct CatalogSync {
    pool: DbPool,
    remote: Arc<dyn RemoteStore>,
    network: Arc<dyn NetworkMonitor>,
    offline_download: AtomicBool,
    phase: watch::Sender<SyncPhase>,
}

impl CatalogSync {
    pub fn new(
        pool: DbPool,
        remote: Arc<dyn RemoteStore>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            pool,
            remote,
            network,
            offline_download: AtomicBool::new(false),
            phase,
        }
    }

    /// Mirrors the user's `offlineDownload` preference
    pub fn set_offline_download(&self, enabled: bool) {
        self.offline_download.store(enabled, Ordering::SeqCst);
    }

    pub fn offline_download(&self) -> bool {
        self.offline_download.load(Ordering::SeqCst)
    }

    /// Phase of the most recent sync attempt
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Watches phase changes
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: SyncPhase) {
        log::debug!("Catalog sync: {}", phase);
        self.phase.send_replace(phase);
    }

    /// Returns hymns for display
    ///
    /// Any cached hymns are returned as-is. With an empty cache: offline
    /// yields an empty view with a notice; online with offline download
    /// enabled yields an empty view (a sync will fill it); online otherwise
    /// fetches the catalog for display without storing it.
    pub async fn load_hymns(&self) -> SyncResult<CatalogView> {
        let local = get_all_hymns(&self.pool).await?;
        if !local.is_empty() {
            return Ok(CatalogView::local(local));
        }

        if !self.network.is_online().await {
            return Ok(CatalogView::empty(Some(OFFLINE_EMPTY_NOTICE.to_string())));
        }

        if self.offline_download() {
            return Ok(CatalogView::empty(None));
        }

        match self.remote.list_hymns().await {
            Ok(hymns) => Ok(CatalogView::remote(hymns)),
            Err(e) => {
                log::warn!("Could not fetch hymns for display: {}", e);
                Ok(CatalogView::empty(Some(
                    "Hymns could not be loaded. Please try again later.".to_string(),
                )))
            }
        }
    }

    /// Looks up one hymn, falling back to the Remote Store when it is not
    /// cached and the device is online
    pub async fn get_hymn(&self, key: &HymnKey) -> SyncResult<HymnRecord> {
        if let Some(hymn) = find_hymn(&self.pool, key).await? {
            return Ok(hymn);
        }

        if !self.network.is_online().await {
            return Err(SyncError::not_found(key));
        }

        let remote = match key {
            HymnKey::Remote(id) => self.remote.get_hymn(id).await?,
            HymnKey::Number(n) => self.remote.find_hymn_by_number(*n).await?,
        };
        remote.ok_or_else(|| SyncError::not_found(key))
    }

    /// Full-text search over the cached catalog
    pub async fn search(&self, query: &str, limit: i64) -> SyncResult<Vec<SearchResult<HymnRecord>>> {
        Ok(search_hymns(&self.pool, query, limit).await?)
    }

    pub async fn hymn_count(&self) -> SyncResult<i64> {
        Ok(get_hymn_count(&self.pool).await?)
    }

    pub async fn downloaded_audio_count(&self) -> SyncResult<i64> {
        Ok(get_downloaded_audio_count(&self.pool).await?)
    }

    pub async fn last_sync_time(&self) -> SyncResult<Option<Timestamp>> {
        Ok(get_last_sync_time(&self.pool).await?)
    }

    /// The point to sync from: the later of the watermark and the newest
    /// local record, or the epoch when neither exists
    pub async fn sync_from(&self) -> SyncResult<Timestamp> {
        let watermark = get_last_sync_time(&self.pool).await?;
        let newest_local = max_updated_at(&self.pool).await?;

        let from = match (watermark, newest_local) {
            (Some(w), Some(n)) => w.later_of(n),
            (Some(t), None) | (None, Some(t)) => t,
            (None, None) => Timestamp::epoch(),
        };
        Ok(from)
    }

    /// Applies remote changes since the last sync
    ///
    /// Skipped without error when offline or when offline download is off.
    pub async fn incremental_sync(
        &self,
        listener: &dyn ProgressListener,
    ) -> SyncResult<SyncOutcome> {
        if !self.network.is_online().await {
            log::info!("Skipping catalog sync: offline");
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }
        if !self.offline_download() {
            log::debug!("Skipping catalog sync: offline download disabled");
            return Ok(SyncOutcome::Skipped(SkipReason::OfflineDownloadDisabled));
        }

        let started = Timestamp::now();
        self.enter(SyncPhase::CheckingWatermark);
        let previous = match get_last_sync_time(&self.pool).await {
            Ok(previous) => previous,
            Err(e) => return Err(self.fail(e.into())),
        };
        let from = match self.sync_from().await {
            Ok(from) => from,
            Err(e) => return Err(self.fail(e)),
        };

        self.enter(SyncPhase::FetchingRemoteDelta);
        let delta = match self.remote.list_hymns_updated_since(from).await {
            Ok(delta) => delta,
            Err(e) => return Err(self.fail(e.into())),
        };

        // Never move the watermark backwards
        let watermark = previous.map_or(started, |p| started.later_of(p));

        if delta.is_empty() {
            log::info!("Hymn catalog up to date since {}", from);
            if let Err(e) = set_last_sync_time(&self.pool, watermark).await {
                return Err(self.fail(e.into()));
            }
            self.enter(SyncPhase::Done);
            return Ok(SyncOutcome::UpToDate { watermark });
        }

        let (count, rejected) = self.apply(delta, listener).await?;
        if let Err(e) = set_last_sync_time(&self.pool, watermark).await {
            return Err(self.fail(e.into()));
        }

        self.enter(SyncPhase::Done);
        log::info!("Applied {} hymn updates since {}", count, from);
        Ok(SyncOutcome::Applied {
            count,
            rejected,
            watermark,
        })
    }

    /// Discards the watermark and reapplies the entire remote catalog
    pub async fn force_full_sync(&self, listener: &dyn ProgressListener) -> SyncResult<SyncOutcome> {
        if !self.network.is_online().await {
            return Err(SyncError::offline("download hymns"));
        }

        let started = Timestamp::now();
        self.enter(SyncPhase::CheckingWatermark);
        if let Err(e) = clear_last_sync_time(&self.pool).await {
            return Err(self.fail(e.into()));
        }

        self.enter(SyncPhase::FetchingRemoteDelta);
        let hymns = match self.remote.list_hymns().await {
            Ok(hymns) => hymns,
            Err(e) => return Err(self.fail(e.into())),
        };
        report(
            listener,
            Progress::new(0, hymns.len(), format!("Fetched {} hymns", hymns.len())),
        );

        let (count, rejected) = self.apply(hymns, listener).await?;
        if let Err(e) = set_last_sync_time(&self.pool, started).await {
            return Err(self.fail(e.into()));
        }

        self.enter(SyncPhase::Done);
        log::info!("Full hymn sync applied {} records", count);
        Ok(SyncOutcome::Applied {
            count,
            rejected,
            watermark: started,
        })
    }

    /// Applies the valid records in one transaction
    ///
    /// Returns the applied count and the ids of records that failed
    /// validation. Only storage errors roll the batch back.
    async fn apply(
        &self,
        hymns: Vec<HymnRecord>,
        listener: &dyn ProgressListener,
    ) -> SyncResult<(usize, Vec<RemoteId>)> {
        self.enter(SyncPhase::ApplyingLocal);

        let (valid, invalid): (Vec<_>, Vec<_>) =
            hymns.into_iter().partition(|hymn| match hymn.validate() {
                Ok(()) => true,
                Err(reasons) => {
                    log::warn!("Skipping invalid hymn {}: {:?}", hymn.remote_id, reasons);
                    false
                }
            });
        let rejected = invalid.into_iter().map(|hymn| hymn.remote_id).collect();
        let total = valid.len();

        let count = upsert_hymns_batch(&self.pool, &valid, |applied, hymn| {
            report(listener, Progress::new(applied, total, hymn.title.clone()));
        })
        .await
        .map_err(|e| self.fail(e.into()))?;

        Ok((count, rejected))
    }

    fn fail(&self, err: SyncError) -> SyncError {
        err.log("Catalog sync failed");
        self.enter(SyncPhase::Failed);
        err
    }

    /// Edits a hymn on the Remote Store, then mirrors the result locally
    ///
    /// Rejected up front when offline; nothing is written locally unless the
    /// remote update succeeds.
    pub async fn edit_hymn(&self, key: &HymnKey, patch: &HymnPatch) -> SyncResult<HymnRecord> {
        if !self.network.is_online().await {
            return Err(SyncError::offline("edit hymns"));
        }

        let id = self.resolve_remote_id(key).await?;
        let updated = match self.remote.update_hymn(&id, patch).await {
            Ok(updated) => updated,
            Err(e) if e.is_not_found() => return Err(SyncError::not_found(key)),
            Err(e) => return Err(e.into()),
        };

        upsert_hymn(&self.pool, &updated).await?;
        log::info!("Edited hymn {} ({})", updated.number, updated.remote_id);

        // Re-read so the cached tune path is part of the result
        Ok(find_hymn(&self.pool, &HymnKey::Remote(id))
            .await?
            .unwrap_or(updated))
    }

    async fn resolve_remote_id(&self, key: &HymnKey) -> SyncResult<RemoteId> {
        match key {
            HymnKey::Remote(id) => Ok(id.clone()),
            HymnKey::Number(n) => {
                if let Some(hymn) = find_hymn(&self.pool, key).await? {
                    return Ok(hymn.remote_id);
                }
                self.remote
                    .find_hymn_by_number(*n)
                    .await?
                    .map(|h| h.remote_id)
                    .ok_or_else(|| SyncError::not_found(key))
            }
        }
    }

    /// Deletes every cached hymn and downloaded tune and forgets the watermark
    pub async fn clear_offline_data(&self, tune_dir: &Path) -> SyncResult<u64> {
        let removed = delete_all_hymns(&self.pool, tune_dir).await?;
        clear_last_sync_time(&self.pool).await?;
        self.enter(SyncPhase::Idle);
        log::info!("Cleared {} offline hymns", removed);
        Ok(removed)
    }
}
