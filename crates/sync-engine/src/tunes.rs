// crates/sync-engine/src/tunes.rs
//! Tune (audio) downloads for offline playback
//!
//! Downloads run one at a time. Each finished file is recorded against its
//! hymn right away, so an interrupted batch keeps whatever completed. One
//! failed tune is logged and skipped; it never stops the batch.

use crate::progress::{report, ProgressListener};
use crate::types::{Progress, TuneReport};
use crate::{SyncError, SyncResult};
use async_trait::async_trait;
use hymnal_core::HymnRecord;
use hymnal_database::queries::{clear_all_local_audio_paths, get_all_hymns, set_local_audio_path};
use hymnal_database::DbPool;
use hymnal_network::{DownloadManager, NetworkMonitor};
use reqwest::Url;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_EXTENSION: &str = "mp3";

/// Fetches a remote asset into a local file
#[async_trait]
pub trait AssetDownloader: Send + Sync {
    /// Downloads `url` to `destination`, returning the byte count
    ///
    /// `destination` must not be left holding a partial file on failure.
    async fn download(&self, url: &str, destination: &Path) -> SyncResult<u64>;
}

#[async_trait]
impl AssetDownloader for DownloadManager {
    async fn download(&self, url: &str, destination: &Path) -> SyncResult<u64> {
        Ok(self.download_file_atomic(url, destination).await?)
    }
}

/// File name for a hymn's tune: `hymn_{number}.{ext}`, the extension taken
/// from the URL when it has a plausible one
pub fn tune_file_name(hymn: &HymnRecord) -> String {
    let extension = hymn
        .audio_remote_url
        .as_deref()
        .and_then(url_extension)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("hymn_{}.{}", hymn.number, extension)
}

fn url_extension(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let file = url.path_segments()?.last()?;
    let extension = Path::new(file).extension()?.to_str()?;
    let plausible = (1..=5).contains(&extension.len())
        && extension.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then(|| extension.to_string())
}

/// True when the hymn's recorded tune path points at a file
async fn tune_on_disk(hymn: &HymnRecord) -> bool {
    let Some(path) = hymn.local_audio_path.as_deref() else {
        return false;
    };
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// Downloads, verifies and removes offline tunes
pub struct TuneManager {
    pool: DbPool,
    downloader: Arc<dyn AssetDownloader>,
    network: Arc<dyn NetworkMonitor>,
    tune_dir: PathBuf,
}

impl TuneManager {
    pub fn new(
        pool: DbPool,
        downloader: Arc<dyn AssetDownloader>,
        network: Arc<dyn NetworkMonitor>,
        tune_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pool,
            downloader,
            network,
            tune_dir: tune_dir.into(),
        }
    }

    pub fn tune_dir(&self) -> &Path {
        &self.tune_dir
    }

    /// Downloads every tune that is not already on disk
    pub async fn download_all(&self, listener: &dyn ProgressListener) -> SyncResult<TuneReport> {
        let mut missing = Vec::new();
        for hymn in get_all_hymns(&self.pool).await? {
            if hymn.has_remote_audio() && !tune_on_disk(&hymn).await {
                missing.push(hymn);
            }
        }
        self.download_batch(missing, listener).await
    }

    /// Re-downloads every tune, replacing files already on disk
    pub async fn update_all(&self, listener: &dyn ProgressListener) -> SyncResult<TuneReport> {
        let hymns: Vec<HymnRecord> = get_all_hymns(&self.pool)
            .await?
            .into_iter()
            .filter(HymnRecord::has_remote_audio)
            .collect();
        self.download_batch(hymns, listener).await
    }

    async fn download_batch(
        &self,
        hymns: Vec<HymnRecord>,
        listener: &dyn ProgressListener,
    ) -> SyncResult<TuneReport> {
        if !self.network.is_online().await {
            return Err(SyncError::offline("download tunes"));
        }

        tokio::fs::create_dir_all(&self.tune_dir).await?;

        let total = hymns.len();
        let mut summary = TuneReport {
            attempted: total,
            ..TuneReport::default()
        };

        for (index, hymn) in hymns.iter().enumerate() {
            match self.download_one(hymn).await {
                Ok(()) => summary.downloaded += 1,
                Err(e) => {
                    e.log(&format!("Skipping tune for hymn {}", hymn.number));
                    summary.failed.push((hymn.remote_id.clone(), e.to_string()));
                }
            }
            report(listener, Progress::new(index + 1, total, hymn.title.clone()));
        }

        log::info!(
            "Tune download finished: {} of {} downloaded",
            summary.downloaded,
            summary.attempted
        );
        Ok(summary)
    }

    async fn download_one(&self, hymn: &HymnRecord) -> SyncResult<()> {
        let Some(url) = hymn.audio_remote_url.as_deref() else {
            return Err(SyncError::not_found(&hymn.remote_id));
        };
        let destination = self.tune_dir.join(tune_file_name(hymn));

        let bytes = self.downloader.download(url, &destination).await?;
        set_local_audio_path(&self.pool, &hymn.remote_id, Some(&destination)).await?;
        log::debug!("Stored {} bytes for hymn {}", bytes, hymn.number);
        Ok(())
    }

    /// Deletes the tune directory and forgets every recorded path
    ///
    /// A directory that does not exist is not an error.
    pub async fn clear_all(&self) -> SyncResult<u64> {
        match tokio::fs::remove_dir_all(&self.tune_dir).await {
            Ok(()) => log::info!("Removed {}", self.tune_dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(clear_all_local_audio_paths(&self.pool).await?)
    }

    /// Clears recorded paths whose file has disappeared
    ///
    /// Returns the number of paths cleared.
    pub async fn verify_downloads(&self) -> SyncResult<usize> {
        let mut cleared = 0;
        for hymn in get_all_hymns(&self.pool).await? {
            if hymn.local_audio_path.is_some() && !tune_on_disk(&hymn).await {
                set_local_audio_path(&self.pool, &hymn.remote_id, None).await?;
                cleared += 1;
            }
        }
        if cleared > 0 {
            log::info!("Cleared {} missing tune paths", cleared);
        }
        Ok(cleared)
    }
}
