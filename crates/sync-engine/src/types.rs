// crates/sync-engine/src/types.rs
//! Results and state reported by the sync flows

use hymnal_core::{HymnRecord, RemoteId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a catalog sync attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncPhase {
    #[default]
    Idle,
    CheckingWatermark,
    FetchingRemoteDelta,
    ApplyingLocal,
    Done,
    Failed,
}

impl SyncPhase {
    /// True while an attempt is between its first and last step
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Self::CheckingWatermark | Self::FetchingRemoteDelta | Self::ApplyingLocal
        )
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "idle",
            Self::CheckingWatermark => "checking watermark",
            Self::FetchingRemoteDelta => "fetching remote changes",
            Self::ApplyingLocal => "applying changes",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Why a sync was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    Offline,
    OfflineDownloadDisabled,
}

/// Result of a catalog sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// Policy declined the sync; nothing was read or written
    Skipped(SkipReason),
    /// The Remote Store had nothing newer
    UpToDate { watermark: Timestamp },
    /// `count` records were applied in one transaction; `rejected` records
    /// failed validation and were left out
    Applied {
        count: usize,
        rejected: Vec<RemoteId>,
        watermark: Timestamp,
    },
}

impl SyncOutcome {
    /// True unless the sync was skipped
    pub fn synced(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }

    pub fn applied_count(&self) -> usize {
        match self {
            Self::Applied { count, .. } => *count,
            _ => 0,
        }
    }

    /// Remote records left out because their content was invalid
    pub fn rejected(&self) -> &[RemoteId] {
        match self {
            Self::Applied { rejected, .. } => rejected,
            _ => &[],
        }
    }

    pub fn watermark(&self) -> Option<Timestamp> {
        match self {
            Self::Skipped(_) => None,
            Self::UpToDate { watermark } | Self::Applied { watermark, .. } => Some(*watermark),
        }
    }
}

/// Where the hymns returned by a catalog load came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogSource {
    Local,
    /// Fetched for display only; nothing was stored
    Remote,
    Empty,
}

/// Hymns ready for display
#[derive(Debug, Clone)]
pub struct CatalogView {
    pub hymns: Vec<HymnRecord>,
    pub source: CatalogSource,
    /// Explanation to show when the catalog is empty
    pub notice: Option<String>,
}

impl CatalogView {
    pub(crate) fn local(hymns: Vec<HymnRecord>) -> Self {
        Self {
            hymns,
            source: CatalogSource::Local,
            notice: None,
        }
    }

    pub(crate) fn remote(hymns: Vec<HymnRecord>) -> Self {
        Self {
            hymns,
            source: CatalogSource::Remote,
            notice: None,
        }
    }

    pub(crate) fn empty(notice: Option<String>) -> Self {
        Self {
            hymns: Vec::new(),
            source: CatalogSource::Empty,
            notice,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hymns.is_empty()
    }
}

/// Counts from a bulk tune download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TuneReport {
    pub attempted: usize,
    pub downloaded: usize,
    /// Hymns whose download failed, with the reason
    pub failed: Vec<(RemoteId, String)>,
}

impl TuneReport {
    pub fn skipped(&self) -> usize {
        self.failed.len()
    }
}

/// One progress notification from a long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    /// Title of the item just processed, or a phase description
    pub current: String,
}

impl Progress {
    pub fn new(processed: usize, total: usize, current: impl Into<String>) -> Self {
        Self {
            processed,
            total,
            current: current.into(),
        }
    }

    /// Completion in `0.0..=1.0`; an empty batch counts as complete
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}
