// crates/sync-engine/tests/sync_tests.rs
//! Integration tests for the sync engine

use async_trait::async_trait;
use hymnal_core::{
    FontSize, HymnKey, HymnPatch, HymnRecord, RemoteId, Stanza, Timestamp, UserId,
};
use hymnal_database::queries::{get_hymn_count, get_last_sync_time, get_preferences, upsert_hymn};
use hymnal_database::{connect_in_memory, initialize_schema};
use hymnal_network::{ConnectivityFlag, NetworkError};
use hymnal_remote::{MemoryRemoteStore, RemoteOperation, UserCollection};
use hymnal_sync_engine::{
    AssetDownloader, CatalogSource, HymnalSync, ListenerError, MemorySecureStorage, Progress,
    SecureStorage, SessionState, SilentProgress, SkipReason, SyncConfig, SyncError, SyncOutcome,
    SyncPhase, SyncResult, SyncServices,
};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Writes a small file for every URL except the ones told to fail
#[derive(Default)]
struct FakeDownloader {
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl AssetDownloader for FakeDownloader {
    async fn download(&self, url: &str, destination: &Path) -> SyncResult<u64> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.failing.iter().any(|u| u == url) {
            return Err(SyncError::Download(NetworkError::DownloadFailed(format!(
                "{} returned 500",
                url
            ))));
        }
        tokio::fs::write(destination, b"tune").await?;
        Ok(4)
    }
}

struct Harness {
    sync: HymnalSync,
    remote: MemoryRemoteStore,
    flag: ConnectivityFlag,
    session: SessionState,
    storage: MemorySecureStorage,
    downloader: Arc<FakeDownloader>,
    dir: TempDir,
}

async fn harness_with(hymns: Vec<HymnRecord>, downloader: FakeDownloader) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let pool = connect_in_memory().await.unwrap();
    initialize_schema(&pool).await.unwrap();
    let dir = TempDir::new().unwrap();

    let remote = MemoryRemoteStore::with_hymns(hymns).await;
    let flag = ConnectivityFlag::new(true);
    let session = SessionState::signed_in(UserId::new("user-1"));
    let storage = MemorySecureStorage::new();
    let downloader = Arc::new(downloader);

    let services = SyncServices {
        remote: Arc::new(remote.clone()),
        network: Arc::new(flag.clone()),
        session: Arc::new(session.clone()),
        secure_storage: Arc::new(storage.clone()),
        downloader: downloader.clone(),
    };
    let config = SyncConfig {
        tune_dir: dir.path().join("tunes"),
        ..SyncConfig::default()
    };

    Harness {
        sync: HymnalSync::new(pool, services, config),
        remote,
        flag,
        session,
        storage,
        downloader,
        dir,
    }
}

async fn harness(hymns: Vec<HymnRecord>) -> Harness {
    harness_with(hymns, FakeDownloader::default()).await
}

fn hymn(id: &str, number: u32, millis: i64) -> HymnRecord {
    let mut h = HymnRecord::new(id, number, format!("Hymn {}", number));
    h.updated_at = Timestamp::from_millis(millis);
    h
}

fn hymn_with_tune(number: u32) -> HymnRecord {
    let mut h = hymn(&format!("h{}", number), number, 1_000);
    h.audio_remote_url = Some(format!("https://cdn.example.com/tunes/{}.mp3", number));
    h
}

fn user() -> UserId {
    UserId::new("user-1")
}

#[tokio::test]
async fn test_reapplying_a_record_keeps_one_row() {
    let h = harness(vec![hymn("a", 1, 1_000)]).await;
    let catalog = h.sync.catalog();

    catalog.force_full_sync(&SilentProgress).await.unwrap();
    let mut edited = hymn("a", 1, 2_000);
    edited.title = "Second write".to_string();
    h.remote.insert_hymns([edited]).await;
    catalog.force_full_sync(&SilentProgress).await.unwrap();

    assert_eq!(catalog.hymn_count().await.unwrap(), 1);
    let stored = catalog.get_hymn(&HymnKey::Number(1)).await.unwrap();
    assert_eq!(stored.title, "Second write");
    assert_eq!(stored.updated_at, Timestamp::from_millis(2_000));
}

#[tokio::test]
async fn test_watermark_never_decreases() {
    let h = harness(vec![hymn("a", 1, 1_000)]).await;
    h.sync.update_preference("offlineDownload", json!(true)).await.unwrap();

    let mut previous = Timestamp::epoch();
    for round in 2..5u32 {
        let outcome = h.sync.sync_catalog(&SilentProgress).await.unwrap();
        let watermark = outcome.watermark().unwrap();
        assert!(watermark >= previous);
        assert_eq!(get_last_sync_time(h.sync.pool()).await.unwrap(), Some(watermark));
        previous = watermark;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut newer = hymn(&format!("r{}", round), round, 0);
        newer.updated_at = Timestamp::now();
        h.remote.insert_hymns([newer]).await;
    }

    assert_eq!(h.sync.catalog().hymn_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_failed_fetch_does_not_move_watermark() {
    let h = harness(vec![hymn("a", 1, 1_000)]).await;
    h.sync.catalog().set_offline_download(true);
    h.sync.sync_catalog(&SilentProgress).await.unwrap();
    let before = get_last_sync_time(h.sync.pool()).await.unwrap();

    h.remote
        .set_failing(RemoteOperation::ListHymnsUpdatedSince, true)
        .await;
    let err = h.sync.sync_catalog(&SilentProgress).await.unwrap_err();

    assert!(matches!(err, SyncError::Remote(_)));
    assert_eq!(h.sync.catalog().phase(), SyncPhase::Failed);
    assert_eq!(get_last_sync_time(h.sync.pool()).await.unwrap(), before);
}

#[tokio::test]
async fn test_failed_batch_rolls_back_and_keeps_watermark() {
    // "y" reuses number 5, which the local catalog already gives to "x"
    let h = harness(vec![hymn("a", 1, 5_000), hymn("y", 5, 5_000)]).await;
    let pool = h.sync.pool();
    upsert_hymn(pool, &hymn("x", 5, 1_000)).await.unwrap();
    h.sync.catalog().set_offline_download(true);

    let result = h.sync.sync_catalog(&SilentProgress).await;

    assert!(matches!(result, Err(SyncError::Storage(_))));
    assert_eq!(h.sync.catalog().phase(), SyncPhase::Failed);
    assert_eq!(get_hymn_count(pool).await.unwrap(), 1);
    assert!(h.sync.catalog().get_hymn(&HymnKey::from(RemoteId::new("x"))).await.is_ok());
    assert!(get_last_sync_time(pool).await.unwrap().is_none());
}

#[tokio::test]
async fn test_partial_preferences_are_default_filled() {
    let h = harness(vec![]).await;
    h.remote
        .put_user_document(
            UserCollection::Preferences,
            &user(),
            json!({
                "version": 1,
                "fontSize": "large",
                "display": {"showChords": true},
                "legacyFlag": "kept"
            }),
        )
        .await;

    let snapshot = h.sync.start_session().await.unwrap();
    let preferences = snapshot.preferences;

    assert_eq!(preferences.font_size, FontSize::Large);
    assert!(preferences.display.show_chords);
    assert_eq!(preferences.display.line_spacing, 1.5);
    assert!(preferences.sync_favorites);
    assert_eq!(preferences.extra.get("legacyFlag"), Some(&json!("kept")));

    let stored = get_preferences(h.sync.pool(), &user()).await.unwrap().unwrap();
    assert_eq!(stored, preferences);
}

#[tokio::test]
async fn test_recent_list_dedups_and_caps() {
    let h = harness(vec![]).await;
    h.sync.start_session().await.unwrap();

    for _ in 0..4 {
        h.sync.record_view("h7").await.unwrap();
    }
    assert_eq!(h.sync.favorites().lists().await.recent.ids(), ["h7"]);

    for i in 1..=25 {
        h.sync.record_view(&format!("n{}", i)).await.unwrap();
    }
    let recent = h.sync.favorites().lists().await.recent;
    let expected: Vec<String> = (6..=25).rev().map(|i| format!("n{}", i)).collect();
    assert_eq!(recent.ids(), expected.as_slice());

    let cloud = h.remote.user_document(UserCollection::Recent, &user()).await.unwrap();
    assert_eq!(cloud["hymnIds"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_toggle_twice_restores_favorites() {
    let h = harness(vec![]).await;
    h.sync.start_session().await.unwrap();
    h.sync.toggle_favorite("h1").await.unwrap();
    let original = h.sync.favorites().lists().await.favorites;

    assert!(h.sync.toggle_favorite("h2").await.unwrap());
    assert!(!h.sync.toggle_favorite("h2").await.unwrap());
    assert_eq!(h.sync.favorites().lists().await.favorites, original);

    assert!(!h.sync.toggle_favorite("h1").await.unwrap());
    assert!(h.sync.toggle_favorite("h1").await.unwrap());
    assert_eq!(h.sync.favorites().lists().await.favorites, original);
    assert_eq!(
        h.storage.get("favorites_user-1").await.unwrap().as_deref(),
        Some(r#"["h1"]"#)
    );
}

#[tokio::test]
async fn test_offline_rejection_leaves_store_untouched() {
    let h = harness(vec![hymn("a", 1, 1_000)]).await;
    h.sync.catalog().set_offline_download(true);
    h.flag.set_online(false);
    let catalog = h.sync.catalog();

    let edit = catalog
        .edit_hymn(&HymnKey::Number(1), &HymnPatch::new().with_title("x"))
        .await;
    assert!(edit.unwrap_err().is_offline());

    assert_eq!(
        catalog.incremental_sync(&SilentProgress).await.unwrap(),
        SyncOutcome::Skipped(SkipReason::Offline)
    );
    assert!(catalog
        .force_full_sync(&SilentProgress)
        .await
        .unwrap_err()
        .is_offline());

    assert_eq!(catalog.hymn_count().await.unwrap(), 0);
    assert!(catalog.last_sync_time().await.unwrap().is_none());
    assert_eq!(h.remote.total_calls().await, 0);
}

#[tokio::test]
async fn test_empty_device_full_download() {
    let hymns: Vec<HymnRecord> = (1..=500).map(|n| hymn(&format!("h{}", n), n, 1_000)).collect();
    let h = harness(hymns).await;
    h.sync.update_preference("offlineDownload", json!(true)).await.unwrap();

    let view = h.sync.catalog().load_hymns().await.unwrap();
    assert!(view.is_empty());
    assert_eq!(view.source, CatalogSource::Empty);
    assert_eq!(h.remote.call_count(RemoteOperation::ListHymns).await, 0);

    let started = Timestamp::now();
    let updates = Mutex::new(Vec::new());
    let listener = |p: &Progress| -> Result<(), ListenerError> {
        updates.lock().unwrap().push(p.processed);
        Ok(())
    };
    let outcome = h.sync.catalog().force_full_sync(&listener).await.unwrap();

    assert_eq!(outcome.applied_count(), 500);
    assert_eq!(h.sync.catalog().hymn_count().await.unwrap(), 500);
    let watermark = h.sync.catalog().last_sync_time().await.unwrap().unwrap();
    assert!(watermark >= started);

    let updates = updates.into_inner().unwrap();
    assert_eq!(updates.first(), Some(&0));
    assert_eq!(updates.last(), Some(&500));

    let view = h.sync.catalog().load_hymns().await.unwrap();
    assert_eq!(view.source, CatalogSource::Local);
    assert_eq!(view.hymns.len(), 500);
}

#[tokio::test]
async fn test_failing_listener_does_not_abort_sync() {
    let h = harness(vec![hymn("a", 1, 1), hymn("b", 2, 1)]).await;
    let listener =
        |_: &Progress| -> Result<(), ListenerError> { Err(ListenerError("screen closed".into())) };

    let outcome = h.sync.catalog().force_full_sync(&listener).await.unwrap();
    assert_eq!(outcome.applied_count(), 2);
    assert_eq!(h.sync.catalog().phase(), SyncPhase::Done);
}

#[tokio::test]
async fn test_one_failed_tune_does_not_stop_the_batch() {
    let hymns: Vec<HymnRecord> = (1..=10).map(hymn_with_tune).collect();
    let downloader = FakeDownloader {
        failing: vec!["https://cdn.example.com/tunes/4.mp3".to_string()],
        ..FakeDownloader::default()
    };
    let h = harness_with(hymns, downloader).await;
    h.sync.catalog().force_full_sync(&SilentProgress).await.unwrap();

    let seen = Mutex::new(Vec::new());
    let listener = |p: &Progress| -> Result<(), ListenerError> {
        seen.lock().unwrap().push((p.processed, p.total));
        Ok(())
    };
    let report = h.sync.tunes().download_all(&listener).await.unwrap();

    assert_eq!(report.attempted, 10);
    assert_eq!(report.downloaded, 9);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, RemoteId::new("h4"));
    assert_eq!(seen.into_inner().unwrap().len(), 10);

    for number in 1..=10u32 {
        let stored = h.sync.catalog().get_hymn(&HymnKey::Number(number)).await.unwrap();
        if number == 4 {
            assert!(stored.local_audio_path.is_none());
        } else {
            assert!(stored.is_audio_downloaded(), "hymn {} has no tune", number);
        }
    }
    assert_eq!(h.sync.catalog().downloaded_audio_count().await.unwrap(), 9);

    // A second pass only retries the missing tune
    let calls_before = h.downloader.calls.lock().unwrap().len();
    let retry = h.sync.tunes().download_all(&SilentProgress).await.unwrap();
    assert_eq!(retry.attempted, 1);
    assert_eq!(h.downloader.calls.lock().unwrap().len(), calls_before + 1);
}

#[tokio::test]
async fn test_update_all_redownloads_and_verify_clears_missing() {
    let h = harness(vec![hymn_with_tune(1), hymn_with_tune(2)]).await;
    let tunes = h.sync.tunes();
    h.sync.catalog().force_full_sync(&SilentProgress).await.unwrap();
    tunes.download_all(&SilentProgress).await.unwrap();

    let report = tunes.update_all(&SilentProgress).await.unwrap();
    assert_eq!(report.downloaded, 2);

    std::fs::remove_file(tunes.tune_dir().join("hymn_2.mp3")).unwrap();
    assert_eq!(tunes.verify_downloads().await.unwrap(), 1);
    let hymn_2 = h.sync.catalog().get_hymn(&HymnKey::Number(2)).await.unwrap();
    assert!(hymn_2.local_audio_path.is_none());

    assert_eq!(tunes.clear_all().await.unwrap(), 1);
    assert!(!tunes.tune_dir().exists());
    // Clearing again with no directory is fine
    assert_eq!(tunes.clear_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_tune_download_offline_is_rejected() {
    let h = harness(vec![hymn_with_tune(1)]).await;
    h.sync.catalog().force_full_sync(&SilentProgress).await.unwrap();
    h.flag.set_online(false);

    let err = h.sync.tunes().download_all(&SilentProgress).await.unwrap_err();
    assert!(err.is_offline());
    assert!(h.downloader.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cloud_preferences_win_at_load() {
    let h = harness(vec![]).await;
    h.flag.set_online(false);
    h.sync.start_session().await.unwrap();
    assert_eq!(h.sync.preferences().current().await.font_size, FontSize::Medium);

    h.remote
        .put_user_document(
            UserCollection::Preferences,
            &user(),
            json!({"fontSize": "large", "syncFavorites": true}),
        )
        .await;
    h.flag.set_online(true);

    let snapshot = h.sync.start_session().await.unwrap();
    assert_eq!(snapshot.preferences.font_size, FontSize::Large);
    assert_eq!(h.sync.preferences().current().await.font_size, FontSize::Large);
    let stored = get_preferences(h.sync.pool(), &user()).await.unwrap().unwrap();
    assert_eq!(stored.font_size, FontSize::Large);
}

#[tokio::test]
async fn test_sync_favorites_off_keeps_cloud_out() {
    let h = harness(vec![]).await;
    h.sync.start_session().await.unwrap();
    h.sync.update_preference("syncFavorites", json!(false)).await.unwrap();
    let calls = h.remote.total_calls().await;

    h.sync.toggle_favorite("h1").await.unwrap();
    h.sync.record_view("h1").await.unwrap();
    assert_eq!(h.remote.total_calls().await, calls);
}

#[tokio::test]
async fn test_edit_writes_through_and_keeps_tune() {
    let h = harness(vec![hymn_with_tune(3)]).await;
    h.sync.catalog().force_full_sync(&SilentProgress).await.unwrap();
    h.sync.tunes().download_all(&SilentProgress).await.unwrap();

    let edited = h
        .sync
        .catalog()
        .edit_hymn(
            &HymnKey::Number(3),
            &HymnPatch::new()
                .with_title("Renamed")
                .with_stanzas(vec![Stanza::new(1, "A new first verse")]),
        )
        .await
        .unwrap();

    assert_eq!(edited.title, "Renamed");
    assert_eq!(edited.stanzas.len(), 1);
    assert!(edited.is_audio_downloaded());
    assert_eq!(h.remote.hymn(&RemoteId::new("h3")).await.unwrap().title, "Renamed");
}

#[tokio::test]
async fn test_display_only_fetch_when_offline_download_disabled() {
    let h = harness(vec![hymn("a", 1, 1), hymn("b", 2, 1)]).await;

    let view = h.sync.catalog().load_hymns().await.unwrap();
    assert_eq!(view.source, CatalogSource::Remote);
    assert_eq!(view.hymns.len(), 2);
    assert_eq!(h.sync.catalog().hymn_count().await.unwrap(), 0);

    h.remote.set_unreachable(true).await;
    let view = h.sync.catalog().load_hymns().await.unwrap();
    assert!(view.is_empty());

    h.flag.set_online(false);
    let view = h.sync.catalog().load_hymns().await.unwrap();
    assert!(view.notice.unwrap().contains("Connect to the internet"));
}

#[tokio::test]
async fn test_sign_out_with_clear_removes_local_user_data() {
    let h = harness(vec![]).await;
    h.sync.start_session().await.unwrap();
    h.sync.toggle_favorite("h1").await.unwrap();
    h.sync.update_preference("theme", json!("dark")).await.unwrap();

    h.session.sign_out();
    h.sync.sign_out(&user(), true).await.unwrap();

    assert!(h.storage.is_empty().await);
    assert!(get_preferences(h.sync.pool(), &user()).await.unwrap().is_none());
    assert!(h.sync.favorites().lists().await.favorites.is_empty());

    // Signed out: lists stay in memory only
    let snapshot = h.sync.start_session().await.unwrap();
    assert!(snapshot.user.is_none());
    h.sync.toggle_favorite("h9").await.unwrap();
    assert!(h.storage.is_empty().await);
}

#[tokio::test]
async fn test_clear_offline_data_removes_hymns_and_tunes() {
    let h = harness(vec![hymn_with_tune(1), hymn_with_tune(2)]).await;
    let (outcome, tunes) = h.sync.download_everything(&SilentProgress).await.unwrap();
    assert_eq!(outcome.applied_count(), 2);
    assert_eq!(tunes.downloaded, 2);

    assert_eq!(h.sync.clear_offline_data().await.unwrap(), 2);
    assert_eq!(h.sync.catalog().hymn_count().await.unwrap(), 0);
    assert!(!h.dir.path().join("tunes").exists());
    assert!(h.sync.catalog().last_sync_time().await.unwrap().is_none());
}

#[tokio::test]
async fn test_search_cached_catalog() {
    let mut grace = hymn("g", 12, 1);
    grace.title = "Amazing Grace".to_string();
    let h = harness(vec![grace, hymn("b", 2, 1)]).await;
    h.sync.catalog().force_full_sync(&SilentProgress).await.unwrap();

    let results = h.sync.catalog().search("grace", 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item.number, 12);
}
