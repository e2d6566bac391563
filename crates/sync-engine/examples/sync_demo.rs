// crates/sync-engine/examples/sync_demo.rs
//! Demonstration of the hymnal sync engine against an in-memory backend

use hymnal_core::{HymnKey, HymnPatch, HymnRecord, RemoteId, Stanza, UserId};
use hymnal_database::{connect_in_memory, initialize_schema};
use hymnal_network::{Client, ConnectivityFlag, DownloadManager};
use hymnal_remote::MemoryRemoteStore;
use hymnal_sync_engine::{
    HymnalSync, ListenerError, MemorySecureStorage, Progress, SessionState, SilentProgress,
    SyncConfig, SyncServices,
};
use serde_json::json;
use std::sync::Arc;

fn catalog() -> Vec<HymnRecord> {
    let titles = [
        "Amazing Grace",
        "Be Thou My Vision",
        "Holy, Holy, Holy",
        "It Is Well with My Soul",
        "Great Is Thy Faithfulness",
    ];
    titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let mut hymn = HymnRecord::new(RemoteId::new(format!("hymn-{}", i + 1)), i as u32 + 1, *title);
            hymn.stanzas = vec![Stanza::new(1, format!("First verse of {}", title))];
            hymn
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Hymnal Sync Engine Demo");
    println!("=======================\n");

    let pool = connect_in_memory().await?;
    initialize_schema(&pool).await?;
    let scratch = tempfile::TempDir::new()?;

    let remote = MemoryRemoteStore::with_hymns(catalog()).await;
    let network = ConnectivityFlag::new(true);
    let session = SessionState::signed_in(UserId::new("demo-user"));

    let services = SyncServices {
        remote: Arc::new(remote.clone()),
        network: Arc::new(network.clone()),
        session: Arc::new(session.clone()),
        secure_storage: Arc::new(MemorySecureStorage::new()),
        downloader: Arc::new(DownloadManager::new(Client::new()?)),
    };
    let config = SyncConfig {
        tune_dir: scratch.path().join("tunes"),
        ..SyncConfig::default()
    };
    let sync = HymnalSync::new(pool, services, config);

    println!("1. Session start");
    println!("----------------");
    let snapshot = sync.start_session().await?;
    println!("User: {:?}", snapshot.user);
    println!("Font size: {}", snapshot.preferences.font_size);
    println!("Offline download: {}", snapshot.preferences.offline_download);

    println!("\n2. Browsing without offline download");
    println!("------------------------------------");
    let view = sync.catalog().load_hymns().await?;
    println!("{} hymns from {:?} (nothing stored)", view.hymns.len(), view.source);

    println!("\n3. Downloading the catalog");
    println!("--------------------------");
    sync.update_preference("offlineDownload", json!(true)).await?;
    let listener = |p: &Progress| -> Result<(), ListenerError> {
        println!("  [{:>3.0}%] {}", p.fraction() * 100.0, p.current);
        Ok(())
    };
    let outcome = sync.catalog().force_full_sync(&listener).await?;
    println!("Applied {} hymns", outcome.applied_count());

    let outcome = sync.sync_catalog(&SilentProgress).await?;
    println!("Incremental sync afterwards: {:?}", outcome);

    println!("\n4. Favorites and recent");
    println!("-----------------------");
    sync.toggle_favorite("hymn-1").await?;
    sync.toggle_favorite("hymn-4").await?;
    sync.record_view("hymn-2").await?;
    sync.record_view("hymn-1").await?;
    let lists = sync.favorites().lists().await;
    println!("Favorites: {:?}", lists.favorites.ids());
    println!("Recent: {:?}", lists.recent.ids());

    println!("\n5. Editing while offline");
    println!("------------------------");
    network.set_online(false);
    let patch = HymnPatch::new().with_title("Amazing Grace (How Sweet the Sound)");
    match sync.catalog().edit_hymn(&HymnKey::Number(1), &patch).await {
        Ok(_) => println!("Unexpectedly edited while offline"),
        Err(e) => println!("Rejected: {}", e.user_message()),
    }

    network.set_online(true);
    let edited = sync.catalog().edit_hymn(&HymnKey::Number(1), &patch).await?;
    println!("Edited online: {}", edited.title);

    println!("\n6. Search");
    println!("---------");
    for result in sync.catalog().search("vision", 5).await? {
        println!("  #{} {}", result.item.number, result.item.title);
    }

    println!("\n7. Clearing offline data");
    println!("------------------------");
    let removed = sync.clear_offline_data().await?;
    println!("Removed {} hymns", removed);
    let view = sync.catalog().load_hymns().await?;
    println!("Catalog now comes from {:?}", view.source);

    Ok(())
}
