// crates/sync-engine/src/preferences.rs
//! Per-user preference sync
//!
//! The cloud copy wins when a session starts; the device wins when the user
//! edits a setting. Edits are written locally first and mirrored to the
//! Remote Store afterwards, and a failed mirror never undoes the local write.

use crate::{SyncError, SyncResult};
use hymnal_core::{PreferenceSet, UserId};
use hymnal_database::queries::{delete_preferences, get_preferences, save_preferences};
use hymnal_database::DbPool;
use hymnal_network::NetworkMonitor;
use hymnal_remote::{RemoteStore, UserCollection};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps a user's preferences in step between the Local Store and the cloud
pub struct PreferenceSync {
    pool: DbPool,
    remote: Arc<dyn RemoteStore>,
    network: Arc<dyn NetworkMonitor>,
    current: RwLock<PreferenceSet>,
}

impl PreferenceSync {
    pub fn new(
        pool: DbPool,
        remote: Arc<dyn RemoteStore>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        Self {
            pool,
            remote,
            network,
            current: RwLock::new(PreferenceSet::default()),
        }
    }

    /// Preferences as of the last load or edit
    pub async fn current(&self) -> PreferenceSet {
        self.current.read().await.clone()
    }

    /// Loads a user's preferences
    ///
    /// Stored values are merged over the defaults; a user without a row gets
    /// the defaults, which are stored. When `syncFavorites` is on and the
    /// device is online a differing cloud copy replaces the local one. Cloud
    /// failures are logged and the local copy is kept.
    pub async fn load(&self, user: &UserId) -> SyncResult<PreferenceSet> {
        let mut preferences = match get_preferences(&self.pool, user).await? {
            Some(stored) => stored,
            None => {
                let defaults = PreferenceSet::default();
                save_preferences(&self.pool, user, &defaults).await?;
                defaults
            }
        };

        if preferences.sync_favorites && self.can_reach_cloud(user).await {
            if let Some(cloud) = self.pull(user, &preferences).await {
                preferences = cloud;
            }
        }

        *self.current.write().await = preferences.clone();
        Ok(preferences)
    }

    /// Returns the cloud copy when it differs from `local` and was stored
    /// locally; pushes `local` when the cloud has none
    async fn pull(&self, user: &UserId, local: &PreferenceSet) -> Option<PreferenceSet> {
        match self
            .remote
            .get_user_document(UserCollection::Preferences, user)
            .await
        {
            Ok(Some(document)) => {
                let cloud = PreferenceSet::from_json(&document);
                if &cloud == local {
                    return None;
                }
                log::info!("Applying cloud preferences for {}", user);
                match save_preferences(&self.pool, user, &cloud).await {
                    Ok(()) => Some(cloud),
                    Err(e) => {
                        log::warn!("Could not store cloud preferences: {}", e);
                        None
                    }
                }
            }
            Ok(None) => {
                self.mirror(user, local, false).await;
                None
            }
            Err(e) => {
                log::warn!("Could not fetch cloud preferences for {}: {}", user, e);
                None
            }
        }
    }

    /// Sets a top-level preference such as `fontSize` or `offlineDownload`
    pub async fn update(&self, user: &UserId, key: &str, value: Value) -> SyncResult<PreferenceSet> {
        let mut preferences = self.stored_or_default(user).await?;
        preferences.apply_update(key, value)?;
        self.commit(user, preferences).await
    }

    /// Sets a field inside a nested group such as `display.lineSpacing`
    pub async fn update_nested(
        &self,
        user: &UserId,
        parent: &str,
        child: &str,
        value: Value,
    ) -> SyncResult<PreferenceSet> {
        let mut preferences = self.stored_or_default(user).await?;
        preferences.apply_nested_update(parent, child, value)?;
        self.commit(user, preferences).await
    }

    /// Restores the defaults locally and, best effort, in the cloud
    pub async fn reset(&self, user: &UserId) -> SyncResult<PreferenceSet> {
        let defaults = PreferenceSet::default();
        save_preferences(&self.pool, user, &defaults).await?;
        *self.current.write().await = defaults.clone();

        if self.can_reach_cloud(user).await {
            self.mirror(user, &defaults, false).await;
        }
        Ok(defaults)
    }

    /// Pulls the cloud copy on request
    ///
    /// Unlike [`load`](Self::load) this fails when nobody is signed in, when
    /// the device is offline, or when the Remote Store errors. Returns whether
    /// a cloud copy existed and was applied.
    pub async fn force_sync_from_cloud(&self, user: Option<&UserId>) -> SyncResult<bool> {
        let user = match user {
            Some(user) if !user.is_anonymous() => user,
            _ => return Err(SyncError::not_signed_in("sync settings from the cloud")),
        };
        if !self.network.is_online().await {
            return Err(SyncError::offline("sync settings from the cloud"));
        }

        let Some(document) = self
            .remote
            .get_user_document(UserCollection::Preferences, user)
            .await?
        else {
            log::info!("No cloud preferences for {}", user);
            return Ok(false);
        };

        let cloud = PreferenceSet::from_json(&document);
        save_preferences(&self.pool, user, &cloud).await?;
        *self.current.write().await = cloud;
        Ok(true)
    }

    /// Deletes the user's local row and returns the in-memory copy to defaults
    pub async fn clear_local(&self, user: &UserId) -> SyncResult<()> {
        delete_preferences(&self.pool, user).await?;
        *self.current.write().await = PreferenceSet::default();
        Ok(())
    }

    async fn stored_or_default(&self, user: &UserId) -> SyncResult<PreferenceSet> {
        Ok(get_preferences(&self.pool, user)
            .await?
            .unwrap_or_default())
    }

    async fn commit(&self, user: &UserId, preferences: PreferenceSet) -> SyncResult<PreferenceSet> {
        save_preferences(&self.pool, user, &preferences).await?;
        *self.current.write().await = preferences.clone();

        if self.can_reach_cloud(user).await {
            self.mirror(user, &preferences, true).await;
        }
        Ok(preferences)
    }

    async fn can_reach_cloud(&self, user: &UserId) -> bool {
        !user.is_anonymous() && self.network.is_online().await
    }

    /// Writes preferences to the cloud, logging any failure
    async fn mirror(&self, user: &UserId, preferences: &PreferenceSet, merge: bool) {
        let document = match preferences.to_json() {
            Ok(document) => document,
            Err(e) => {
                log::warn!("Could not encode preferences: {}", e);
                json!({})
            }
        };

        if let Err(e) = self
            .remote
            .set_user_document(UserCollection::Preferences, user, &document, merge)
            .await
        {
            log::warn!("Cloud preference mirror failed for {}: {}", user, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hymnal_core::FontSize;
    use hymnal_database::{connect_in_memory, initialize_schema};
    use hymnal_network::ConnectivityFlag;
    use hymnal_remote::{MemoryRemoteStore, RemoteOperation};

    async fn setup() -> (PreferenceSync, MemoryRemoteStore, ConnectivityFlag) {
        let pool = connect_in_memory().await.unwrap();
        initialize_schema(&pool).await.unwrap();
        let remote = MemoryRemoteStore::new();
        let flag = ConnectivityFlag::new(true);
        let sync = PreferenceSync::new(pool, Arc::new(remote.clone()), Arc::new(flag.clone()));
        (sync, remote, flag)
    }

    #[tokio::test]
    async fn test_first_load_stores_and_pushes_defaults() {
        let (sync, remote, _) = setup().await;
        let user = UserId::new("u1");

        let loaded = sync.load(&user).await.unwrap();
        assert_eq!(loaded, PreferenceSet::default());
        assert!(get_preferences(&sync.pool, &user).await.unwrap().is_some());
        assert!(remote
            .user_document(UserCollection::Preferences, &user)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_edit_survives_cloud_failure() {
        let (sync, remote, _) = setup().await;
        let user = UserId::new("u1");
        remote.set_unreachable(true).await;

        let updated = sync
            .update(&user, "fontSize", json!("large"))
            .await
            .unwrap();
        assert_eq!(updated.font_size, FontSize::Large);

        let stored = get_preferences(&sync.pool, &user).await.unwrap().unwrap();
        assert_eq!(stored.font_size, FontSize::Large);
        assert_eq!(remote.call_count(RemoteOperation::SetUserDocument).await, 1);
    }

    #[tokio::test]
    async fn test_nested_update_is_validated() {
        let (sync, _, _) = setup().await;
        let user = UserId::new("u1");

        let updated = sync
            .update_nested(&user, "display", "lineSpacing", json!(1.8))
            .await
            .unwrap();
        assert_eq!(updated.display.line_spacing, 1.8);

        let err = sync
            .update(&user, "noSuchSetting", json!(true))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidPreference { .. }));
        // The rejected edit left the stored copy alone
        assert_eq!(sync.current().await.display.line_spacing, 1.8);
    }

    #[tokio::test]
    async fn test_anonymous_user_stays_local() {
        let (sync, remote, _) = setup().await;
        let user = UserId::anonymous();

        sync.load(&user).await.unwrap();
        sync.update(&user, "theme", json!("dark")).await.unwrap();
        sync.reset(&user).await.unwrap();
        assert_eq!(remote.total_calls().await, 0);
    }

    #[tokio::test]
    async fn test_force_sync_requires_identity_and_network() {
        let (sync, remote, flag) = setup().await;

        let err = sync.force_sync_from_cloud(None).await.unwrap_err();
        assert!(matches!(err, SyncError::NotSignedIn { .. }));

        let user = UserId::new("u1");
        assert!(!sync.force_sync_from_cloud(Some(&user)).await.unwrap());

        remote
            .put_user_document(UserCollection::Preferences, &user, json!({"theme": "dark"}))
            .await;
        assert!(sync.force_sync_from_cloud(Some(&user)).await.unwrap());
        assert_eq!(sync.current().await.theme, hymnal_core::Theme::Dark);

        flag.set_online(false);
        assert!(sync
            .force_sync_from_cloud(Some(&user))
            .await
            .unwrap_err()
            .is_offline());
    }

    #[tokio::test]
    async fn test_reset_replaces_cloud_copy() {
        let (sync, remote, _) = setup().await;
        let user = UserId::new("u1");
        remote
            .put_user_document(
                UserCollection::Preferences,
                &user,
                json!({"fontSize": "xlarge", "custom": 1}),
            )
            .await;

        let reset = sync.reset(&user).await.unwrap();
        assert_eq!(reset, PreferenceSet::default());

        let cloud = remote
            .user_document(UserCollection::Preferences, &user)
            .await
            .unwrap();
        assert!(cloud.get("custom").is_none());
        assert_eq!(cloud["fontSize"], json!("medium"));
    }

    #[tokio::test]
    async fn test_nested_fields_from_other_builds_survive_edits() {
        let (sync, remote, _) = setup().await;
        let user = UserId::new("u1");
        remote
            .put_user_document(
                UserCollection::Preferences,
                &user,
                json!({
                    "display": { "showChords": true, "fontFamily": "serif" },
                    "notifications": { "sound": "bell" }
                }),
            )
            .await;

        let loaded = sync.load(&user).await.unwrap();
        assert!(loaded.display.show_chords);
        let stored = get_preferences(&sync.pool, &user).await.unwrap().unwrap();
        assert_eq!(stored.notifications.extra.get("sound"), Some(&json!("bell")));

        sync.update(&user, "theme", json!("dark")).await.unwrap();

        let cloud = remote
            .user_document(UserCollection::Preferences, &user)
            .await
            .unwrap();
        assert_eq!(cloud["theme"], json!("dark"));
        assert_eq!(cloud["display"]["fontFamily"], json!("serif"));
        assert_eq!(cloud["notifications"]["sound"], json!("bell"));
    }
}
