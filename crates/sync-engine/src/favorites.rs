// crates/sync-engine/src/favorites.rs
//! Favorites and recently viewed hymns
//!
//! Both lists are kept per user in secure storage under `favorites_{user}`
//! and `recent_{user}` and mirrored to the cloud as `{"hymnIds": [...]}`.
//! There is no merge. When a user's lists are loaded:
//!
//! - a non-empty cloud list that differs from the local one replaces it
//! - an empty or missing cloud list is filled from a non-empty local list
//!
//! Edits made offline on two devices therefore resolve to whichever device
//! reached the cloud first. Lists of a signed-out user live only in memory.

use crate::secure_store::SecureStorage;
use crate::SyncResult;
use hymnal_core::types::RECENT_LIMIT;
use hymnal_core::{FavoritesList, RecentList, UserId};
use hymnal_database::queries::{delete_legacy_user_data, get_legacy_user_data};
use hymnal_database::DbPool;
use hymnal_network::NetworkMonitor;
use hymnal_remote::{RemoteStore, UserCollection};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

const HYMN_IDS: &str = "hymnIds";

/// A user's favorites and recently viewed hymns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLists {
    pub favorites: FavoritesList,
    pub recent: RecentList,
}

#[derive(Debug, Default)]
struct ListState {
    user: Option<UserId>,
    lists: UserLists,
}

impl ListState {
    /// The user whose lists are persisted, if any
    fn persisted_user(&self) -> Option<&UserId> {
        self.user.as_ref().filter(|u| !u.is_anonymous())
    }
}

fn favorites_key(user: &UserId) -> String {
    format!("favorites_{}", user)
}

fn recent_key(user: &UserId) -> String {
    format!("recent_{}", user)
}

fn ids_from_document(document: &Value) -> Vec<String> {
    document
        .get(HYMN_IDS)
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Syncs favorites and recent lists for the loaded user
pub struct FavoritesSync {
    pool: DbPool,
    storage: Arc<dyn SecureStorage>,
    remote: Arc<dyn RemoteStore>,
    network: Arc<dyn NetworkMonitor>,
    sync_enabled: AtomicBool,
    recent_limit: usize,
    state: RwLock<ListState>,
}

impl FavoritesSync {
    pub fn new(
        pool: DbPool,
        storage: Arc<dyn SecureStorage>,
        remote: Arc<dyn RemoteStore>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        Self {
            pool,
            storage,
            remote,
            network,
            sync_enabled: AtomicBool::new(true),
            recent_limit: RECENT_LIMIT,
            state: RwLock::new(ListState::default()),
        }
    }

    /// Keeps fewer recent entries than the built-in cap of 20
    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit.clamp(1, RECENT_LIMIT);
        self
    }

    /// Mirrors the user's `syncFavorites` preference
    pub fn set_sync_enabled(&self, enabled: bool) {
        self.sync_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled.load(Ordering::SeqCst)
    }

    pub async fn lists(&self) -> UserLists {
        self.state.read().await.lists.clone()
    }

    pub async fn is_favorite(&self, hymn_id: &str) -> bool {
        self.state.read().await.lists.favorites.contains(hymn_id)
    }

    /// Loads a user's lists, applying the bootstrap rule against the cloud
    pub async fn load(&self, user: &UserId) -> SyncResult<UserLists> {
        if user.is_anonymous() {
            let mut state = self.state.write().await;
            if state.user.as_ref() != Some(user) {
                *state = ListState {
                    user: Some(user.clone()),
                    lists: UserLists::default(),
                };
            }
            return Ok(state.lists.clone());
        }

        self.migrate_legacy_user_data(user).await?;

        let mut favorites = FavoritesList::from_ids(self.read_ids(&favorites_key(user)).await?);
        let mut recent = self.capped(RecentList::from_ids(self.read_ids(&recent_key(user)).await?));

        if self.sync_enabled() && self.network.is_online().await {
            let cloud_favorites = self
                .bootstrap(UserCollection::Favorites, user, favorites.ids(), |cloud| {
                    !favorites.same_members(&FavoritesList::from_ids(cloud.iter().cloned()))
                })
                .await;
            if let Some(cloud) = cloud_favorites {
                favorites = FavoritesList::from_ids(cloud);
                self.write_ids(&favorites_key(user), favorites.ids()).await?;
            }

            let cloud_recent = self
                .bootstrap(UserCollection::Recent, user, recent.ids(), |cloud| {
                    recent.ids() != cloud
                })
                .await;
            if let Some(cloud) = cloud_recent {
                recent = self.capped(RecentList::from_ids(cloud));
                self.write_ids(&recent_key(user), recent.ids()).await?;
            }
        }

        let lists = UserLists { favorites, recent };
        *self.state.write().await = ListState {
            user: Some(user.clone()),
            lists: lists.clone(),
        };
        Ok(lists)
    }

    /// Applies the bootstrap rule to one list
    ///
    /// Returns the cloud ids when they should replace the local list. Pushes
    /// the local list when the cloud has nothing. Cloud failures are logged
    /// and leave the local list in charge.
    async fn bootstrap<F>(
        &self,
        collection: UserCollection,
        user: &UserId,
        local: &[String],
        differs: F,
    ) -> Option<Vec<String>>
    where
        F: Fn(&[String]) -> bool,
    {
        let cloud = match self.remote.get_user_document(collection, user).await {
            Ok(document) => document.as_ref().map(ids_from_document).unwrap_or_default(),
            Err(e) => {
                log::warn!("Could not fetch cloud {} for {}: {}", collection.as_str(), user, e);
                return None;
            }
        };

        if !cloud.is_empty() && differs(&cloud) {
            log::info!("Cloud {} replace local list for {}", collection.as_str(), user);
            return Some(cloud);
        }
        if cloud.is_empty() && !local.is_empty() {
            self.push(collection, user, local).await;
        }
        None
    }

    /// Flips a hymn's favorite status; returns whether it is now a favorite
    ///
    /// The in-memory list changes only once the new list is stored.
    pub async fn toggle(&self, hymn_id: &str) -> SyncResult<bool> {
        let (user, is_favorite, ids) = {
            let mut state = self.state.write().await;
            let mut favorites = state.lists.favorites.clone();
            let is_favorite = favorites.toggle(hymn_id);
            let user = state.persisted_user().cloned();
            if let Some(user) = &user {
                self.write_ids(&favorites_key(user), favorites.ids()).await?;
            }
            let ids = favorites.ids().to_vec();
            state.lists.favorites = favorites;
            (user, is_favorite, ids)
        };

        if let Some(user) = user {
            self.mirror(UserCollection::Favorites, &user, &ids).await;
        }
        Ok(is_favorite)
    }

    /// Moves a hymn to the front of the recent list
    pub async fn record_view(&self, hymn_id: &str) -> SyncResult<RecentList> {
        let (user, recent) = {
            let mut state = self.state.write().await;
            let mut recent = state.lists.recent.clone();
            recent.push(hymn_id);
            let recent = self.capped(recent);
            let user = state.persisted_user().cloned();
            if let Some(user) = &user {
                self.write_ids(&recent_key(user), recent.ids()).await?;
            }
            state.lists.recent = recent.clone();
            (user, recent)
        };

        if let Some(user) = user {
            self.mirror(UserCollection::Recent, &user, recent.ids()).await;
        }
        Ok(recent)
    }

    /// Deletes a user's local lists; the cloud copies are left alone
    pub async fn clear_user_data(&self, user: &UserId) -> SyncResult<()> {
        self.storage.delete(&favorites_key(user)).await?;
        self.storage.delete(&recent_key(user)).await?;

        let mut state = self.state.write().await;
        if state.user.as_ref() == Some(user) {
            state.lists = UserLists::default();
        }
        log::info!("Cleared local lists for {}", user);
        Ok(())
    }

    /// Forgets the loaded user without touching storage
    pub async fn unload(&self) {
        *self.state.write().await = ListState::default();
    }

    /// Moves lists from the legacy `user_data` table into secure storage
    ///
    /// Entries already in secure storage take precedence over the legacy row.
    /// The row is deleted either way. Returns whether a row was found.
    pub async fn migrate_legacy_user_data(&self, user: &UserId) -> SyncResult<bool> {
        let Some(legacy) = get_legacy_user_data(&self.pool, user).await? else {
            return Ok(false);
        };

        let has_favorites = self.storage.get(&favorites_key(user)).await?.is_some();
        let has_recent = self.storage.get(&recent_key(user)).await?.is_some();

        if !has_favorites && !legacy.favorites.is_empty() {
            self.write_ids(&favorites_key(user), legacy.favorites.ids()).await?;
        }
        if !has_recent && !legacy.recent.is_empty() {
            self.write_ids(&recent_key(user), legacy.recent.ids()).await?;
        }

        delete_legacy_user_data(&self.pool, user).await?;
        log::info!("Migrated legacy lists for {}", user);
        Ok(true)
    }

    fn capped(&self, recent: RecentList) -> RecentList {
        if recent.len() <= self.recent_limit {
            return recent;
        }
        RecentList::from_ids(recent.ids().iter().take(self.recent_limit).cloned())
    }

    async fn read_ids(&self, key: &str) -> SyncResult<Vec<String>> {
        let Some(raw) = self.storage.get(key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                log::warn!("Discarding unreadable list {}: {}", key, e);
                Ok(Vec::new())
            }
        }
    }

    async fn write_ids(&self, key: &str, ids: &[String]) -> SyncResult<()> {
        let raw = json!(ids).to_string();
        self.storage.set(key, &raw).await
    }

    async fn mirror(&self, collection: UserCollection, user: &UserId, ids: &[String]) {
        if !self.sync_enabled() || !self.network.is_online().await {
            return;
        }
        self.push(collection, user, ids).await;
    }

    async fn push(&self, collection: UserCollection, user: &UserId, ids: &[String]) {
        let document = json!({ HYMN_IDS: ids });
        if let Err(e) = self
            .remote
            .set_user_document(collection, user, &document, true)
            .await
        {
            log::warn!("Cloud {} mirror failed for {}: {}", collection.as_str(), user, e);
        }
    }
}
