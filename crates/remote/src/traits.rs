//! The Remote Store contract

use crate::RemoteResult;
use async_trait::async_trait;
use hymnal_core::{HymnPatch, HymnRecord, RemoteId, Timestamp, UserId};
use serde_json::Value;
use std::fmt;

/// Per-user document collections kept in the Remote Store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserCollection {
    Preferences,
    Favorites,
    Recent,
}

impl UserCollection {
    pub const ALL: [UserCollection; 3] = [Self::Preferences, Self::Favorites, Self::Recent];

    /// Collection name used by the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preferences => "preferences",
            Self::Favorites => "favorites",
            Self::Recent => "recent",
        }
    }
}

impl fmt::Display for UserCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The canonical cloud store for hymns and per-user documents
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every hymn, ordered by number
    async fn list_hymns(&self) -> RemoteResult<Vec<HymnRecord>>;

    /// Hymns whose `updatedAt` is strictly later than `since`
    async fn list_hymns_updated_since(&self, since: Timestamp) -> RemoteResult<Vec<HymnRecord>>;

    /// A single hymn, or `None` if the id is unknown
    async fn get_hymn(&self, id: &RemoteId) -> RemoteResult<Option<HymnRecord>>;

    /// The hymn carrying a catalog number, or `None`
    async fn find_hymn_by_number(&self, number: u32) -> RemoteResult<Option<HymnRecord>> {
        Ok(self
            .list_hymns()
            .await?
            .into_iter()
            .find(|h| h.number == number))
    }

    /// Applies a content edit; the store stamps `updatedAt` and returns the
    /// stored record
    async fn update_hymn(&self, id: &RemoteId, patch: &HymnPatch) -> RemoteResult<HymnRecord>;

    /// A user's document in a collection, or `None` if it was never written
    async fn get_user_document(
        &self,
        collection: UserCollection,
        user: &UserId,
    ) -> RemoteResult<Option<Value>>;

    /// Writes a user's document; with `merge` the top-level keys are merged
    /// into an existing document instead of replacing it
    async fn set_user_document(
        &self,
        collection: UserCollection,
        user: &UserId,
        document: &Value,
        merge: bool,
    ) -> RemoteResult<()>;
}

/// Shallow-merges `patch` into `base`; non-object values replace outright
pub fn merge_documents(base: &mut Value, patch: &Value) {
    match (base.as_object_mut(), patch.as_object()) {
        (Some(base), Some(patch)) => {
            for (key, value) in patch {
                base.insert(key.clone(), value.clone());
            }
        }
        _ => *base = patch.clone(),
    }
}
