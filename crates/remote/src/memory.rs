//! In-memory Remote Store
//!
//! Used by tests and by the demo program. Individual operations can be made
//! to fail to simulate an unreachable backend, and every call is counted.

use crate::traits::{merge_documents, RemoteStore, UserCollection};
use crate::{RemoteError, RemoteResult};
use async_trait::async_trait;
use hymnal_core::{HymnKey, HymnPatch, HymnRecord, RemoteId, Timestamp, UserId};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Remote Store operations, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    ListHymns,
    ListHymnsUpdatedSince,
    GetHymn,
    UpdateHymn,
    GetUserDocument,
    SetUserDocument,
}

#[derive(Default)]
struct MemoryState {
    hymns: BTreeMap<RemoteId, HymnRecord>,
    documents: HashMap<(UserCollection, UserId), Value>,
    failing: HashSet<RemoteOperation>,
    fail_all: bool,
    calls: HashMap<RemoteOperation, usize>,
}

/// A Remote Store held in memory; clones share state
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with a catalog
    pub async fn with_hymns(hymns: impl IntoIterator<Item = HymnRecord>) -> Self {
        let store = Self::new();
        store.insert_hymns(hymns).await;
        store
    }

    /// Adds or replaces hymns as a content maintainer would
    pub async fn insert_hymns(&self, hymns: impl IntoIterator<Item = HymnRecord>) {
        let mut state = self.state.write().await;
        for mut hymn in hymns {
            hymn.local_id = None;
            hymn.local_audio_path = None;
            state.hymns.insert(hymn.remote_id.clone(), hymn);
        }
    }

    /// Reads a hymn without counting a call
    pub async fn hymn(&self, id: &RemoteId) -> Option<HymnRecord> {
        self.state.read().await.hymns.get(id).cloned()
    }

    /// Reads a user document without counting a call
    pub async fn user_document(&self, collection: UserCollection, user: &UserId) -> Option<Value> {
        self.state
            .read()
            .await
            .documents
            .get(&(collection, user.clone()))
            .cloned()
    }

    /// Writes a user document directly, as another device would
    pub async fn put_user_document(&self, collection: UserCollection, user: &UserId, document: Value) {
        self.state
            .write()
            .await
            .documents
            .insert((collection, user.clone()), document);
    }

    /// Makes one operation fail (or succeed again)
    pub async fn set_failing(&self, operation: RemoteOperation, failing: bool) {
        let mut state = self.state.write().await;
        if failing {
            state.failing.insert(operation);
        } else {
            state.failing.remove(&operation);
        }
    }

    /// Makes every operation fail (or succeed again)
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.write().await.fail_all = unreachable;
    }

    /// Number of calls made to an operation, failed ones included
    pub async fn call_count(&self, operation: RemoteOperation) -> usize {
        self.state
            .read()
            .await
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of calls made to any operation
    pub async fn total_calls(&self) -> usize {
        self.state.read().await.calls.values().sum()
    }

    async fn enter(&self, operation: RemoteOperation) -> RemoteResult<()> {
        let mut state = self.state.write().await;
        *state.calls.entry(operation).or_insert(0) += 1;
        if state.fail_all || state.failing.contains(&operation) {
            return Err(RemoteError::Unavailable(format!(
                "simulated failure in {:?}",
                operation
            )));
        }
        Ok(())
    }

    fn sorted(hymns: impl Iterator<Item = HymnRecord>) -> Vec<HymnRecord> {
        let mut hymns: Vec<HymnRecord> = hymns.collect();
        hymns.sort_by_key(|h| h.number);
        hymns
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn list_hymns(&self) -> RemoteResult<Vec<HymnRecord>> {
        self.enter(RemoteOperation::ListHymns).await?;
        let state = self.state.read().await;
        Ok(Self::sorted(state.hymns.values().cloned()))
    }

    async fn list_hymns_updated_since(&self, since: Timestamp) -> RemoteResult<Vec<HymnRecord>> {
        self.enter(RemoteOperation::ListHymnsUpdatedSince).await?;
        let state = self.state.read().await;
        Ok(Self::sorted(
            state
                .hymns
                .values()
                .filter(|h| h.updated_at > since)
                .cloned(),
        ))
    }

    async fn get_hymn(&self, id: &RemoteId) -> RemoteResult<Option<HymnRecord>> {
        self.enter(RemoteOperation::GetHymn).await?;
        Ok(self.state.read().await.hymns.get(id).cloned())
    }

    async fn find_hymn_by_number(&self, number: u32) -> RemoteResult<Option<HymnRecord>> {
        self.enter(RemoteOperation::GetHymn).await?;
        let state = self.state.read().await;
        let key = HymnKey::Number(number);
        Ok(state.hymns.values().find(|h| h.matches(&key)).cloned())
    }

    async fn update_hymn(&self, id: &RemoteId, patch: &HymnPatch) -> RemoteResult<HymnRecord> {
        self.enter(RemoteOperation::UpdateHymn).await?;
        let mut state = self.state.write().await;
        let hymn = state
            .hymns
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;

        hymn.apply_patch(patch);
        // Server-side stamp; never moves backwards for a record
        hymn.updated_at = Timestamp::now().later_of(hymn.updated_at);
        Ok(hymn.clone())
    }

    async fn get_user_document(
        &self,
        collection: UserCollection,
        user: &UserId,
    ) -> RemoteResult<Option<Value>> {
        self.enter(RemoteOperation::GetUserDocument).await?;
        Ok(self.user_document(collection, user).await)
    }

    async fn set_user_document(
        &self,
        collection: UserCollection,
        user: &UserId,
        document: &Value,
        merge: bool,
    ) -> RemoteResult<()> {
        self.enter(RemoteOperation::SetUserDocument).await?;
        let mut state = self.state.write().await;
        let key = (collection, user.clone());
        match state.documents.get_mut(&key) {
            Some(existing) if merge => merge_documents(existing, document),
            _ => {
                state.documents.insert(key, document.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hymn(id: &str, number: u32, millis: i64) -> HymnRecord {
        let mut h = HymnRecord::new(id, number, format!("Hymn {}", number));
        h.updated_at = Timestamp::from_millis(millis);
        h
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_number() {
        let store = MemoryRemoteStore::with_hymns(vec![hymn("z", 3, 1), hymn("a", 1, 1), hymn("m", 2, 1)]).await;
        let numbers: Vec<u32> = store.list_hymns().await.unwrap().iter().map(|h| h.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_updated_since_is_strict() {
        let store = MemoryRemoteStore::with_hymns(vec![hymn("a", 1, 100), hymn("b", 2, 200)]).await;

        let delta = store
            .list_hymns_updated_since(Timestamp::from_millis(100))
            .await
            .unwrap();
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].remote_id.as_str(), "b");
    }

    #[tokio::test]
    async fn test_update_stamps_time() {
        let store = MemoryRemoteStore::with_hymns(vec![hymn("a", 1, 100)]).await;
        let before = Timestamp::now();

        let updated = store
            .update_hymn(&RemoteId::new("a"), &HymnPatch::new().with_title("Renamed"))
            .await
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert!(updated.updated_at >= before);
        assert_eq!(store.hymn(&RemoteId::new("a")).await.unwrap().title, "Renamed");

        let err = store
            .update_hymn(&RemoteId::new("ghost"), &HymnPatch::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_user_documents_merge_and_replace() {
        let store = MemoryRemoteStore::new();
        let user = UserId::new("u1");

        assert!(store
            .get_user_document(UserCollection::Preferences, &user)
            .await
            .unwrap()
            .is_none());

        store
            .set_user_document(UserCollection::Preferences, &user, &json!({"a": 1}), true)
            .await
            .unwrap();
        store
            .set_user_document(UserCollection::Preferences, &user, &json!({"b": 2}), true)
            .await
            .unwrap();
        assert_eq!(
            store.user_document(UserCollection::Preferences, &user).await,
            Some(json!({"a": 1, "b": 2}))
        );

        store
            .set_user_document(UserCollection::Preferences, &user, &json!({"c": 3}), false)
            .await
            .unwrap();
        assert_eq!(
            store.user_document(UserCollection::Preferences, &user).await,
            Some(json!({"c": 3}))
        );
    }

    #[tokio::test]
    async fn test_failure_injection_and_counts() {
        let store = MemoryRemoteStore::with_hymns(vec![hymn("a", 1, 1)]).await;

        store.set_failing(RemoteOperation::ListHymns, true).await;
        assert!(store.list_hymns().await.unwrap_err().is_transient());
        assert!(store.get_hymn(&RemoteId::new("a")).await.unwrap().is_some());

        store.set_failing(RemoteOperation::ListHymns, false).await;
        store.set_unreachable(true).await;
        assert!(store.get_hymn(&RemoteId::new("a")).await.is_err());

        assert_eq!(store.call_count(RemoteOperation::ListHymns).await, 1);
        assert_eq!(store.call_count(RemoteOperation::GetHymn).await, 2);
        assert_eq!(store.total_calls().await, 3);
    }

    #[tokio::test]
    async fn test_find_by_number() {
        let store = MemoryRemoteStore::with_hymns(vec![hymn("a", 7, 1)]).await;
        assert_eq!(
            store.find_hymn_by_number(7).await.unwrap().unwrap().remote_id.as_str(),
            "a"
        );
        assert!(store.find_hymn_by_number(8).await.unwrap().is_none());
    }
}
