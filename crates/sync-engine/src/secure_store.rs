// crates/sync-engine/src/secure_store.rs
//! Secure key/value storage seam
//!
//! Favorites and recent lists live here, one entry per user and list. On a
//! device the host supplies the platform keystore; [`SqliteSecureStorage`]
//! keeps entries in the Local Store and [`MemorySecureStorage`] in process.

use crate::SyncResult;
use async_trait::async_trait;
use hymnal_database::queries::{delete_secure_value, get_secure_value, set_secure_value};
use hymnal_database::DbPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait SecureStorage: Send + Sync {
    async fn get(&self, key: &str) -> SyncResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> SyncResult<()>;

    /// Removes an entry; removing a missing key succeeds
    async fn delete(&self, key: &str) -> SyncResult<()>;
}

/// Secure storage held in memory; clones share entries
#[derive(Debug, Clone, Default)]
pub struct MemorySecureStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySecureStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl SecureStorage for MemorySecureStorage {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> SyncResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Secure storage backed by the Local Store's `secure_kv` table
#[derive(Clone)]
pub struct SqliteSecureStorage {
    pool: DbPool,
}

impl SqliteSecureStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecureStorage for SqliteSecureStorage {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(get_secure_value(&self.pool, key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        Ok(set_secure_value(&self.pool, key, value).await?)
    }

    async fn delete(&self, key: &str) -> SyncResult<()> {
        Ok(delete_secure_value(&self.pool, key).await?)
    }
}
