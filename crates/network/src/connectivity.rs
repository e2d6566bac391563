// crates/network/src/connectivity.rs
//! Network state monitoring

use crate::client::Client;
use crate::error::{NetworkError, NetworkResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Reports whether remote operations can currently be attempted
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Returns true if the device is online
    async fn is_online(&self) -> bool;

    /// Returns an error if the device is offline
    async fn check(&self) -> NetworkResult<()> {
        if self.is_online().await {
            Ok(())
        } else {
            Err(NetworkError::NetworkUnavailable)
        }
    }
}

/// Connectivity checker that probes a list of URLs
///
/// A probe result is reused for `cache_ttl` so that a burst of sync calls
/// does not issue a burst of probes.
#[derive(Clone)]
pub struct ConnectivityChecker {
    client: Client,
    check_urls: Vec<String>,
    cache_ttl: Duration,
    last: Arc<Mutex<Option<(Instant, bool)>>>,
}

impl ConnectivityChecker {
    /// Creates a new connectivity checker with default URLs
    pub fn new(client: Client) -> Self {
        Self::with_urls(
            client,
            vec![
                "https://www.google.com".to_string(),
                "https://www.cloudflare.com".to_string(),
            ],
        )
    }

    /// Creates a connectivity checker with custom URLs
    pub fn with_urls(client: Client, urls: Vec<String>) -> Self {
        Self {
            client,
            check_urls: urls,
            cache_ttl: Duration::from_secs(5),
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Sets how long a probe result is trusted
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Forgets the cached probe result
    pub async fn invalidate(&self) {
        *self.last.lock().await = None;
    }

    async fn probe(&self) -> bool {
        for url in &self.check_urls {
            if self.client.is_accessible(url).await {
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl NetworkMonitor for ConnectivityChecker {
    async fn is_online(&self) -> bool {
        let mut last = self.last.lock().await;
        if let Some((at, online)) = *last {
            if at.elapsed() < self.cache_ttl {
                return online;
            }
        }

        let online = self.probe().await;
        if !online {
            log::info!("Connectivity probe failed; treating device as offline");
        }
        *last = Some((Instant::now(), online));
        online
    }
}

/// Connectivity state set explicitly by the host platform
///
/// Mobile platforms push reachability changes; the host flips this flag from
/// those notifications. Clones share the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag {
    online: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            log::info!("Network is now {}", if online { "online" } else { "offline" });
        }
    }

    pub fn get(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl NetworkMonitor for ConnectivityFlag {
    async fn is_online(&self) -> bool {
        self.get()
    }
}
