//! Remote Store configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend endpoint and request behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,

    /// Opaque credential sent as a bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub timeout_secs: u64,

    /// Attempts per request, the first included
    pub retry_attempts: usize,

    /// Endpoints probed to decide whether the device is online
    pub probe_urls: Vec<String>,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.hymnal.app/v1".to_string(),
            api_key: None,
            timeout_secs: 30,
            retry_attempts: 3,
            probe_urls: vec![
                "https://www.google.com".to_string(),
                "https://www.cloudflare.com".to_string(),
            ],
        }
    }
}

impl ConfigSection for RemoteConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::http_url(&self.base_url, "remote.base_url"),
            Validator::in_range(self.timeout_secs, 1, 300, "remote.timeout_secs"),
            Validator::in_range(self.retry_attempts, 1, 10, "remote.retry_attempts"),
        ];

        for (i, url) in self.probe_urls.iter().enumerate() {
            results.push(Validator::http_url(url, &format!("remote.probe_urls[{}]", i)));
        }

        if let Some(key) = &self.api_key {
            results.push(Validator::not_empty(key, "remote.api_key"));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.base_url = other.base_url;
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        self.timeout_secs = other.timeout_secs;
        self.retry_attempts = other.retry_attempts;
        self.probe_urls = other.probe_urls;
    }

    fn section_name(&self) -> &'static str {
        "remote"
    }
}
