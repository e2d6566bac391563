//! Remote Store over a JSON/REST document backend
//!
//! Layout of the backend:
//!
//! | Operation | Request |
//! |---|---|
//! | list hymns | `GET {base}/hymns?orderBy=number` |
//! | delta | `GET {base}/hymns?updatedSince={iso}` |
//! | by number | `GET {base}/hymns?number={n}` |
//! | one hymn | `GET {base}/hymns/{id}` |
//! | edit | `PATCH {base}/hymns/{id}` |
//! | user document | `GET` / `PUT` (replace) / `PATCH` (merge) `{base}/users/{user}/{collection}` |

use crate::traits::{RemoteStore, UserCollection};
use crate::{RemoteError, RemoteResult};
use async_trait::async_trait;
use hymnal_core::{HymnPatch, HymnRecord, RemoteId, Timestamp, UserId};
use hymnal_network::{Client, Method, NetworkError};
use reqwest::Url;
use serde_json::Value;

/// Remote Store backed by HTTP
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
}

impl HttpRemoteStore {
    /// Creates a store rooted at `base_url`
    pub fn new(client: Client, base_url: &str) -> RemoteResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Network(NetworkError::InvalidUrl(format!("{}: {}", base_url, e))))?;

        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Network(NetworkError::InvalidUrl(
                base_url.to_string(),
            )));
        }

        Ok(Self { client, base_url })
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> RemoteResult<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Network(NetworkError::InvalidUrl(self.base_url.to_string())))?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.to_string())
    }

    async fn fetch_hymns(&self, query: &[(&str, String)]) -> RemoteResult<Vec<HymnRecord>> {
        let url = self.url(&["hymns"], query)?;
        let mut hymns: Vec<HymnRecord> = self.client.get_json(&url).await?;
        for hymn in &mut hymns {
            hymn.normalize();
        }
        hymns.sort_by_key(|h| h.number);
        Ok(hymns)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn list_hymns(&self) -> RemoteResult<Vec<HymnRecord>> {
        self.fetch_hymns(&[("orderBy", "number".to_string())]).await
    }

    async fn list_hymns_updated_since(&self, since: Timestamp) -> RemoteResult<Vec<HymnRecord>> {
        let hymns = self
            .fetch_hymns(&[("updatedSince", since.to_iso8601())])
            .await?;

        // The filter is strict even if the backend compares inclusively
        Ok(hymns.into_iter().filter(|h| h.updated_at > since).collect())
    }

    async fn get_hymn(&self, id: &RemoteId) -> RemoteResult<Option<HymnRecord>> {
        let url = self.url(&["hymns", id.as_str()], &[])?;
        match self.client.get_json::<HymnRecord>(&url).await {
            Ok(mut hymn) => {
                hymn.normalize();
                Ok(Some(hymn))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_hymn_by_number(&self, number: u32) -> RemoteResult<Option<HymnRecord>> {
        let hymns = self.fetch_hymns(&[("number", number.to_string())]).await?;
        Ok(hymns.into_iter().find(|h| h.number == number))
    }

    async fn update_hymn(&self, id: &RemoteId, patch: &HymnPatch) -> RemoteResult<HymnRecord> {
        let url = self.url(&["hymns", id.as_str()], &[])?;
        match self
            .client
            .send_json::<_, HymnRecord>(Method::PATCH, &url, patch)
            .await
        {
            Ok(mut hymn) => {
                hymn.normalize();
                Ok(hymn)
            }
            Err(e) if e.is_not_found() => Err(RemoteError::NotFound(id.to_string())),
            Err(e) if e.is_client_error() => Err(RemoteError::Rejected(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user_document(
        &self,
        collection: UserCollection,
        user: &UserId,
    ) -> RemoteResult<Option<Value>> {
        let url = self.url(&["users", user.as_str(), collection.as_str()], &[])?;
        match self.client.get_json::<Value>(&url).await {
            Ok(Value::Null) => Ok(None),
            Ok(document) => Ok(Some(document)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_user_document(
        &self,
        collection: UserCollection,
        user: &UserId,
        document: &Value,
        merge: bool,
    ) -> RemoteResult<()> {
        let url = self.url(&["users", user.as_str(), collection.as_str()], &[])?;
        let method = if merge { Method::PATCH } else { Method::PUT };
        self.client
            .send_json::<_, Value>(method, &url, document)
            .await?;
        log::debug!("Wrote {} document for {}", collection, user);
        Ok(())
    }
}
