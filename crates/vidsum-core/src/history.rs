use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{auth::TokenProvider, error::HistoryError, store::LocalStore, types::HistoryItem};

/// Most records the bounded local store keeps. Enforced on insert only: a
/// sync may leave more when the cloud side holds more.
pub const LOCAL_HISTORY_CAP: usize = 50;

/// Reconciles the device-bound local history with the account-bound cloud
/// store using last-write-wins keyed by [`HistoryItem::merge_key`].
pub struct HistorySync {
    store: LocalStore,
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HistorySync {
    pub fn new(store: LocalStore, base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            store,
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/history", self.base_url)
    }

    pub async fn local(&self) -> Result<Vec<HistoryItem>, HistoryError> {
        self.store.load().await
    }

    /// Stamps `created_at` (and an id when absent) and inserts the record at
    /// the front of the local list, evicting past the cap. Never touches the
    /// cloud store.
    pub async fn add_local(&self, mut item: HistoryItem) -> Result<HistoryItem, HistoryError> {
        item.created_at = Some(Utc::now());
        if item.id.is_none() {
            item.id = Some(Uuid::new_v4().to_string());
        }
        let mut items = self.store.load().await?;
        items.insert(0, item.clone());
        items.truncate(LOCAL_HISTORY_CAP);
        self.store.save(&items).await?;
        Ok(item)
    }

    /// Reconcile local and cloud history and return the merged view.
    ///
    /// Without a session token (or on a not-authenticated response) the call
    /// is local-only. Every other remote failure degrades to returning the
    /// pre-sync local list unchanged — sync never destroys local data.
    /// Overlapping `sync` calls against the same store are not serialized
    /// here; callers should avoid them.
    pub async fn sync(&self) -> Result<Vec<HistoryItem>, HistoryError> {
        let local = self.store.load().await?;
        let Some(token) = self.tokens.bearer_token().await else {
            debug!("no session token, keeping history local-only");
            return Ok(local);
        };
        match self.sync_against_remote(&local, &token).await {
            Ok(merged) => Ok(merged),
            Err(e) => {
                warn!("history sync failed, keeping local history: {e}");
                Ok(local)
            }
        }
    }

    async fn sync_against_remote(
        &self,
        local: &[HistoryItem],
        token: &str,
    ) -> Result<Vec<HistoryItem>, HistoryError> {
        let resp = self
            .http
            .get(self.endpoint())
            .bearer_auth(token)
            .send()
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            debug!("history fetch unauthorized, keeping history local-only");
            return Ok(local.to_vec());
        }
        if !resp.status().is_success() {
            return Err(HistoryError::Status {
                status: resp.status(),
            });
        }
        let remote: Vec<HistoryItem> = resp.json().await?;

        let (merged, to_upload) = merge(local, remote);

        if !to_upload.is_empty() {
            // A failed upload does not abort the merge; the merged view is
            // still authoritative for this call.
            match self
                .http
                .post(self.endpoint())
                .bearer_auth(token)
                .json(&to_upload)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    debug!("uploaded {} history records", to_upload.len());
                }
                Ok(resp) => warn!("history upload returned {}", resp.status()),
                Err(e) => warn!("history upload failed: {e}"),
            }
        }

        self.store.save(&merged).await?;
        Ok(merged)
    }

    /// Remote delete first (a not-found response already is the desired end
    /// state), then local removal by `id`. A transport error is propagated,
    /// but only after the local removal has been persisted.
    pub async fn delete_item(&self, id: &str) -> Result<Vec<HistoryItem>, HistoryError> {
        let transport_err = self.delete_remote(id).await.err();

        let mut items = self.store.load().await?;
        items.retain(|item| item.id.as_deref() != Some(id));
        self.store.save(&items).await?;

        match transport_err {
            Some(e) => Err(e),
            None => Ok(items),
        }
    }

    async fn delete_remote(&self, id: &str) -> Result<(), HistoryError> {
        let mut req = self.http.delete(format!("{}/{}", self.endpoint(), id));
        if let Some(token) = self.tokens.bearer_token().await {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            warn!("remote history delete returned {status}");
        }
        Ok(())
    }

    /// Drop all local records. The cloud store is untouched.
    pub async fn clear(&self) -> Result<(), HistoryError> {
        self.store.save(&[]).await
    }
}

fn stamp(item: &HistoryItem) -> DateTime<Utc> {
    item.created_at.unwrap_or(DateTime::UNIX_EPOCH)
}

/// Last-write-wins merge keyed by `(video_url, mode, focus)`.
///
/// The map is seeded with every cloud record; a local record wins only when
/// strictly newer (ties keep the cloud version) or new to the cloud, and in
/// both cases it is queued for upload. Returns the merged view sorted newest
/// first alongside the upload queue.
pub fn merge(local: &[HistoryItem], remote: Vec<HistoryItem>) -> (Vec<HistoryItem>, Vec<HistoryItem>) {
    let mut by_key: HashMap<String, HistoryItem> = HashMap::new();
    for item in remote {
        by_key.insert(item.merge_key(), item);
    }

    let mut to_upload = Vec::new();
    for item in local {
        let key = item.merge_key();
        match by_key.get(&key) {
            None => {
                to_upload.push(item.clone());
                by_key.insert(key, item.clone());
            }
            Some(existing) if stamp(item) > stamp(existing) => {
                to_upload.push(item.clone());
                by_key.insert(key, item.clone());
            }
            Some(_) => {}
        }
    }

    let mut merged: Vec<HistoryItem> = by_key.into_values().collect();
    merged.sort_by_key(|item| std::cmp::Reverse(stamp(item)));
    (merged, to_upload)
}
