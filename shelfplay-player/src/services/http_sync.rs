//! Server progress sync clients
//!
//! `HttpProgressSync` talks to the progress server over JSON;
//! `OfflineProgressSync` stands in when no server is configured.

use super::{ProgressSync, SessionSyncPayload};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use shelfplay_common::events::PositionReport;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("shelfplay/", env!("CARGO_PKG_VERSION"));

/// Server-side progress for one library item
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaProgress {
    current_time: f64,
    /// Unix milliseconds
    last_update: i64,
}

/// reqwest-backed [`ProgressSync`]
pub struct HttpProgressSync {
    http_client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpProgressSync {
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Sync(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ProgressSync for HttpProgressSync {
    async fn fetch_latest_progress(&self, library_item_id: &str) -> Result<Option<PositionReport>> {
        let url = format!("{}/api/me/progress/{}", self.base_url, library_item_id);
        debug!(url = %url, "Fetching server progress");

        let response = self.authorized(self.http_client.get(&url)).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Sync(format!(
                "Progress fetch failed ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let progress: MediaProgress = response.json().await?;
        let updated_at = shelfplay_common::time::from_unix_millis(progress.last_update)
            .ok_or_else(|| Error::Sync(format!("Invalid lastUpdate {}", progress.last_update)))?;

        Ok(Some(PositionReport {
            position: progress.current_time.max(0.0),
            updated_at,
        }))
    }

    async fn push_session(&self, payload: &SessionSyncPayload) -> Result<()> {
        let url = format!("{}/api/session/{}/sync", self.base_url, payload.session_id);
        debug!(url = %url, position = payload.current_time, "Pushing session");

        let response = self
            .authorized(self.http_client.post(&url))
            .json(payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Sync(format!(
                "Session sync failed ({}): {}",
                status.as_u16(),
                error_text
            )));
        }
        Ok(())
    }
}

/// [`ProgressSync`] used when no server is configured
///
/// Reports no server progress and fails every push.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProgressSync;

#[async_trait]
impl ProgressSync for OfflineProgressSync {
    async fn fetch_latest_progress(&self, _library_item_id: &str) -> Result<Option<PositionReport>> {
        Ok(None)
    }

    async fn push_session(&self, _payload: &SessionSyncPayload) -> Result<()> {
        Err(Error::Sync("offline: no progress server configured".to_string()))
    }
}
