//! Collaborator seams
//!
//! The coordinator talks to the outside world only through these traits:
//! the native audio engine, the local session log, the server progress
//! sync client and the persisted player-state blob. Concrete adapters live
//! in `db` (SQLite), `http_sync` (reqwest) and `simulated_engine`.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfplay_common::events::{PersistedPlayerState, PositionReport, TrackDescriptor};

pub mod http_sync;
pub mod simulated_engine;

pub use http_sync::{HttpProgressSync, OfflineProgressSync};
pub use simulated_engine::SimulatedNativeEngine;

/// Native audio engine command surface
///
/// Commands are acknowledged asynchronously; state changes come back as
/// `NATIVE_*` events through the Event Bus, never as return values.
#[async_trait]
pub trait NativeAudioEngine: Send + Sync {
    /// Prepare `track` at `start_position` seconds, paused
    async fn load(&self, track: &TrackDescriptor, start_position: f64) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn seek(&self, position: f64) -> Result<()>;

    async fn set_rate(&self, rate: f64) -> Result<()>;

    async fn set_volume(&self, volume: f64) -> Result<()>;

    /// Position the engine currently reports, if a track is loaded
    async fn position(&self) -> Option<f64>;
}

/// Local session log key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub user_id: String,
    pub library_item_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, library_item_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            library_item_id: library_item_id.into(),
        }
    }
}

/// One listening session as stored in the local log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub library_item_id: String,
    pub episode_id: Option<String>,
    pub title: String,
    pub position: f64,
    pub time_listened: f64,
    pub playback_rate: f64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Position report used as the local reconciliation candidate
    pub fn as_report(&self) -> PositionReport {
        PositionReport {
            position: self.position,
            updated_at: self.updated_at,
        }
    }
}

/// Local session log
#[async_trait]
pub trait SessionLog: Send + Sync {
    /// Open a new session for `track`
    async fn start_session(
        &self,
        key: &SessionKey,
        track: &TrackDescriptor,
        position: f64,
        playback_rate: f64,
    ) -> Result<SessionRecord>;

    async fn update_session(&self, session_id: &str, position: f64, time_listened: f64)
        -> Result<()>;

    async fn end_session(&self, session_id: &str, position: f64) -> Result<()>;

    /// Most recently updated session that has not been ended
    async fn latest_open_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>>;
}

/// Body pushed to the progress server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSyncPayload {
    #[serde(skip)]
    pub session_id: String,
    pub current_time: f64,
    pub time_listened: f64,
    pub duration: f64,
}

/// Server progress sync client
#[async_trait]
pub trait ProgressSync: Send + Sync {
    /// Latest server-side progress for an item; `None` when the server has none
    async fn fetch_latest_progress(&self, library_item_id: &str) -> Result<Option<PositionReport>>;

    async fn push_session(&self, payload: &SessionSyncPayload) -> Result<()>;
}

/// Persisted player-state blob
#[async_trait]
pub trait PlayerStateStore: Send + Sync {
    async fn save(&self, state: &PersistedPlayerState) -> Result<()>;

    async fn load(&self) -> Result<Option<PersistedPlayerState>>;

    async fn clear(&self) -> Result<()>;
}
