//! State Context
//!
//! The single authoritative snapshot of playback. Owned by the coordinator,
//! replaced wholesale after each processed event, handed out to everyone
//! else as `Arc<StateContext>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfplay_common::events::{
    Chapter, PersistedPlayerState, PlayerEventType, PlayerState, ReconciliationSource,
    TrackDescriptor,
};

/// Most recent failure that forced the machine into an error state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerErrorInfo {
    pub message: String,
    pub code: Option<String>,
    /// Whether this escalated to `fatal_error`
    pub fatal: bool,
    /// Event being handled when the failure occurred
    pub event: PlayerEventType,
    pub occurred_at: DateTime<Utc>,
}

/// Pending "position jumped" notification with its undo target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionJumpNotice {
    pub previous_position: f64,
    pub new_position: f64,
    pub source: ReconciliationSource,
    pub raised_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PositionJumpNotice {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Authoritative playback snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateContext {
    pub current_state: PlayerState,
    pub previous_state: Option<PlayerState>,
    pub current_track: Option<TrackDescriptor>,
    /// Seconds into the current track
    pub position: f64,
    pub duration: f64,
    pub playback_rate: f64,
    pub volume: f64,
    pub session_id: Option<String>,
    pub session_started_at: Option<DateTime<Utc>>,
    /// Listened seconds accumulated in the current session
    pub time_listened: f64,
    pub current_chapter: Option<Chapter>,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub is_seeking: bool,
    pub is_loading_track: bool,
    pub last_server_sync: Option<DateTime<Utc>>,
    pub pending_sync_position: Option<f64>,
    pub last_error: Option<PlayerErrorInfo>,
    pub position_jump: Option<PositionJumpNotice>,
    /// Last time audio was actually advancing; drives smart rewind
    pub last_playback_activity: Option<DateTime<Utc>>,
    pub backgrounded_at: Option<DateTime<Utc>>,
    /// Consecutive native-engine failures since playback last advanced
    pub native_failure_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl Default for StateContext {
    fn default() -> Self {
        Self {
            current_state: PlayerState::Idle,
            previous_state: None,
            current_track: None,
            position: 0.0,
            duration: 0.0,
            playback_rate: 1.0,
            volume: 1.0,
            session_id: None,
            session_started_at: None,
            time_listened: 0.0,
            current_chapter: None,
            is_playing: false,
            is_buffering: false,
            is_seeking: false,
            is_loading_track: false,
            last_server_sync: None,
            pending_sync_position: None,
            last_error: None,
            position_jump: None,
            last_playback_activity: None,
            backgrounded_at: None,
            native_failure_count: 0,
            updated_at: shelfplay_common::time::now(),
        }
    }
}

impl StateContext {
    /// Clamp a position into `[0, duration]`
    ///
    /// With no known duration only the lower bound applies.
    pub fn clamp_position(&self, position: f64) -> f64 {
        let position = if position.is_finite() { position.max(0.0) } else { 0.0 };
        if self.duration > 0.0 {
            position.min(self.duration)
        } else {
            position
        }
    }

    /// Idle defaults, keeping listener preferences (rate and volume)
    pub fn reset_to_idle(&mut self) {
        let preserved = StateContext {
            current_state: self.current_state,
            previous_state: self.previous_state,
            playback_rate: self.playback_rate,
            volume: self.volume,
            ..StateContext::default()
        };
        *self = preserved;
    }

    /// Snapshot written to the persisted player-state blob
    pub fn to_persisted(&self) -> PersistedPlayerState {
        PersistedPlayerState {
            current_track: self.current_track.clone(),
            position: self.position,
            playback_rate: self.playback_rate,
            volume: self.volume,
            is_playing: self.is_playing,
            current_play_session_id: self.session_id.clone(),
            saved_at: shelfplay_common::time::now(),
        }
    }

    /// Chapter containing the current position
    pub fn chapter_at_position(&self) -> Option<Chapter> {
        self.current_track
            .as_ref()
            .and_then(|t| t.chapter_at(self.position))
            .cloned()
    }
}
