//! Player and native-engine state enumerations

use serde::{Deserialize, Serialize};

/// Coordinator state
///
/// Exactly one is active at any instant. Serialized in snake_case
/// (`syncing_position`, `fatal_error`, ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Seeking,
    Buffering,
    Stopping,
    Error,
    FatalError,
    Restoring,
    SyncingPosition,
    SyncingSession,
}

impl PlayerState {
    /// Every state, in declaration order
    pub const ALL: [PlayerState; 13] = [
        PlayerState::Idle,
        PlayerState::Loading,
        PlayerState::Ready,
        PlayerState::Playing,
        PlayerState::Paused,
        PlayerState::Seeking,
        PlayerState::Buffering,
        PlayerState::Stopping,
        PlayerState::Error,
        PlayerState::FatalError,
        PlayerState::Restoring,
        PlayerState::SyncingPosition,
        PlayerState::SyncingSession,
    ];

    /// States in which a track must be loaded
    pub fn requires_track(&self) -> bool {
        matches!(
            self,
            PlayerState::Ready
                | PlayerState::Playing
                | PlayerState::Paused
                | PlayerState::Seeking
                | PlayerState::Buffering
        )
    }

    /// Either of the two error states
    pub fn is_error(&self) -> bool {
        matches!(self, PlayerState::Error | PlayerState::FatalError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Loading => "loading",
            PlayerState::Ready => "ready",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Seeking => "seeking",
            PlayerState::Buffering => "buffering",
            PlayerState::Stopping => "stopping",
            PlayerState::Error => "error",
            PlayerState::FatalError => "fatal_error",
            PlayerState::Restoring => "restoring",
            PlayerState::SyncingPosition => "syncing_position",
            PlayerState::SyncingSession => "syncing_session",
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State reported by the native audio engine in NATIVE_STATE_CHANGED
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NativePlaybackState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Buffering,
    Stopped,
    /// Reached the end of the loaded track
    Ended,
}

impl std::fmt::Display for NativePlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NativePlaybackState::Idle => "idle",
            NativePlaybackState::Loading => "loading",
            NativePlaybackState::Ready => "ready",
            NativePlaybackState::Playing => "playing",
            NativePlaybackState::Paused => "paused",
            NativePlaybackState::Buffering => "buffering",
            NativePlaybackState::Stopped => "stopped",
            NativePlaybackState::Ended => "ended",
        };
        f.write_str(s)
    }
}
