//! Event types for the shelfplay player coordinator
//!
//! `PlayerEvent` is the closed set of everything that can reach the
//! coordinator: user commands, native-engine callbacks, session and sync
//! notifications, app-lifecycle transitions and coordinator-internal
//! follow-ups. `PlayerEventType` is its fieldless discriminant, used as the
//! Transition Table key and in diagnostics.

// Sub-modules (supporting types)
mod reconcile_types;
mod state_types;
mod track_types;

pub use reconcile_types::{PositionReport, ReconciliationOutcome, ReconciliationSource};
pub use state_types::{NativePlaybackState, PlayerState};
pub use track_types::{Chapter, PersistedPlayerState, TrackDescriptor};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Player events
///
/// Immutable once created; each variant carries only what its handler needs.
/// Serialized with a `type` tag in SCREAMING_SNAKE_CASE and camelCase fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum PlayerEvent {
    // ---- user commands ----
    /// Load a track, replacing whatever is loaded
    LoadTrack {
        track: TrackDescriptor,
        /// Start offset in seconds (defaults to 0)
        #[serde(default)]
        start_position: Option<f64>,
        /// Enqueue PLAY as soon as the load has been issued
        #[serde(default)]
        auto_play: bool,
    },
    Play,
    Pause,
    Stop,
    Seek {
        position: f64,
    },
    SetRate {
        rate: f64,
    },
    SetVolume {
        volume: f64,
    },
    /// Skip ahead; `None` uses the configured jump length
    JumpForward {
        #[serde(default)]
        seconds: Option<f64>,
    },
    JumpBackward {
        #[serde(default)]
        seconds: Option<f64>,
    },

    // ---- native engine callbacks ----
    NativeStateChanged {
        state: NativePlaybackState,
    },
    NativeProgressUpdated {
        position: f64,
        duration: f64,
        #[serde(default)]
        buffered: Option<f64>,
    },
    NativeTrackChanged {
        track: Option<TrackDescriptor>,
    },
    NativeError {
        message: String,
    },
    NativePlaybackError {
        code: String,
        message: String,
    },

    // ---- session log / server sync ----
    SessionCreated {
        session_id: String,
        started_at: DateTime<Utc>,
    },
    SessionUpdated {
        session_id: String,
        position: f64,
        time_listened: f64,
    },
    SessionEnded {
        session_id: String,
    },
    SessionSyncStarted {
        session_id: String,
        position: f64,
    },
    SessionSyncCompleted {
        session_id: String,
        position: f64,
        synced_at: DateTime<Utc>,
    },
    SessionSyncFailed {
        session_id: String,
        error: String,
    },

    // ---- app lifecycle ----
    AppForegrounded,
    AppBackgrounded,
    /// Seed from the persisted blob read at cold start
    RestoreState {
        snapshot: Option<PersistedPlayerState>,
    },
    RestoreComplete,

    // ---- internal follow-ups ----
    PositionReconciled {
        outcome: ReconciliationOutcome,
    },
    ChapterChanged {
        chapter: Option<Chapter>,
    },
    BufferingStarted,
    BufferingEnded,
    SeekComplete {
        position: f64,
    },
    /// Reload the native queue, optionally with a replacement descriptor
    /// (e.g. a finished download replacing a stream)
    ReloadQueue {
        track: Option<TrackDescriptor>,
    },
    QueueReloaded,
    UndoPositionJump,
    DismissPositionJump,
}

impl PlayerEvent {
    /// Fieldless discriminant
    pub fn event_type(&self) -> PlayerEventType {
        match self {
            PlayerEvent::LoadTrack { .. } => PlayerEventType::LoadTrack,
            PlayerEvent::Play => PlayerEventType::Play,
            PlayerEvent::Pause => PlayerEventType::Pause,
            PlayerEvent::Stop => PlayerEventType::Stop,
            PlayerEvent::Seek { .. } => PlayerEventType::Seek,
            PlayerEvent::SetRate { .. } => PlayerEventType::SetRate,
            PlayerEvent::SetVolume { .. } => PlayerEventType::SetVolume,
            PlayerEvent::JumpForward { .. } => PlayerEventType::JumpForward,
            PlayerEvent::JumpBackward { .. } => PlayerEventType::JumpBackward,
            PlayerEvent::NativeStateChanged { .. } => PlayerEventType::NativeStateChanged,
            PlayerEvent::NativeProgressUpdated { .. } => PlayerEventType::NativeProgressUpdated,
            PlayerEvent::NativeTrackChanged { .. } => PlayerEventType::NativeTrackChanged,
            PlayerEvent::NativeError { .. } => PlayerEventType::NativeError,
            PlayerEvent::NativePlaybackError { .. } => PlayerEventType::NativePlaybackError,
            PlayerEvent::SessionCreated { .. } => PlayerEventType::SessionCreated,
            PlayerEvent::SessionUpdated { .. } => PlayerEventType::SessionUpdated,
            PlayerEvent::SessionEnded { .. } => PlayerEventType::SessionEnded,
            PlayerEvent::SessionSyncStarted { .. } => PlayerEventType::SessionSyncStarted,
            PlayerEvent::SessionSyncCompleted { .. } => PlayerEventType::SessionSyncCompleted,
            PlayerEvent::SessionSyncFailed { .. } => PlayerEventType::SessionSyncFailed,
            PlayerEvent::AppForegrounded => PlayerEventType::AppForegrounded,
            PlayerEvent::AppBackgrounded => PlayerEventType::AppBackgrounded,
            PlayerEvent::RestoreState { .. } => PlayerEventType::RestoreState,
            PlayerEvent::RestoreComplete => PlayerEventType::RestoreComplete,
            PlayerEvent::PositionReconciled { .. } => PlayerEventType::PositionReconciled,
            PlayerEvent::ChapterChanged { .. } => PlayerEventType::ChapterChanged,
            PlayerEvent::BufferingStarted => PlayerEventType::BufferingStarted,
            PlayerEvent::BufferingEnded => PlayerEventType::BufferingEnded,
            PlayerEvent::SeekComplete { .. } => PlayerEventType::SeekComplete,
            PlayerEvent::ReloadQueue { .. } => PlayerEventType::ReloadQueue,
            PlayerEvent::QueueReloaded => PlayerEventType::QueueReloaded,
            PlayerEvent::UndoPositionJump => PlayerEventType::UndoPositionJump,
            PlayerEvent::DismissPositionJump => PlayerEventType::DismissPositionJump,
        }
    }
}

/// Where an event type originates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Command,
    Native,
    Session,
    Lifecycle,
    Internal,
}

/// Fieldless mirror of `PlayerEvent`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerEventType {
    LoadTrack,
    Play,
    Pause,
    Stop,
    Seek,
    SetRate,
    SetVolume,
    JumpForward,
    JumpBackward,
    NativeStateChanged,
    NativeProgressUpdated,
    NativeTrackChanged,
    NativeError,
    NativePlaybackError,
    SessionCreated,
    SessionUpdated,
    SessionEnded,
    SessionSyncStarted,
    SessionSyncCompleted,
    SessionSyncFailed,
    AppForegrounded,
    AppBackgrounded,
    RestoreState,
    RestoreComplete,
    PositionReconciled,
    ChapterChanged,
    BufferingStarted,
    BufferingEnded,
    SeekComplete,
    ReloadQueue,
    QueueReloaded,
    UndoPositionJump,
    DismissPositionJump,
}

impl PlayerEventType {
    /// Every event type, in declaration order
    pub const ALL: [PlayerEventType; 33] = [
        PlayerEventType::LoadTrack,
        PlayerEventType::Play,
        PlayerEventType::Pause,
        PlayerEventType::Stop,
        PlayerEventType::Seek,
        PlayerEventType::SetRate,
        PlayerEventType::SetVolume,
        PlayerEventType::JumpForward,
        PlayerEventType::JumpBackward,
        PlayerEventType::NativeStateChanged,
        PlayerEventType::NativeProgressUpdated,
        PlayerEventType::NativeTrackChanged,
        PlayerEventType::NativeError,
        PlayerEventType::NativePlaybackError,
        PlayerEventType::SessionCreated,
        PlayerEventType::SessionUpdated,
        PlayerEventType::SessionEnded,
        PlayerEventType::SessionSyncStarted,
        PlayerEventType::SessionSyncCompleted,
        PlayerEventType::SessionSyncFailed,
        PlayerEventType::AppForegrounded,
        PlayerEventType::AppBackgrounded,
        PlayerEventType::RestoreState,
        PlayerEventType::RestoreComplete,
        PlayerEventType::PositionReconciled,
        PlayerEventType::ChapterChanged,
        PlayerEventType::BufferingStarted,
        PlayerEventType::BufferingEnded,
        PlayerEventType::SeekComplete,
        PlayerEventType::ReloadQueue,
        PlayerEventType::QueueReloaded,
        PlayerEventType::UndoPositionJump,
        PlayerEventType::DismissPositionJump,
    ];

    /// Valid in every state without ever changing it
    pub fn is_no_op(&self) -> bool {
        matches!(
            self,
            PlayerEventType::NativeProgressUpdated
                | PlayerEventType::SessionUpdated
                | PlayerEventType::ChapterChanged
                | PlayerEventType::UndoPositionJump
                | PlayerEventType::DismissPositionJump
        )
    }

    pub fn category(&self) -> EventCategory {
        use PlayerEventType::*;
        match self {
            LoadTrack | Play | Pause | Stop | Seek | SetRate | SetVolume | JumpForward
            | JumpBackward | UndoPositionJump | DismissPositionJump => EventCategory::Command,
            NativeStateChanged | NativeProgressUpdated | NativeTrackChanged | NativeError
            | NativePlaybackError => EventCategory::Native,
            SessionCreated | SessionUpdated | SessionEnded | SessionSyncStarted
            | SessionSyncCompleted | SessionSyncFailed => EventCategory::Session,
            AppForegrounded | AppBackgrounded | RestoreState | RestoreComplete => {
                EventCategory::Lifecycle
            }
            PositionReconciled | ChapterChanged | BufferingStarted | BufferingEnded
            | SeekComplete | ReloadQueue | QueueReloaded => EventCategory::Internal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use PlayerEventType::*;
        match self {
            LoadTrack => "LOAD_TRACK",
            Play => "PLAY",
            Pause => "PAUSE",
            Stop => "STOP",
            Seek => "SEEK",
            SetRate => "SET_RATE",
            SetVolume => "SET_VOLUME",
            JumpForward => "JUMP_FORWARD",
            JumpBackward => "JUMP_BACKWARD",
            NativeStateChanged => "NATIVE_STATE_CHANGED",
            NativeProgressUpdated => "NATIVE_PROGRESS_UPDATED",
            NativeTrackChanged => "NATIVE_TRACK_CHANGED",
            NativeError => "NATIVE_ERROR",
            NativePlaybackError => "NATIVE_PLAYBACK_ERROR",
            SessionCreated => "SESSION_CREATED",
            SessionUpdated => "SESSION_UPDATED",
            SessionEnded => "SESSION_ENDED",
            SessionSyncStarted => "SESSION_SYNC_STARTED",
            SessionSyncCompleted => "SESSION_SYNC_COMPLETED",
            SessionSyncFailed => "SESSION_SYNC_FAILED",
            AppForegrounded => "APP_FOREGROUNDED",
            AppBackgrounded => "APP_BACKGROUNDED",
            RestoreState => "RESTORE_STATE",
            RestoreComplete => "RESTORE_COMPLETE",
            PositionReconciled => "POSITION_RECONCILED",
            ChapterChanged => "CHAPTER_CHANGED",
            BufferingStarted => "BUFFERING_STARTED",
            BufferingEnded => "BUFFERING_ENDED",
            SeekComplete => "SEEK_COMPLETE",
            ReloadQueue => "RELOAD_QUEUE",
            QueueReloaded => "QUEUE_RELOADED",
            UndoPositionJump => "UNDO_POSITION_JUMP",
            DismissPositionJump => "DISMISS_POSITION_JUMP",
        }
    }
}

impl std::fmt::Display for PlayerEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
