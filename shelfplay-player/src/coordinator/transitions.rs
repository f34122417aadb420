//! Transition Table
//!
//! Pure lookup of `(state, event type) -> next state`. Events in the no-op
//! set are allowed everywhere and never change state; any other pair
//! missing from the table is rejected. Rejection is not an error.

use shelfplay_common::events::{PlayerEventType, PlayerState};

/// Outcome of a table lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Explicit table entry (may name the current state)
    Next(PlayerState),
    /// No-op event: allowed, state unchanged
    NoOp,
    /// Not legal in the current state
    Rejected,
}

impl Transition {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Transition::Rejected)
    }

    /// State after the lookup, `None` when rejected
    pub fn target(&self, current: PlayerState) -> Option<PlayerState> {
        match self {
            Transition::Next(state) => Some(*state),
            Transition::NoOp => Some(current),
            Transition::Rejected => None,
        }
    }
}

/// Resolve an event type against the current state
pub fn resolve(state: PlayerState, event: PlayerEventType) -> Transition {
    if event.is_no_op() {
        return Transition::NoOp;
    }
    match next_state(state, event) {
        Some(next) => Transition::Next(next),
        None => Transition::Rejected,
    }
}

/// Human-readable rejection reason recorded in the history
pub fn rejection_reason(state: PlayerState, event: PlayerEventType) -> String {
    if state == PlayerState::Idle
        && matches!(event, PlayerEventType::Play | PlayerEventType::Pause)
    {
        return format!("{} not allowed in {}: no track loaded", event, state);
    }
    format!("{} not allowed in {}", event, state)
}

/// Explicit table entries
///
/// Exhaustive over states; event arms list every legal pair.
pub fn next_state(state: PlayerState, event: PlayerEventType) -> Option<PlayerState> {
    use PlayerEventType::*;
    use PlayerState as S;

    let next = match state {
        S::Idle => match event {
            LoadTrack => S::Loading,
            RestoreState => S::Restoring,
            SessionSyncStarted => S::SyncingSession,
            SetRate | SetVolume | AppForegrounded | AppBackgrounded | NativeStateChanged
            | NativeTrackChanged | SessionEnded => S::Idle,
            // Outcome of a push made while stopping
            SessionSyncCompleted | SessionSyncFailed => S::Idle,
            _ => return None,
        },

        S::Loading => match event {
            NativeTrackChanged => S::Ready,
            // A load handler may request playback before the engine is ready
            Play => S::Playing,
            Stop => S::Stopping,
            LoadTrack => S::Loading,
            NativeError | NativePlaybackError => S::Error,
            NativeStateChanged | SessionCreated | SessionEnded | SetRate | SetVolume
            | AppForegrounded | AppBackgrounded | SessionSyncStarted | SessionSyncCompleted
            | SessionSyncFailed => S::Loading,
            _ => return None,
        },

        S::Ready => match event {
            Play => S::Playing,
            Pause => S::Paused,
            Seek | JumpForward | JumpBackward => S::Seeking,
            Stop => S::Stopping,
            LoadTrack => S::Loading,
            NativeError | NativePlaybackError => S::Error,
            e if is_active_same_state(e) => S::Ready,
            _ => return None,
        },

        S::Playing => match event {
            Pause => S::Paused,
            Stop => S::Stopping,
            Seek | JumpForward | JumpBackward => S::Seeking,
            LoadTrack => S::Loading,
            BufferingStarted => S::Buffering,
            NativeError | NativePlaybackError => S::Error,
            e if is_active_same_state(e) => S::Playing,
            _ => return None,
        },

        S::Paused => match event {
            Play => S::Playing,
            Stop => S::Stopping,
            Seek | JumpForward | JumpBackward => S::Seeking,
            LoadTrack => S::Loading,
            NativeError | NativePlaybackError => S::Error,
            e if is_active_same_state(e) => S::Paused,
            _ => return None,
        },

        S::Seeking => match event {
            SeekComplete => S::Ready,
            Play => S::Playing,
            Pause => S::Paused,
            Seek | JumpForward | JumpBackward => S::Seeking,
            Stop => S::Stopping,
            LoadTrack => S::Loading,
            NativeError | NativePlaybackError => S::Error,
            e if is_transient_same_state(e) => S::Seeking,
            _ => return None,
        },

        S::Buffering => match event {
            BufferingEnded => S::Playing,
            BufferingStarted => S::Buffering,
            Pause => S::Paused,
            Seek | JumpForward | JumpBackward => S::Seeking,
            Stop => S::Stopping,
            LoadTrack => S::Loading,
            NativeError | NativePlaybackError => S::Error,
            e if is_transient_same_state(e) => S::Buffering,
            _ => return None,
        },

        S::Stopping => match event {
            NativeStateChanged => S::Idle,
            NativeError | NativePlaybackError => S::Idle,
            LoadTrack => S::Loading,
            NativeTrackChanged | SessionEnded | SessionSyncStarted | SessionSyncCompleted
            | SessionSyncFailed | AppForegrounded | AppBackgrounded => S::Stopping,
            _ => return None,
        },

        S::Error => match event {
            Play => S::Playing,
            LoadTrack => S::Loading,
            Stop => S::Idle,
            NativeError | NativePlaybackError | SetRate | SetVolume | NativeStateChanged
            | NativeTrackChanged | AppForegrounded | AppBackgrounded | SessionEnded
            | SessionSyncStarted | SessionSyncCompleted | SessionSyncFailed => S::Error,
            _ => return None,
        },

        S::FatalError => match event {
            Play => S::Playing,
            LoadTrack => S::Loading,
            Stop => S::Idle,
            NativeError | NativePlaybackError | NativeStateChanged | NativeTrackChanged
            | AppForegrounded | AppBackgrounded | SessionEnded | SessionSyncStarted
            | SessionSyncCompleted | SessionSyncFailed => S::FatalError,
            _ => return None,
        },

        S::Restoring => match event {
            RestoreComplete => S::SyncingPosition,
            Stop => S::Idle,
            LoadTrack => S::Loading,
            NativeError | NativePlaybackError => S::Error,
            NativeStateChanged | NativeTrackChanged | SessionCreated | SetRate | SetVolume
            | AppForegrounded | AppBackgrounded => S::Restoring,
            _ => return None,
        },

        S::SyncingPosition => match event {
            PositionReconciled => S::Ready,
            Play => S::Playing,
            Stop => S::Idle,
            LoadTrack => S::Loading,
            NativeError | NativePlaybackError => S::Error,
            NativeStateChanged | NativeTrackChanged | AppForegrounded | AppBackgrounded => {
                S::SyncingPosition
            }
            _ => return None,
        },

        S::SyncingSession => match event {
            SessionSyncCompleted | SessionSyncFailed => S::Idle,
            SessionSyncStarted => S::SyncingSession,
            LoadTrack => S::Loading,
            RestoreState => S::Restoring,
            NativeStateChanged | AppForegrounded | AppBackgrounded => S::SyncingSession,
            _ => return None,
        },
    };
    Some(next)
}

/// Same-state entries shared by ready/playing/paused
fn is_active_same_state(event: PlayerEventType) -> bool {
    use PlayerEventType::*;
    matches!(
        event,
        SetRate
            | SetVolume
            | NativeStateChanged
            | NativeTrackChanged
            | AppForegrounded
            | AppBackgrounded
            | PositionReconciled
            | SessionCreated
            | SessionEnded
            | SessionSyncStarted
            | SessionSyncCompleted
            | SessionSyncFailed
            | ReloadQueue
            | QueueReloaded
    )
}

/// Same-state entries shared by seeking/buffering
fn is_transient_same_state(event: PlayerEventType) -> bool {
    use PlayerEventType::*;
    matches!(
        event,
        SetRate
            | SetVolume
            | NativeStateChanged
            | NativeTrackChanged
            | AppForegrounded
            | AppBackgrounded
            | SessionCreated
            | SessionEnded
            | SessionSyncStarted
            | SessionSyncCompleted
            | SessionSyncFailed
    )
}
