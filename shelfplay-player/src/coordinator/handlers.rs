//! Event handlers - commands, native callbacks, session bookkeeping
//!
//! Each handler receives the draft Context (state already advanced by the
//! Transition Table) and the state the event arrived in. Returning `Err`
//! makes the core force an error transition. Follow-up events go through
//! `enqueue`, never a direct recursive call.

use super::context::{PlayerErrorInfo, StateContext};
use super::core::Coordinator;
use crate::error::{Error, Result};
use crate::reconcile::apply_smart_rewind;
use crate::services::SessionKey;
use shelfplay_common::events::{
    NativePlaybackState, PlayerEvent, PlayerEventType, PlayerState, TrackDescriptor,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

const MIN_RATE: f64 = 0.5;
const MAX_RATE: f64 = 3.0;

/// Progress jumps larger than this are treated as seeks, not listening
const MAX_LISTENED_STEP_SECS: f64 = 10.0;

impl Coordinator {
    pub(super) async fn handle_event(
        &mut self,
        event: &PlayerEvent,
        draft: &mut StateContext,
        from: PlayerState,
    ) -> Result<()> {
        match event {
            PlayerEvent::LoadTrack {
                track,
                start_position,
                auto_play,
            } => {
                self.on_load_track(draft, track, *start_position, *auto_play)
                    .await
            }
            PlayerEvent::Play => self.on_play(draft, from).await,
            PlayerEvent::Pause => self.on_pause(draft, from).await,
            PlayerEvent::Stop => self.on_stop(draft).await,
            PlayerEvent::Seek { position } => self.on_seek(draft, from, *position).await,
            PlayerEvent::JumpForward { seconds } => {
                let target = draft.position + seconds.unwrap_or(self.settings.jump_forward_secs);
                self.on_seek(draft, from, target).await
            }
            PlayerEvent::JumpBackward { seconds } => {
                let target = draft.position - seconds.unwrap_or(self.settings.jump_backward_secs);
                self.on_seek(draft, from, target).await
            }
            PlayerEvent::SetRate { rate } => self.on_set_rate(draft, *rate).await,
            PlayerEvent::SetVolume { volume } => self.on_set_volume(draft, *volume).await,

            PlayerEvent::NativeStateChanged { state } => {
                self.on_native_state(draft, from, *state);
                Ok(())
            }
            PlayerEvent::NativeProgressUpdated {
                position,
                duration,
                buffered: _,
            } => {
                self.on_progress(draft, from, *position, *duration);
                Ok(())
            }
            PlayerEvent::NativeTrackChanged { track } => {
                on_native_track(draft, from, track.as_ref());
                Ok(())
            }
            PlayerEvent::NativeError { message } => {
                self.on_native_error(draft, PlayerEventType::NativeError, None, message)
                    .await;
                Ok(())
            }
            PlayerEvent::NativePlaybackError { code, message } => {
                self.on_native_error(
                    draft,
                    PlayerEventType::NativePlaybackError,
                    Some(code),
                    message,
                )
                .await;
                Ok(())
            }

            PlayerEvent::SessionCreated {
                session_id,
                started_at,
            } => {
                draft.session_id = Some(session_id.clone());
                draft.session_started_at = Some(*started_at);
                draft.time_listened = 0.0;
                Ok(())
            }
            PlayerEvent::SessionUpdated {
                session_id,
                position,
                time_listened,
            } => {
                self.on_session_updated(draft, session_id, *position, *time_listened)
                    .await;
                Ok(())
            }
            PlayerEvent::SessionEnded { session_id } => {
                if draft.session_id.as_deref() == Some(session_id.as_str()) {
                    draft.session_id = None;
                    draft.session_started_at = None;
                    draft.time_listened = 0.0;
                }
                Ok(())
            }
            PlayerEvent::SessionSyncStarted { position, .. } => {
                draft.pending_sync_position = Some(*position);
                Ok(())
            }
            PlayerEvent::SessionSyncCompleted {
                session_id,
                synced_at,
                ..
            } => {
                debug!("Session {} synced", session_id);
                draft.last_server_sync = Some(*synced_at);
                draft.pending_sync_position = None;
                Ok(())
            }
            PlayerEvent::SessionSyncFailed { session_id, error } => {
                warn!("Session {} not synced: {}", session_id, error);
                Ok(())
            }

            PlayerEvent::AppForegrounded => self.on_foregrounded(draft, from).await,
            PlayerEvent::AppBackgrounded => {
                self.on_backgrounded(draft).await;
                Ok(())
            }
            PlayerEvent::RestoreState { snapshot } => {
                self.on_restore_state(draft, snapshot.as_ref()).await
            }
            PlayerEvent::RestoreComplete => {
                self.on_restore_complete(draft).await;
                Ok(())
            }
            PlayerEvent::PositionReconciled { outcome } => {
                self.on_position_reconciled(draft, from, outcome).await
            }
            PlayerEvent::UndoPositionJump => {
                self.on_undo_position_jump(draft, from);
                Ok(())
            }
            PlayerEvent::DismissPositionJump => {
                if draft.position_jump.take().is_some() {
                    debug!("Position jump notice dismissed");
                }
                Ok(())
            }

            PlayerEvent::ChapterChanged { chapter } => {
                draft.current_chapter = chapter.clone();
                Ok(())
            }
            PlayerEvent::BufferingStarted => {
                draft.is_buffering = true;
                Ok(())
            }
            PlayerEvent::BufferingEnded => {
                draft.is_buffering = false;
                draft.is_playing = true;
                Ok(())
            }
            PlayerEvent::SeekComplete { position } => {
                self.on_seek_complete(draft, *position);
                Ok(())
            }
            PlayerEvent::ReloadQueue { track } => {
                self.on_reload_queue(draft, from, track.as_ref()).await
            }
            PlayerEvent::QueueReloaded => {
                debug!("Native queue reloaded");
                Ok(())
            }
        }
    }

    // ---- commands ----

    async fn on_load_track(
        &mut self,
        draft: &mut StateContext,
        track: &TrackDescriptor,
        start_position: Option<f64>,
        auto_play: bool,
    ) -> Result<()> {
        if let Some(old_session) = draft.session_id.take() {
            self.end_session_quietly(&old_session, draft.position).await;
            self.enqueue(PlayerEvent::SessionEnded {
                session_id: old_session,
            });
        }

        draft.current_track = Some(track.clone());
        draft.duration = track.duration.max(0.0);
        draft.position = draft.clamp_position(start_position.unwrap_or(0.0));
        draft.current_chapter = track.chapter_at(draft.position).cloned();
        draft.session_started_at = None;
        draft.time_listened = 0.0;
        draft.is_loading_track = true;
        draft.is_playing = false;
        draft.is_buffering = false;
        draft.is_seeking = false;
        draft.position_jump = None;
        draft.last_playback_activity = None;
        draft.last_error = None;
        self.last_session_write = None;
        self.last_server_push = None;

        info!(
            "Loading '{}' ({}) at {:.1}s",
            track.title, track.library_item_id, draft.position
        );
        self.collaborators.native.load(track, draft.position).await?;

        let key = SessionKey::new(&self.settings.user_id, &track.library_item_id);
        match self
            .collaborators
            .sessions
            .start_session(&key, track, draft.position, draft.playback_rate)
            .await
        {
            Ok(record) => self.enqueue(PlayerEvent::SessionCreated {
                session_id: record.session_id,
                started_at: record.started_at,
            }),
            Err(e) => warn!("Failed to start play session: {}", e),
        }

        self.persist(draft).await;
        if auto_play {
            self.enqueue(PlayerEvent::Play);
        }
        Ok(())
    }

    async fn on_play(&mut self, draft: &mut StateContext, from: PlayerState) -> Result<()> {
        let Some(track) = draft.current_track.clone() else {
            return Err(Error::InvalidState("no track loaded".to_string()));
        };
        let native = self.collaborators.native.clone();

        if from.is_error() {
            info!("Retrying '{}' at {:.1}s", track.title, draft.position);
            draft.is_loading_track = true;
            native.load(&track, draft.position).await?;
        }

        if matches!(from, PlayerState::Paused | PlayerState::Ready) {
            if let Some(last_activity) = draft.last_playback_activity {
                let idle = shelfplay_common::time::elapsed_between(
                    last_activity,
                    shelfplay_common::time::now(),
                );
                let resume_at = apply_smart_rewind(draft.position, idle);
                if resume_at < draft.position {
                    debug!(
                        "Smart rewind {:.1}s after {:?} idle",
                        draft.position - resume_at,
                        idle
                    );
                    native.seek(resume_at).await?;
                    draft.position = resume_at;
                }
            }
        }

        native.play().await?;
        draft.is_playing = true;
        draft.is_seeking = false;
        draft.is_buffering = false;
        draft.last_playback_activity = Some(shelfplay_common::time::now());
        Ok(())
    }

    async fn on_pause(&mut self, draft: &mut StateContext, from: PlayerState) -> Result<()> {
        self.collaborators.native.pause().await?;

        if matches!(from, PlayerState::Playing | PlayerState::Buffering) {
            draft.last_playback_activity = Some(shelfplay_common::time::now());
        }
        draft.is_playing = false;
        draft.is_buffering = false;
        draft.is_seeking = false;

        if let Some(session_id) = draft.session_id.clone() {
            self.write_session(&session_id, draft).await;
        }
        self.persist(draft).await;
        self.push_session(draft);
        Ok(())
    }

    async fn on_stop(&mut self, draft: &mut StateContext) -> Result<()> {
        let stopping = draft.current_state == PlayerState::Stopping;

        // Session bookkeeping is queued ahead of the engine's stop callback
        if let Some(session_id) = draft.session_id.clone() {
            self.end_session_quietly(&session_id, draft.position).await;
            self.enqueue(PlayerEvent::SessionEnded { session_id });
            self.push_session(draft);
        }

        match self.collaborators.native.stop().await {
            Ok(()) => {}
            // Giving up from an error state must not fail again
            Err(e) if !stopping => warn!("Native stop failed: {}", e),
            Err(e) => return Err(e),
        }
        draft.is_playing = false;
        draft.is_buffering = false;
        draft.is_seeking = false;
        Ok(())
    }

    async fn on_seek(
        &mut self,
        draft: &mut StateContext,
        from: PlayerState,
        target: f64,
    ) -> Result<()> {
        let target = draft.clamp_position(target);
        let retarget = from == PlayerState::Seeking;

        if !retarget {
            self.seek_resumes_playback =
                matches!(from, PlayerState::Playing | PlayerState::Buffering);
        }
        draft.last_playback_activity = self
            .seek_resumes_playback
            .then(shelfplay_common::time::now);

        debug!("Seeking to {:.1}s", target);
        self.collaborators.native.seek(target).await?;
        draft.position = target;
        draft.is_seeking = true;
        draft.is_buffering = false;

        // One completion per seek burst; it lands on the latest target
        if !retarget {
            self.enqueue(PlayerEvent::SeekComplete { position: target });
        }
        Ok(())
    }

    fn on_seek_complete(&mut self, draft: &mut StateContext, issued_for: f64) {
        if (issued_for - draft.position).abs() > f64::EPSILON {
            debug!(
                "Seek to {:.1}s superseded by {:.1}s",
                issued_for, draft.position
            );
        }
        draft.is_seeking = false;
        draft.is_playing = false;
        self.update_chapter(draft);

        let resume = if self.seek_resumes_playback {
            PlayerEvent::Play
        } else {
            PlayerEvent::Pause
        };
        self.seek_resumes_playback = false;
        self.enqueue(resume);
    }

    async fn on_set_rate(&mut self, draft: &mut StateContext, rate: f64) -> Result<()> {
        let rate = if rate.is_finite() {
            rate.clamp(MIN_RATE, MAX_RATE)
        } else {
            1.0
        };
        if draft.current_track.is_some() {
            self.collaborators.native.set_rate(rate).await?;
        }
        draft.playback_rate = rate;
        self.persist(draft).await;
        Ok(())
    }

    async fn on_set_volume(&mut self, draft: &mut StateContext, volume: f64) -> Result<()> {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        if draft.current_track.is_some() {
            self.collaborators.native.set_volume(volume).await?;
        }
        draft.volume = volume;
        self.persist(draft).await;
        Ok(())
    }

    async fn on_reload_queue(
        &mut self,
        draft: &mut StateContext,
        from: PlayerState,
        replacement: Option<&TrackDescriptor>,
    ) -> Result<()> {
        let Some(track) = replacement.or(draft.current_track.as_ref()).cloned() else {
            return Err(Error::InvalidState("no track to reload".to_string()));
        };
        let native = self.collaborators.native.clone();

        info!("Reloading native queue with '{}'", track.source);
        native.load(&track, draft.position).await?;
        if from == PlayerState::Playing {
            native.play().await?;
        }

        if track.duration > 0.0 {
            draft.duration = track.duration;
        }
        draft.current_track = Some(track);
        self.enqueue(PlayerEvent::QueueReloaded);
        Ok(())
    }

    // ---- native callbacks ----

    /// Mirror externally driven engine changes into ordinary commands
    fn on_native_state(
        &mut self,
        draft: &mut StateContext,
        from: PlayerState,
        state: NativePlaybackState,
    ) {
        use NativePlaybackState as N;

        let follow_up = match (from, state) {
            (PlayerState::Playing, N::Paused) => Some(PlayerEvent::Pause),
            (PlayerState::Playing, N::Ended) => {
                draft.position = draft.duration;
                Some(PlayerEvent::Pause)
            }
            (PlayerState::Playing, N::Buffering) => Some(PlayerEvent::BufferingStarted),
            (PlayerState::Buffering, N::Playing) => Some(PlayerEvent::BufferingEnded),
            (PlayerState::Buffering, N::Paused) => Some(PlayerEvent::Pause),
            (PlayerState::Paused, N::Playing) => Some(PlayerEvent::Play),
            _ => None,
        };

        match follow_up {
            Some(event) => {
                debug!("Native {} while {}, enqueueing {}", state, from, event.event_type());
                self.enqueue(event);
            }
            None => debug!("Native {} while {}", state, from),
        }
    }

    fn on_progress(
        &mut self,
        draft: &mut StateContext,
        from: PlayerState,
        position: f64,
        duration: f64,
    ) {
        if duration.is_finite() && duration > 0.0 {
            draft.duration = duration;
        }
        if draft.is_seeking
            || draft.current_track.is_none()
            || matches!(
                from,
                PlayerState::Loading | PlayerState::Stopping | PlayerState::Restoring
            )
        {
            return;
        }

        let position = draft.clamp_position(position);
        let playing = from == PlayerState::Playing;
        if playing {
            let step = position - draft.position;
            if step > 0.0 && step <= MAX_LISTENED_STEP_SECS * draft.playback_rate {
                draft.time_listened += step / draft.playback_rate;
            }
            draft.last_playback_activity = Some(shelfplay_common::time::now());
            draft.native_failure_count = 0;
        }
        draft.position = position;
        self.update_chapter(draft);

        if !playing {
            return;
        }
        if let Some(session_id) = draft.session_id.clone() {
            if is_due(self.last_session_write, self.settings.session_update_interval()) {
                self.last_session_write = Some(Instant::now());
                self.enqueue(PlayerEvent::SessionUpdated {
                    session_id,
                    position: draft.position,
                    time_listened: draft.time_listened,
                });
            }
            if is_due(self.last_server_push, self.settings.server_sync_interval()) {
                self.push_session(draft);
            }
        }
    }

    async fn on_native_error(
        &mut self,
        draft: &mut StateContext,
        event: PlayerEventType,
        code: Option<&String>,
        message: &str,
    ) {
        draft.is_playing = false;
        draft.is_buffering = false;
        draft.is_seeking = false;
        draft.is_loading_track = false;
        draft.native_failure_count += 1;

        let fatal = draft.current_state.is_error()
            && draft.native_failure_count >= self.settings.max_native_failures;
        if fatal {
            draft.current_state = PlayerState::FatalError;
            if let Err(e) = self.collaborators.native.stop().await {
                warn!("Native stop after fatal error failed: {}", e);
            }
        }

        error!(
            "Native engine error{}: {} (consecutive: {}) -> {}",
            code.map(|c| format!(" [{}]", c)).unwrap_or_default(),
            message,
            draft.native_failure_count,
            draft.current_state
        );
        draft.last_error = Some(PlayerErrorInfo {
            message: message.to_string(),
            code: code.cloned(),
            fatal,
            event,
            occurred_at: shelfplay_common::time::now(),
        });
    }

    // ---- session log ----

    async fn on_session_updated(
        &mut self,
        draft: &mut StateContext,
        session_id: &str,
        position: f64,
        time_listened: f64,
    ) {
        if draft.session_id.as_deref() != Some(session_id) {
            debug!("Ignoring update for inactive session {}", session_id);
            return;
        }
        if let Err(e) = self
            .collaborators
            .sessions
            .update_session(session_id, position, time_listened)
            .await
        {
            warn!("Failed to update play session {}: {}", session_id, e);
        }
    }

    /// Record the draft's position in the local session log
    pub(super) async fn write_session(&mut self, session_id: &str, draft: &StateContext) {
        self.last_session_write = Some(Instant::now());
        if let Err(e) = self
            .collaborators
            .sessions
            .update_session(session_id, draft.position, draft.time_listened)
            .await
        {
            warn!("Failed to update play session {}: {}", session_id, e);
        }
    }

    async fn end_session_quietly(&self, session_id: &str, position: f64) {
        if let Err(e) = self
            .collaborators
            .sessions
            .end_session(session_id, position)
            .await
        {
            warn!("Failed to end play session {}: {}", session_id, e);
        }
    }

    /// Track chapter boundary crossings, announcing each with CHAPTER_CHANGED
    pub(super) fn update_chapter(&self, draft: &mut StateContext) {
        let chapter = draft.chapter_at_position();
        if chapter.as_ref().map(|c| c.id) != draft.current_chapter.as_ref().map(|c| c.id) {
            draft.current_chapter = chapter.clone();
            self.enqueue(PlayerEvent::ChapterChanged { chapter });
        }
    }
}

/// NATIVE_TRACK_CHANGED: the engine finished loading (or switched items)
///
/// A track reported while idle or stopping is stale and not adopted.
fn on_native_track(
    draft: &mut StateContext,
    from: PlayerState,
    track: Option<&TrackDescriptor>,
) {
    draft.is_loading_track = false;
    if matches!(from, PlayerState::Idle | PlayerState::Stopping) {
        return;
    }
    if let Some(track) = track {
        if draft.current_track.is_none() {
            draft.current_track = Some(track.clone());
        }
        if draft.duration <= 0.0 && track.duration > 0.0 {
            draft.duration = track.duration;
        }
    }
}

fn is_due(last: Option<Instant>, interval: std::time::Duration) -> bool {
    last.map_or(true, |at| at.elapsed() >= interval)
}
