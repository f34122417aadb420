//! Lifecycle handlers - restore, foreground/background, reconciliation
//!
//! Reconciliation itself is pure (`crate::reconcile`); these handlers
//! gather the candidates and turn the outcome into POSITION_RECONCILED.

use super::context::{PositionJumpNotice, StateContext};
use super::core::Coordinator;
use crate::error::Result;
use crate::reconcile::{reconcile, ReconcileInputs};
use crate::services::SessionKey;
use shelfplay_common::events::{
    PersistedPlayerState, PlayerEvent, PlayerState, ReconciliationOutcome,
};
use tracing::{debug, info, warn};

impl Coordinator {
    pub(super) async fn on_backgrounded(&mut self, draft: &mut StateContext) {
        draft.backgrounded_at = Some(shelfplay_common::time::now());
        if let Some(session_id) = draft.session_id.clone() {
            self.write_session(&session_id, draft).await;
        }
        self.persist(draft).await;
    }

    pub(super) async fn on_foregrounded(
        &mut self,
        draft: &mut StateContext,
        from: PlayerState,
    ) -> Result<()> {
        let Some(backgrounded_at) = draft.backgrounded_at.take() else {
            return Ok(());
        };
        let away = shelfplay_common::time::elapsed_between(
            backgrounded_at,
            shelfplay_common::time::now(),
        );

        let can_reconcile = draft.current_track.is_some()
            && matches!(
                from,
                PlayerState::Ready | PlayerState::Playing | PlayerState::Paused
            );
        if !can_reconcile || away < self.settings.foreground_reconcile_after() {
            debug!("Foregrounded after {:?}, no reconciliation", away);
            return Ok(());
        }

        info!("Foregrounded after {:?}, reconciling position", away);
        let outcome = self.gather_and_reconcile(draft).await;
        self.enqueue(PlayerEvent::PositionReconciled { outcome });
        Ok(())
    }

    /// Seed the context from the persisted blob
    pub(super) async fn on_restore_state(
        &mut self,
        draft: &mut StateContext,
        snapshot: Option<&PersistedPlayerState>,
    ) -> Result<()> {
        let Some((snapshot, track)) =
            snapshot.and_then(|s| s.current_track.clone().map(|t| (s, t)))
        else {
            info!("Nothing to restore");
            self.enqueue(PlayerEvent::Stop);
            return Ok(());
        };

        draft.duration = track.duration.max(0.0);
        draft.current_track = Some(track.clone());
        draft.position = draft.clamp_position(snapshot.position);
        draft.current_chapter = track.chapter_at(draft.position).cloned();
        if snapshot.playback_rate.is_finite() && snapshot.playback_rate > 0.0 {
            draft.playback_rate = snapshot.playback_rate.clamp(0.5, 3.0);
        }
        if snapshot.volume.is_finite() {
            draft.volume = snapshot.volume.clamp(0.0, 1.0);
        }
        draft.session_id = snapshot.current_play_session_id.clone();
        draft.last_playback_activity = Some(snapshot.saved_at);
        draft.is_playing = false;
        draft.is_loading_track = true;

        info!(
            "Restoring '{}' at {:.1}s (was playing: {})",
            track.title, draft.position, snapshot.is_playing
        );
        let native = self.collaborators.native.clone();
        native.load(&track, draft.position).await?;
        native.set_rate(draft.playback_rate).await?;
        native.set_volume(draft.volume).await?;

        self.enqueue(PlayerEvent::RestoreComplete);
        Ok(())
    }

    pub(super) async fn on_restore_complete(&mut self, draft: &mut StateContext) {
        let outcome = self.gather_and_reconcile(draft).await;
        self.enqueue(PlayerEvent::PositionReconciled { outcome });
    }

    pub(super) async fn on_position_reconciled(
        &mut self,
        draft: &mut StateContext,
        from: PlayerState,
        outcome: &ReconciliationOutcome,
    ) -> Result<()> {
        let target = draft.clamp_position(outcome.position);
        if from == PlayerState::SyncingPosition || (target - draft.position).abs() > f64::EPSILON {
            self.collaborators.native.seek(target).await?;
        }

        info!(
            "Position reconciled ({}): {:.1}s -> {:.1}s",
            outcome.source, outcome.previous_position, target
        );
        draft.position = target;
        draft.is_loading_track = false;
        self.update_chapter(draft);

        if outcome.should_show_undo {
            let now = shelfplay_common::time::now();
            let window = chrono::Duration::from_std(self.settings.undo_window())
                .unwrap_or_else(|_| chrono::Duration::seconds(60));
            draft.position_jump = Some(PositionJumpNotice {
                previous_position: outcome.previous_position,
                new_position: target,
                source: outcome.source,
                raised_at: now,
                expires_at: now + window,
            });
        }

        self.persist(draft).await;
        Ok(())
    }

    /// Consume the position-jump notice, seeking back while it is live
    pub(super) fn on_undo_position_jump(&mut self, draft: &mut StateContext, from: PlayerState) {
        let Some(notice) = draft.position_jump.take() else {
            debug!("No position jump to undo");
            return;
        };
        if notice.is_expired(shelfplay_common::time::now()) {
            debug!("Position jump undo expired");
            return;
        }
        if !from.requires_track() {
            warn!("Cannot undo position jump while {}", from);
            return;
        }

        info!(
            "Undoing position jump: back to {:.1}s",
            notice.previous_position
        );
        self.enqueue(PlayerEvent::Seek {
            position: notice.previous_position,
        });
    }

    /// Gather native, local and server candidates and reconcile them
    ///
    /// Collaborator failures count as an absent candidate.
    async fn gather_and_reconcile(&self, draft: &StateContext) -> ReconciliationOutcome {
        let mut inputs = ReconcileInputs {
            displayed_position: draft.position,
            ..Default::default()
        };

        if let Some(track) = &draft.current_track {
            inputs.native_position = self.collaborators.native.position().await;

            let key = SessionKey::new(&self.settings.user_id, &track.library_item_id);
            inputs.local = match self.collaborators.sessions.latest_open_session(&key).await {
                Ok(record) => record.map(|r| r.as_report()),
                Err(e) => {
                    warn!("Local session lookup failed: {}", e);
                    None
                }
            };

            inputs.server = match self
                .collaborators
                .sync
                .fetch_latest_progress(&track.library_item_id)
                .await
            {
                Ok(report) => report,
                Err(e) => {
                    warn!("Server progress unavailable: {}", e);
                    None
                }
            };
        }

        reconcile(&inputs, self.settings.position_jump_threshold_secs)
    }
}
