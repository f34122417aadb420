//! Coordinator Core - event loop and commit path
//!
//! **Responsibilities:**
//! - Coordinator struct definition and construction
//! - Event loop: one event in flight at a time, strict arrival order
//! - Transition Table validation, draft/commit of the Context
//! - Failure conversion into forced `error`/`fatal_error` transitions
//! - Subscriber notification and history recording
//!
//! Handlers live in `handlers.rs` (commands, native, session) and
//! `lifecycle.rs` (restore, foreground/background, reconciliation).

use super::bus::{Envelope, EventInbox, EventSender, EventSource};
use super::context::{PlayerErrorInfo, StateContext};
use super::diagnostics::{Diagnostics, TransitionHistoryEntry};
use super::handle::CoordinatorHandle;
use super::subscriber::{StateSubscriber, SubscriberRegistry};
use super::transitions::{self, Transition};
use crate::config::CoordinatorSettings;
use crate::error::{Error, Result};
use crate::services::{
    NativeAudioEngine, PlayerStateStore, ProgressSync, SessionLog, SessionSyncPayload,
};
use shelfplay_common::events::{PlayerEvent, PlayerEventType, PlayerState};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// Capacity of the snapshot broadcast used by async consumers (SSE)
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// External collaborators the coordinator drives
#[derive(Clone)]
pub struct Collaborators {
    pub native: Arc<dyn NativeAudioEngine>,
    pub sessions: Arc<dyn SessionLog>,
    pub sync: Arc<dyn ProgressSync>,
    pub store: Arc<dyn PlayerStateStore>,
}

/// Player State Coordinator
///
/// Owns the Context exclusively. Constructed explicitly, then moved onto
/// its own task with [`Coordinator::spawn`]; everything else talks to it
/// through a [`CoordinatorHandle`].
pub struct Coordinator {
    inbox: EventInbox,
    pub(super) sender: EventSender,
    pub(super) collaborators: Collaborators,
    pub(super) settings: CoordinatorSettings,

    context: Arc<StateContext>,
    context_tx: watch::Sender<Arc<StateContext>>,
    updates_tx: broadcast::Sender<Arc<StateContext>>,
    subscribers: Arc<SubscriberRegistry>,
    diagnostics: Arc<Diagnostics>,

    /// Events processed so far; history sequence numbers
    processed: u64,
    /// Whether the in-flight seek started from active playback
    pub(super) seek_resumes_playback: bool,
    pub(super) last_session_write: Option<Instant>,
    pub(super) last_server_push: Option<Instant>,
}

impl Coordinator {
    pub fn new(
        inbox: EventInbox,
        sender: EventSender,
        collaborators: Collaborators,
        settings: CoordinatorSettings,
    ) -> Self {
        let context = Arc::new(StateContext::default());
        let (context_tx, _) = watch::channel(context.clone());
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let diagnostics = Arc::new(Diagnostics::new(settings.history_capacity));
        diagnostics.on_state_update(&context);

        info!(
            "Creating player coordinator (history={}, max_native_failures={})",
            settings.history_capacity, settings.max_native_failures
        );

        Self {
            inbox,
            sender,
            collaborators,
            settings,
            context,
            context_tx,
            updates_tx,
            subscribers: Arc::new(SubscriberRegistry::default()),
            diagnostics,
            processed: 0,
            seek_resumes_playback: false,
            last_session_write: None,
            last_server_push: None,
        }
    }

    /// Handle sharing this coordinator's channels
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(
            self.sender.clone(),
            self.context_tx.subscribe(),
            self.updates_tx.clone(),
            self.subscribers.clone(),
            self.diagnostics.clone(),
        )
    }

    /// Move the coordinator onto its own task
    pub fn spawn(self) -> CoordinatorHandle {
        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    /// Process events until every sender is gone
    pub async fn run(mut self) {
        info!("Player coordinator started");
        while let Some(envelope) = self.inbox.recv().await {
            self.process(envelope).await;
            self.inbox.complete();
        }
        info!("Player coordinator stopped");
    }

    async fn process(&mut self, envelope: Envelope) {
        let started = Instant::now();
        let Envelope { source, event, .. } = envelope;
        let event_type = event.event_type();
        let from = self.context.current_state;
        let transition = transitions::resolve(from, event_type);
        self.processed += 1;

        let mut entry = TransitionHistoryEntry {
            sequence: self.processed,
            timestamp: shelfplay_common::time::now(),
            event: event_type,
            source,
            from_state: from,
            to_state: transition.target(from),
            allowed: transition.is_allowed(),
            no_op: transition == Transition::NoOp,
            reason: None,
            handler_error: None,
            processing_ms: 0.0,
        };

        match transition {
            Transition::Rejected => {
                let reason = transitions::rejection_reason(from, event_type);
                warn!("Rejected: {}", reason);
                entry.reason = Some(reason);
            }
            Transition::NoOp | Transition::Next(_) => {
                let mut draft = (*self.context).clone();
                if let Transition::Next(next) = transition {
                    draft.previous_state = Some(from);
                    draft.current_state = next;
                }

                let outcome = match self.handle_event(&event, &mut draft, from).await {
                    Ok(()) => self.check_invariants(&draft),
                    Err(e) => Err(e),
                };
                if let Err(e) = outcome {
                    self.apply_failure(&mut draft, from, event_type, &e).await;
                    entry.handler_error = Some(e.to_string());
                }

                self.finish_draft(&mut draft, from).await;
                entry.to_state = Some(draft.current_state);
                log_transition(from, event_type, &draft, transition);
                self.commit(draft);
            }
        }

        entry.processing_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.notify(&event, &entry);
    }

    /// Invariants every committed context must satisfy
    fn check_invariants(&self, draft: &StateContext) -> Result<()> {
        if draft.current_state.requires_track() && draft.current_track.is_none() {
            return Err(Error::InvalidState(format!(
                "{} requires a loaded track",
                draft.current_state
            )));
        }
        Ok(())
    }

    /// Convert a handler failure into a forced error transition
    ///
    /// Context fields the handler already updated are kept.
    async fn apply_failure(
        &self,
        draft: &mut StateContext,
        from: PlayerState,
        event: PlayerEventType,
        err: &Error,
    ) {
        if err.is_native() {
            draft.native_failure_count += 1;
        }
        let fatal = draft.native_failure_count >= self.settings.max_native_failures;
        let target = if fatal {
            PlayerState::FatalError
        } else {
            PlayerState::Error
        };

        error!(
            "Handler for {} failed in {}: {} (native failures: {}) -> {}",
            event, from, err, draft.native_failure_count, target
        );

        draft.previous_state = Some(from);
        draft.current_state = target;
        draft.is_playing = false;
        draft.is_buffering = false;
        draft.is_seeking = false;
        draft.is_loading_track = false;
        draft.last_error = Some(PlayerErrorInfo {
            message: err.to_string(),
            code: err.code().map(str::to_string),
            fatal,
            event,
            occurred_at: shelfplay_common::time::now(),
        });

        if fatal {
            if let Err(e) = self.collaborators.native.stop().await {
                warn!("Native stop after fatal error failed: {}", e);
            }
        }
    }

    /// Common epilogue: idle teardown, expiry and clamping
    async fn finish_draft(&mut self, draft: &mut StateContext, from: PlayerState) {
        let now = shelfplay_common::time::now();

        if draft.current_state == PlayerState::Idle && from != PlayerState::Idle {
            draft.reset_to_idle();
            self.seek_resumes_playback = false;
            self.last_session_write = None;
            self.last_server_push = None;
            if let Err(e) = self.collaborators.store.clear().await {
                warn!("Failed to clear persisted player state: {}", e);
            }
        }

        if draft
            .position_jump
            .as_ref()
            .is_some_and(|notice| notice.is_expired(now))
        {
            debug!("Position jump undo window expired");
            draft.position_jump = None;
        }

        if !draft.is_seeking {
            draft.position = draft.clamp_position(draft.position);
        }
        draft.updated_at = now;
    }

    fn commit(&mut self, draft: StateContext) {
        let context = Arc::new(draft);
        self.context = context.clone();
        self.context_tx.send_replace(context.clone());
        // No receivers is fine
        let _ = self.updates_tx.send(context);
    }

    fn notify(&self, event: &PlayerEvent, entry: &TransitionHistoryEntry) {
        let context = self.context.as_ref();

        self.diagnostics.on_transition(entry);
        self.diagnostics.on_state_update(context);

        for subscriber in self.subscribers.snapshot() {
            subscriber.on_transition(entry);
            subscriber.on_event(event, context);
            subscriber.on_state_update(context);
        }
    }

    /// Enqueue a follow-up event behind everything already queued
    pub(super) fn enqueue(&self, event: PlayerEvent) {
        self.sender.send_from(EventSource::Internal, event);
    }

    /// Write the persisted player-state blob; failures are only logged
    pub(super) async fn persist(&self, draft: &StateContext) {
        if draft.current_track.is_none() {
            return;
        }
        if let Err(e) = self.collaborators.store.save(&draft.to_persisted()).await {
            warn!("Failed to persist player state: {}", e);
        }
    }

    /// Push the current session to the server without blocking the queue
    ///
    /// SESSION_SYNC_STARTED is enqueued now; COMPLETED or FAILED follows
    /// from the background task. A push made while the draft is already
    /// idle (giving up from an error state) is not announced, so the
    /// player stays idle.
    pub(super) fn push_session(&mut self, draft: &StateContext) {
        let Some(session_id) = draft.session_id.clone() else {
            return;
        };
        self.last_server_push = Some(Instant::now());

        let payload = SessionSyncPayload {
            session_id: session_id.clone(),
            current_time: draft.position,
            time_listened: draft.time_listened,
            duration: draft.duration,
        };
        if draft.current_state != PlayerState::Idle {
            self.enqueue(PlayerEvent::SessionSyncStarted {
                session_id: session_id.clone(),
                position: draft.position,
            });
        }

        let sync = self.collaborators.sync.clone();
        let sender = self.sender.clone();
        let guard = sender.hold();
        tokio::spawn(async move {
            let _guard = guard;
            let event = match sync.push_session(&payload).await {
                Ok(()) => PlayerEvent::SessionSyncCompleted {
                    session_id,
                    position: payload.current_time,
                    synced_at: shelfplay_common::time::now(),
                },
                Err(e) => {
                    warn!("Session sync failed for {}: {}", session_id, e);
                    PlayerEvent::SessionSyncFailed {
                        session_id,
                        error: e.to_string(),
                    }
                }
            };
            sender.send_from(EventSource::Sync, event);
        });
    }
}

fn log_transition(
    from: PlayerState,
    event: PlayerEventType,
    draft: &StateContext,
    transition: Transition,
) {
    let to = draft.current_state;
    match transition {
        Transition::NoOp => debug!("{} handled in {}", event, from),
        _ if to != from => info!("{} --{}--> {}", from, event, to),
        _ => debug!("{} --{}--> {}", from, event, to),
    }
}
