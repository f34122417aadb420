//! Event Bus
//!
//! Single ordered ingress for every producer. Delivery is FIFO in arrival
//! order; the bus never filters or rewrites events. A shared pending
//! counter lets callers await the moment the queue (and any background
//! work holding a [`PendingGuard`]) has drained.

use shelfplay_common::events::PlayerEvent;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Notify};
use tracing::debug;

/// Who put an event on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Ui,
    Native,
    Lifecycle,
    Sync,
    Internal,
}

/// Event as carried by the bus
#[derive(Debug)]
pub struct Envelope {
    /// Assigned when enqueued
    pub sequence: u64,
    pub source: EventSource,
    pub event: PlayerEvent,
    pub enqueued_at: Instant,
}

struct Shared {
    pending: AtomicUsize,
    next_sequence: AtomicU64,
    idle: Notify,
}

impl Shared {
    fn release(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Producer half; cheap to clone
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Envelope>,
    shared: Arc<Shared>,
}

/// Consumer half, owned by the coordinator
pub struct EventInbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
    shared: Arc<Shared>,
}

/// Create a connected sender/inbox pair
pub fn channel() -> (EventSender, EventInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        pending: AtomicUsize::new(0),
        next_sequence: AtomicU64::new(1),
        idle: Notify::new(),
    });
    (
        EventSender {
            tx,
            shared: shared.clone(),
        },
        EventInbox { rx, shared },
    )
}

impl EventSender {
    /// Enqueue a UI-originated event
    pub fn send(&self, event: PlayerEvent) -> bool {
        self.send_from(EventSource::Ui, event)
    }

    /// Enqueue an event tagged with its producer
    ///
    /// Returns false once the coordinator has shut down.
    pub fn send_from(&self, source: EventSource, event: PlayerEvent) -> bool {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        let envelope = Envelope {
            sequence: self.shared.next_sequence.fetch_add(1, Ordering::AcqRel),
            source,
            event,
            enqueued_at: Instant::now(),
        };
        match self.tx.send(envelope) {
            Ok(()) => true,
            Err(mpsc::error::SendError(envelope)) => {
                debug!(
                    "Coordinator gone, dropping {}",
                    envelope.event.event_type()
                );
                self.shared.release();
                false
            }
        }
    }

    /// Keep `settled` from resolving while background work is in flight
    pub fn hold(&self) -> PendingGuard {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        PendingGuard {
            shared: self.shared.clone(),
        }
    }

    /// Events queued or in flight, plus outstanding guards
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Resolve once nothing is queued, in flight or held
    pub async fn settled(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EventInbox {
    /// Next event in arrival order; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Mark the most recently received event as fully processed
    pub fn complete(&self) {
        self.shared.release();
    }
}

/// Outstanding background work counted by `settled`
pub struct PendingGuard {
    shared: Arc<Shared>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.shared.release();
    }
}
