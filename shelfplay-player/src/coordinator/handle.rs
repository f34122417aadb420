//! Coordinator handle
//!
//! Cloneable front door passed to the UI layer, the HTTP surface and the
//! native/lifecycle bridges. It never touches the Context directly: events
//! go in through the bus, snapshots come out through watch/broadcast.

use super::bus::{EventSender, EventSource};
use super::context::StateContext;
use super::diagnostics::Diagnostics;
use super::subscriber::{StateSubscriber, SubscriberRegistry, SubscriptionId};
use shelfplay_common::events::PlayerEvent;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: EventSender,
    context_rx: watch::Receiver<Arc<StateContext>>,
    updates_tx: broadcast::Sender<Arc<StateContext>>,
    subscribers: Arc<SubscriberRegistry>,
    diagnostics: Arc<Diagnostics>,
}

impl CoordinatorHandle {
    pub(super) fn new(
        sender: EventSender,
        context_rx: watch::Receiver<Arc<StateContext>>,
        updates_tx: broadcast::Sender<Arc<StateContext>>,
        subscribers: Arc<SubscriberRegistry>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            sender,
            context_rx,
            updates_tx,
            subscribers,
            diagnostics,
        }
    }

    /// Enqueue a UI command; returns immediately
    ///
    /// Returns false only once the coordinator has shut down.
    pub fn dispatch(&self, event: PlayerEvent) -> bool {
        self.sender.send(event)
    }

    /// Enqueue an event on behalf of another producer
    pub fn dispatch_from(&self, source: EventSource, event: PlayerEvent) -> bool {
        self.sender.send_from(source, event)
    }

    /// Latest committed snapshot
    pub fn context(&self) -> Arc<StateContext> {
        self.context_rx.borrow().clone()
    }

    /// Watch receiver that always holds the latest snapshot
    pub fn watch(&self) -> watch::Receiver<Arc<StateContext>> {
        self.context_rx.clone()
    }

    /// Every committed snapshot, for async consumers
    ///
    /// Slow receivers lag rather than slow the coordinator.
    pub fn updates(&self) -> broadcast::Receiver<Arc<StateContext>> {
        self.updates_tx.subscribe()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn StateSubscriber>) -> SubscriptionId {
        self.subscribers.add(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn diagnostics(&self) -> Arc<Diagnostics> {
        self.diagnostics.clone()
    }

    /// Resolve once the queue and background pushes have drained
    pub async fn settled(&self) {
        self.sender.settled().await
    }

    /// Producer handle for native-engine and lifecycle bridges
    pub fn event_sender(&self) -> EventSender {
        self.sender.clone()
    }
}
