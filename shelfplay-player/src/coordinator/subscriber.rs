//! Subscriber interface
//!
//! Subscribers run synchronously on the coordinator task after every
//! processed event, rejections included, and receive read-only snapshots.
//! They must not block.

use super::context::StateContext;
use super::diagnostics::TransitionHistoryEntry;
use shelfplay_common::events::PlayerEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub trait StateSubscriber: Send + Sync {
    /// Context after the event was processed
    fn on_state_update(&self, context: &StateContext);

    /// The event itself, with the resulting context
    fn on_event(&self, _event: &PlayerEvent, _context: &StateContext) {}

    /// History entry recorded for the event
    fn on_transition(&self, _entry: &TransitionHistoryEntry) {}
}

/// Identifies a registration for `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Registered subscribers, in registration order
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_id: AtomicU64,
    entries: RwLock<Vec<(SubscriptionId, Arc<dyn StateSubscriber>)>>,
}

impl SubscriberRegistry {
    pub(crate) fn add(&self, subscriber: Arc<dyn StateSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, subscriber));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Current subscribers; callbacks run without the lock held
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn StateSubscriber>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, s)| s.clone())
            .collect()
    }
}
