//! Diagnostics
//!
//! Passive subscriber: bounded transition history, counters and the latest
//! context, exportable as one JSON object for support tooling. Updates are
//! O(1) amortized under a short std mutex; nothing here awaits.

use super::bus::EventSource;
use super::context::StateContext;
use super::subscriber::StateSubscriber;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shelfplay_common::events::{PlayerEventType, PlayerState};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// One processed event as seen by the coordinator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionHistoryEntry {
    /// Processing order, starting at 1
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: PlayerEventType,
    pub source: EventSource,
    pub from_state: PlayerState,
    /// `None` when rejected
    pub to_state: Option<PlayerState>,
    pub allowed: bool,
    /// Allowed without a table entry
    pub no_op: bool,
    /// Why the event was rejected
    pub reason: Option<String>,
    /// Handler failure that forced an error transition
    pub handler_error: Option<String>,
    pub processing_ms: f64,
}

/// Counters over every processed event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsMetrics {
    pub total_events_processed: u64,
    /// Table-allowed events, self-transitions included
    pub state_transition_count: u64,
    pub rejected_transition_count: u64,
    pub no_op_count: u64,
    pub handler_error_count: u64,
    pub average_processing_ms: f64,
    pub max_processing_ms: f64,
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Serializable snapshot: `{metrics, context, transitionHistory}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsExport {
    pub metrics: DiagnosticsMetrics,
    pub context: StateContext,
    pub transition_history: Vec<TransitionHistoryEntry>,
    pub last_diagnostic_event: Option<TransitionHistoryEntry>,
    pub exported_at: DateTime<Utc>,
}

struct Inner {
    capacity: usize,
    history: VecDeque<TransitionHistoryEntry>,
    metrics: DiagnosticsMetrics,
    total_processing_ms: f64,
    last_entry: Option<TransitionHistoryEntry>,
    context: Arc<StateContext>,
}

/// Diagnostics collector, registered on every coordinator
pub struct Diagnostics {
    inner: Mutex<Inner>,
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                capacity,
                history: VecDeque::with_capacity(capacity),
                metrics: DiagnosticsMetrics::default(),
                total_processing_ms: 0.0,
                last_entry: None,
                context: Arc::new(StateContext::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an entry and update counters
    pub fn record(&self, entry: &TransitionHistoryEntry) {
        let mut inner = self.lock();

        let metrics = &mut inner.metrics;
        metrics.total_events_processed += 1;
        if !entry.allowed {
            metrics.rejected_transition_count += 1;
        } else if entry.no_op {
            metrics.no_op_count += 1;
        } else {
            metrics.state_transition_count += 1;
        }
        if entry.handler_error.is_some() {
            metrics.handler_error_count += 1;
        }
        metrics.max_processing_ms = metrics.max_processing_ms.max(entry.processing_ms);
        metrics.last_event_at = Some(entry.timestamp);

        inner.total_processing_ms += entry.processing_ms;
        inner.metrics.average_processing_ms =
            inner.total_processing_ms / inner.metrics.total_events_processed as f64;

        if inner.history.len() == inner.capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(entry.clone());
        inner.last_entry = Some(entry.clone());
    }

    pub fn metrics(&self) -> DiagnosticsMetrics {
        self.lock().metrics.clone()
    }

    /// History, oldest first
    pub fn history(&self) -> Vec<TransitionHistoryEntry> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn export(&self) -> DiagnosticsExport {
        let inner = self.lock();
        DiagnosticsExport {
            metrics: inner.metrics.clone(),
            context: (*inner.context).clone(),
            transition_history: inner.history.iter().cloned().collect(),
            last_diagnostic_event: inner.last_entry.clone(),
            exported_at: shelfplay_common::time::now(),
        }
    }
}

impl StateSubscriber for Diagnostics {
    fn on_state_update(&self, context: &StateContext) {
        self.lock().context = Arc::new(context.clone());
    }

    fn on_transition(&self, entry: &TransitionHistoryEntry) {
        self.record(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sequence: u64, allowed: bool, no_op: bool) -> TransitionHistoryEntry {
        TransitionHistoryEntry {
            sequence,
            timestamp: shelfplay_common::time::now(),
            event: PlayerEventType::Play,
            source: EventSource::Ui,
            from_state: PlayerState::Ready,
            to_state: allowed.then_some(PlayerState::Playing),
            allowed,
            no_op,
            reason: (!allowed).then(|| "PLAY not allowed in idle".to_string()),
            handler_error: None,
            processing_ms: sequence as f64,
        }
    }

    #[test]
    fn test_counters_sum_to_total() {
        let diagnostics = Diagnostics::new(10);
        diagnostics.record(&entry(1, true, false));
        diagnostics.record(&entry(2, false, false));
        diagnostics.record(&entry(3, true, true));
        diagnostics.record(&entry(4, true, false));

        let m = diagnostics.metrics();
        assert_eq!(m.total_events_processed, 4);
        assert_eq!(m.state_transition_count, 2);
        assert_eq!(m.rejected_transition_count, 1);
        assert_eq!(m.no_op_count, 1);
        assert_eq!(
            m.state_transition_count + m.rejected_transition_count + m.no_op_count,
            m.total_events_processed
        );
        assert_eq!(m.average_processing_ms, 2.5);
        assert_eq!(m.max_processing_ms, 4.0);
    }

    #[test]
    fn test_history_drops_oldest() {
        let diagnostics = Diagnostics::new(3);
        for seq in 1..=5 {
            diagnostics.record(&entry(seq, true, false));
        }
        let sequences: Vec<u64> = diagnostics.history().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![3, 4, 5]);
        assert_eq!(diagnostics.metrics().total_events_processed, 5);
    }

    #[test]
    fn test_export_shape() {
        let diagnostics = Diagnostics::new(5);
        diagnostics.record(&entry(1, false, false));
        diagnostics.on_state_update(&StateContext::default());

        let json = serde_json::to_value(diagnostics.export()).unwrap();
        assert_eq!(json["metrics"]["rejectedTransitionCount"], 1);
        assert_eq!(json["context"]["currentState"], "idle");
        assert_eq!(json["transitionHistory"][0]["allowed"], false);
        assert_eq!(json["transitionHistory"][0]["event"], "PLAY");
        assert_eq!(json["lastDiagnosticEvent"]["sequence"], 1);
    }
}
