//! Position reconciliation and smart rewind
//!
//! Pure functions of their inputs. The coordinator gathers the candidates
//! (native engine, local session log, server) and dispatches the outcome as
//! POSITION_RECONCILED.

use shelfplay_common::events::{PositionReport, ReconciliationOutcome, ReconciliationSource};
use std::time::Duration;

/// Position candidates gathered for one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReconcileInputs {
    /// What the native engine reports right now
    pub native_position: Option<f64>,
    /// Latest still-open local session
    pub local: Option<PositionReport>,
    /// Server progress; absent when offline or unknown
    pub server: Option<PositionReport>,
    /// Position the UI was last showing
    pub displayed_position: f64,
}

/// Pick the authoritative position
///
/// Server wins only when strictly newer than the local session; equal
/// timestamps keep the local position. With neither candidate the native
/// position (or the displayed one) stands.
pub fn reconcile(inputs: &ReconcileInputs, jump_threshold_secs: f64) -> ReconciliationOutcome {
    let (source, position) = match (inputs.local, inputs.server) {
        (Some(local), Some(server)) if server.updated_at > local.updated_at => {
            (ReconciliationSource::UseServer, server.position)
        }
        (Some(local), _) => (ReconciliationSource::UseLocal, local.position),
        (None, Some(server)) => (ReconciliationSource::UseServer, server.position),
        (None, None) => (
            ReconciliationSource::NoConflict,
            inputs.native_position.unwrap_or(inputs.displayed_position),
        ),
    };
    let position = position.max(0.0);

    ReconciliationOutcome {
        source,
        position,
        previous_position: inputs.displayed_position,
        should_show_undo: (position - inputs.displayed_position).abs() > jump_threshold_secs,
    }
}

/// Rewind applied on resume, scaled by how long playback sat idle
pub fn smart_rewind_secs(idle: Duration) -> f64 {
    match idle.as_secs() {
        0..=9 => 0.0,
        10..=59 => 3.0,
        60..=299 => 10.0,
        300..=1799 => 20.0,
        _ => 30.0,
    }
}

/// Resume position after smart rewind, floored at zero
pub fn apply_smart_rewind(position: f64, idle: Duration) -> f64 {
    (position - smart_rewind_secs(idle)).max(0.0)
}
