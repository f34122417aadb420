//! Position reconciliation result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A position report from one source, stamped with when it was recorded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    pub position: f64,
    pub updated_at: DateTime<Utc>,
}

/// Which candidate won reconciliation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationSource {
    /// Server progress strictly newer than the local session
    UseServer,
    /// Local session at least as new as the server
    UseLocal,
    /// Nothing to arbitrate (a single candidate, or none)
    NoConflict,
}

impl std::fmt::Display for ReconciliationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReconciliationSource::UseServer => "use_server",
            ReconciliationSource::UseLocal => "use_local",
            ReconciliationSource::NoConflict => "no_conflict",
        };
        f.write_str(s)
    }
}

/// Result carried by POSITION_RECONCILED
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationOutcome {
    pub source: ReconciliationSource,
    /// Authoritative resume position (seconds)
    pub position: f64,
    /// Position the UI was showing before reconciliation
    pub previous_position: f64,
    /// Jump exceeded the threshold; offer a one-shot undo
    pub should_show_undo: bool,
}
