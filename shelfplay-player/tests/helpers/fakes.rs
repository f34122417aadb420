//! In-memory collaborators
//!
//! Each fake records what the coordinator asked of it and can be switched
//! into a failing mode to exercise error paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfplay_common::events::{PersistedPlayerState, PositionReport, TrackDescriptor};
use shelfplay_player::error::{Error, Result};
use shelfplay_player::services::{
    NativeAudioEngine, PlayerStateStore, ProgressSync, SessionKey, SessionLog, SessionRecord,
    SessionSyncPayload,
};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

// ============================================================================
// Native engine
// ============================================================================

/// Native engine that records every command and emits no events
///
/// Tests drive NATIVE_* events themselves through the handle.
#[derive(Default)]
pub struct RecordingEngine {
    commands: Mutex<Vec<String>>,
    failing: Mutex<Option<String>>,
    position: Mutex<Option<f64>>,
}

impl RecordingEngine {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }

    /// Fail every command except `stop` with the given native code
    pub fn fail_with(&self, code: &str) {
        *self.failing.lock().unwrap() = Some(code.to_string());
    }

    pub fn recover(&self) {
        *self.failing.lock().unwrap() = None;
    }

    pub fn set_position(&self, position: Option<f64>) {
        *self.position.lock().unwrap() = position;
    }

    fn run(&self, command: String) -> Result<()> {
        self.commands.lock().unwrap().push(command);
        match self.failing.lock().unwrap().as_ref() {
            Some(code) => Err(Error::Native {
                message: "output device unavailable".to_string(),
                code: Some(code.clone()),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NativeAudioEngine for RecordingEngine {
    async fn load(&self, track: &TrackDescriptor, start_position: f64) -> Result<()> {
        self.run(format!("load {} @{}", track.library_item_id, start_position))
    }

    async fn play(&self) -> Result<()> {
        self.run("play".to_string())
    }

    async fn pause(&self) -> Result<()> {
        self.run("pause".to_string())
    }

    async fn stop(&self) -> Result<()> {
        self.commands.lock().unwrap().push("stop".to_string());
        Ok(())
    }

    async fn seek(&self, position: f64) -> Result<()> {
        self.run(format!("seek {}", position))
    }

    async fn set_rate(&self, rate: f64) -> Result<()> {
        self.run(format!("rate {}", rate))
    }

    async fn set_volume(&self, volume: f64) -> Result<()> {
        self.run(format!("volume {}", volume))
    }

    async fn position(&self) -> Option<f64> {
        *self.position.lock().unwrap()
    }
}

// ============================================================================
// Session log
// ============================================================================

#[derive(Default)]
pub struct MemorySessionLog {
    records: Mutex<Vec<SessionRecord>>,
    next_id: Mutex<u32>,
}

impl MemorySessionLog {
    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Seed an open session, e.g. one left behind by a previous run
    pub fn insert(&self, record: SessionRecord) {
        self.records.lock().unwrap().push(record);
    }

    /// Open session record for `library_item_id` at `position`, last touched at `updated_at`
    pub fn open_record(
        library_item_id: &str,
        position: f64,
        updated_at: DateTime<Utc>,
    ) -> SessionRecord {
        SessionRecord {
            session_id: format!("seed-{}", library_item_id),
            user_id: "local".to_string(),
            library_item_id: library_item_id.to_string(),
            episode_id: None,
            title: "Seeded".to_string(),
            position,
            time_listened: 0.0,
            playback_rate: 1.0,
            started_at: updated_at,
            updated_at,
            ended_at: None,
        }
    }
}

#[async_trait]
impl SessionLog for MemorySessionLog {
    async fn start_session(
        &self,
        key: &SessionKey,
        track: &TrackDescriptor,
        position: f64,
        playback_rate: f64,
    ) -> Result<SessionRecord> {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("session-{}", *next)
        };
        let now = Utc::now();
        let record = SessionRecord {
            session_id: id,
            user_id: key.user_id.clone(),
            library_item_id: key.library_item_id.clone(),
            episode_id: track.episode_id.clone(),
            title: track.title.clone(),
            position,
            time_listened: 0.0,
            playback_rate,
            started_at: now,
            updated_at: now,
            ended_at: None,
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update_session(&self, session_id: &str, position: f64, time_listened: f64) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.session_id == session_id && r.ended_at.is_none())
            .ok_or_else(|| Error::Session(format!("no open session {}", session_id)))?;
        record.position = position;
        record.time_listened = time_listened;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn end_session(&self, session_id: &str, position: f64) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.session_id == session_id) {
            record.position = position;
            record.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn latest_open_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.library_item_id == key.library_item_id && r.ended_at.is_none())
            .max_by_key(|r| r.updated_at)
            .cloned())
    }
}

// ============================================================================
// Progress server
// ============================================================================

/// Progress server with a scripted answer and a push log
#[derive(Default)]
pub struct ScriptedProgressSync {
    progress: Mutex<Option<PositionReport>>,
    pushes: Mutex<Vec<SessionSyncPayload>>,
    reject_pushes: Mutex<bool>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedProgressSync {
    pub fn set_progress(&self, report: Option<PositionReport>) {
        *self.progress.lock().unwrap() = report;
    }

    pub fn reject_pushes(&self, reject: bool) {
        *self.reject_pushes.lock().unwrap() = reject;
    }

    pub fn pushes(&self) -> Vec<SessionSyncPayload> {
        self.pushes.lock().unwrap().clone()
    }

    /// Park every push until `release_pushes`
    pub fn hold_pushes(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_pushes(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.close();
        }
    }
}

#[async_trait]
impl ProgressSync for ScriptedProgressSync {
    async fn fetch_latest_progress(&self, _library_item_id: &str) -> Result<Option<PositionReport>> {
        Ok(*self.progress.lock().unwrap())
    }

    async fn push_session(&self, payload: &SessionSyncPayload) -> Result<()> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            // Closed on release
            let _ = gate.acquire().await;
        }
        if *self.reject_pushes.lock().unwrap() {
            return Err(Error::Sync("server returned 503".to_string()));
        }
        self.pushes.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

// ============================================================================
// State store
// ============================================================================

#[derive(Default)]
pub struct MemoryStateStore {
    saved: Mutex<Option<PersistedPlayerState>>,
    saves: Mutex<u32>,
}

impl MemoryStateStore {
    pub fn saved(&self) -> Option<PersistedPlayerState> {
        self.saved.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> u32 {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl PlayerStateStore for MemoryStateStore {
    async fn save(&self, state: &PersistedPlayerState) -> Result<()> {
        *self.saved.lock().unwrap() = Some(state.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }

    async fn load(&self) -> Result<Option<PersistedPlayerState>> {
        Ok(self.saved())
    }

    async fn clear(&self) -> Result<()> {
        *self.saved.lock().unwrap() = None;
        Ok(())
    }
}
