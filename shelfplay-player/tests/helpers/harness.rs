//! Coordinator wiring for integration tests

use super::fakes::{MemorySessionLog, MemoryStateStore, RecordingEngine, ScriptedProgressSync};
use shelfplay_common::events::{Chapter, PlayerEvent, PlayerState, TrackDescriptor};
use shelfplay_player::config::CoordinatorSettings;
use shelfplay_player::coordinator::{
    bus, Collaborators, Coordinator, CoordinatorHandle, EventSource, StateContext,
    StateSubscriber, TransitionHistoryEntry,
};
use std::sync::{Arc, Mutex};

/// Audiobook with three chapters over 1200 seconds
pub fn track(library_item_id: &str) -> TrackDescriptor {
    TrackDescriptor {
        library_item_id: library_item_id.to_string(),
        episode_id: None,
        title: format!("Book {}", library_item_id),
        author: Some("Test Author".to_string()),
        source: format!("https://books.example.invalid/stream/{}", library_item_id),
        is_local: false,
        duration: 1200.0,
        chapters: vec![
            Chapter { id: 0, start: 0.0, end: 300.0, title: "Opening".to_string() },
            Chapter { id: 1, start: 300.0, end: 900.0, title: "Middle".to_string() },
            Chapter { id: 2, start: 900.0, end: 1200.0, title: "Ending".to_string() },
        ],
    }
}

/// Subscriber that keeps every history entry it is shown
#[derive(Default)]
pub struct TransitionRecorder {
    entries: Mutex<Vec<TransitionHistoryEntry>>,
    updates: Mutex<u64>,
}

impl TransitionRecorder {
    pub fn entries(&self) -> Vec<TransitionHistoryEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> u64 {
        *self.updates.lock().unwrap()
    }

    /// Distinct committed states in order, repeats collapsed
    pub fn state_path(&self) -> Vec<PlayerState> {
        let mut path: Vec<PlayerState> = Vec::new();
        for entry in self.entries() {
            if let Some(to) = entry.to_state {
                if path.last() != Some(&to) {
                    path.push(to);
                }
            }
        }
        path
    }
}

impl StateSubscriber for TransitionRecorder {
    fn on_state_update(&self, _context: &StateContext) {
        *self.updates.lock().unwrap() += 1;
    }

    fn on_transition(&self, entry: &TransitionHistoryEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

/// Running coordinator with handles to every fake
pub struct TestPlayer {
    pub handle: CoordinatorHandle,
    pub engine: Arc<RecordingEngine>,
    pub sessions: Arc<MemorySessionLog>,
    pub sync: Arc<ScriptedProgressSync>,
    pub store: Arc<MemoryStateStore>,
    pub recorder: Arc<TransitionRecorder>,
}

impl TestPlayer {
    pub fn start() -> Self {
        Self::start_with(CoordinatorSettings::default())
    }

    pub fn start_with(settings: CoordinatorSettings) -> Self {
        let engine = Arc::new(RecordingEngine::default());
        let sessions = Arc::new(MemorySessionLog::default());
        let sync = Arc::new(ScriptedProgressSync::default());
        let store = Arc::new(MemoryStateStore::default());

        let (sender, inbox) = bus::channel();
        let collaborators = Collaborators {
            native: engine.clone(),
            sessions: sessions.clone(),
            sync: sync.clone(),
            store: store.clone(),
        };
        let handle = Coordinator::new(inbox, sender, collaborators, settings).spawn();

        let recorder = Arc::new(TransitionRecorder::default());
        handle.subscribe(recorder.clone());

        Self {
            handle,
            engine,
            sessions,
            sync,
            store,
            recorder,
        }
    }

    /// Dispatch a UI command and wait for the queue to drain
    pub async fn send(&self, event: PlayerEvent) -> Arc<StateContext> {
        self.handle.dispatch(event);
        self.handle.settled().await;
        self.handle.context()
    }

    /// Dispatch on behalf of the native engine and wait for the queue to drain
    pub async fn native(&self, event: PlayerEvent) -> Arc<StateContext> {
        self.handle.dispatch_from(EventSource::Native, event);
        self.handle.settled().await;
        self.handle.context()
    }

    /// Load `track` and acknowledge it natively, ending in `ready`
    pub async fn load_ready(&self, track: TrackDescriptor) -> Arc<StateContext> {
        self.send(PlayerEvent::LoadTrack {
            track,
            start_position: None,
            auto_play: false,
        })
        .await;
        self.native(PlayerEvent::NativeTrackChanged { track: None }).await
    }

    pub fn state(&self) -> PlayerState {
        self.handle.context().current_state
    }
}
