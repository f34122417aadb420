//! Integration tests for the playback lifecycle
//!
//! Drives a coordinator with in-memory collaborators through load, play,
//! progress, seek, pause and stop, checking the committed context and the
//! commands issued to the native engine.

mod helpers;

use helpers::{track, MemorySessionLog, MemoryStateStore, ScriptedProgressSync, TestPlayer};
use shelfplay_common::events::{NativePlaybackState, PlayerEvent, PlayerEventType, PlayerState};
use shelfplay_player::config::CoordinatorSettings;
use shelfplay_player::coordinator::{bus, Collaborators, Coordinator, CoordinatorHandle};
use shelfplay_player::services::SimulatedNativeEngine;
use std::sync::Arc;
use std::time::Duration;

fn progress(position: f64) -> PlayerEvent {
    PlayerEvent::NativeProgressUpdated {
        position,
        duration: 1200.0,
        buffered: None,
    }
}

#[tokio::test]
async fn test_full_listening_session() {
    let player = TestPlayer::start();

    let ctx = player
        .send(PlayerEvent::LoadTrack {
            track: track("li_1"),
            start_position: Some(42.0),
            auto_play: false,
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Loading);
    assert!(ctx.is_loading_track);
    assert_eq!(ctx.position, 42.0);
    assert_eq!(ctx.session_id.as_deref(), Some("session-1"));
    assert_eq!(player.store.saved().unwrap().position, 42.0);

    let ctx = player
        .native(PlayerEvent::NativeTrackChanged { track: None })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Ready);
    assert!(!ctx.is_loading_track);

    let ctx = player.send(PlayerEvent::Play).await;
    assert_eq!(ctx.current_state, PlayerState::Playing);
    assert!(ctx.is_playing);

    let ctx = player.native(progress(47.0)).await;
    assert_eq!(ctx.current_state, PlayerState::Playing);
    assert_eq!(ctx.position, 47.0);
    assert!((ctx.time_listened - 5.0).abs() < 1e-9);
    assert!(ctx.last_server_sync.is_some());
    assert!(ctx.pending_sync_position.is_none());
    assert_eq!(player.sessions.records()[0].position, 47.0);
    assert_eq!(player.sync.pushes().len(), 1);

    let ctx = player.send(PlayerEvent::Pause).await;
    assert_eq!(ctx.current_state, PlayerState::Paused);
    assert!(!ctx.is_playing);
    assert_eq!(player.sync.pushes().len(), 2);

    let ctx = player.send(PlayerEvent::Stop).await;
    assert_eq!(ctx.current_state, PlayerState::Stopping);
    assert!(ctx.session_id.is_none());
    assert!(player.sessions.records()[0].ended_at.is_some());

    let ctx = player
        .native(PlayerEvent::NativeStateChanged {
            state: NativePlaybackState::Stopped,
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Idle);
    assert!(ctx.current_track.is_none());
    assert_eq!(ctx.position, 0.0);
    assert!(player.store.saved().is_none());

    assert_eq!(
        player.recorder.state_path(),
        vec![
            PlayerState::Loading,
            PlayerState::Ready,
            PlayerState::Playing,
            PlayerState::Paused,
            PlayerState::Stopping,
            PlayerState::Idle,
        ]
    );
    assert_eq!(
        player.engine.commands(),
        vec!["load li_1 @42", "play", "pause", "stop"]
    );
}

#[tokio::test]
async fn test_auto_play_reaches_playing() {
    let player = TestPlayer::start();
    let ctx = player
        .send(PlayerEvent::LoadTrack {
            track: track("li_1"),
            start_position: None,
            auto_play: true,
        })
        .await;

    assert_eq!(ctx.current_state, PlayerState::Playing);
    assert_eq!(ctx.session_id.as_deref(), Some("session-1"));
    assert_eq!(player.engine.commands(), vec!["load li_1 @0", "play"]);
}

#[tokio::test]
async fn test_rate_and_volume_are_clamped_and_survive_stop() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;

    let ctx = player.send(PlayerEvent::SetRate { rate: 9.0 }).await;
    assert_eq!(ctx.playback_rate, 3.0);
    let ctx = player.send(PlayerEvent::SetVolume { volume: -1.0 }).await;
    assert_eq!(ctx.volume, 0.0);

    player.send(PlayerEvent::Stop).await;
    let ctx = player
        .native(PlayerEvent::NativeStateChanged {
            state: NativePlaybackState::Stopped,
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Idle);
    assert_eq!(ctx.playback_rate, 3.0);
    assert_eq!(ctx.volume, 0.0);
}

#[tokio::test]
async fn test_seek_while_playing_resumes_playback() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;
    player.send(PlayerEvent::Play).await;

    let ctx = player.send(PlayerEvent::Seek { position: 600.0 }).await;
    assert_eq!(ctx.current_state, PlayerState::Playing);
    assert_eq!(ctx.position, 600.0);
    assert!(!ctx.is_seeking);
    assert_eq!(ctx.current_chapter.as_ref().map(|c| c.id), Some(1));
    assert!(player.engine.commands().contains(&"seek 600".to_string()));
}

#[tokio::test]
async fn test_seek_while_paused_stays_paused() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;
    player.send(PlayerEvent::Pause).await;

    let ctx = player.send(PlayerEvent::Seek { position: 950.0 }).await;
    assert_eq!(ctx.current_state, PlayerState::Paused);
    assert_eq!(ctx.position, 950.0);
    assert_eq!(ctx.current_chapter.as_ref().map(|c| c.id), Some(2));
}

#[tokio::test]
async fn test_seek_burst_lands_on_latest_target() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;
    player.send(PlayerEvent::Play).await;

    player.handle.dispatch(PlayerEvent::Seek { position: 100.0 });
    player.handle.dispatch(PlayerEvent::Seek { position: 200.0 });
    player.handle.dispatch(PlayerEvent::Seek { position: 300.0 });
    player.handle.settled().await;

    let ctx = player.handle.context();
    assert_eq!(ctx.current_state, PlayerState::Playing);
    assert_eq!(ctx.position, 300.0);

    let completions = player
        .recorder
        .entries()
        .iter()
        .filter(|e| e.event == PlayerEventType::SeekComplete)
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn test_seek_is_clamped_to_duration() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;

    let ctx = player.send(PlayerEvent::Seek { position: 5000.0 }).await;
    assert_eq!(ctx.position, 1200.0);

    let ctx = player
        .send(PlayerEvent::JumpBackward {
            seconds: Some(2000.0),
        })
        .await;
    assert_eq!(ctx.position, 0.0);
}

#[tokio::test]
async fn test_jump_uses_configured_lengths() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;

    let ctx = player.send(PlayerEvent::JumpForward { seconds: None }).await;
    assert_eq!(ctx.position, 30.0);
    let ctx = player.send(PlayerEvent::JumpBackward { seconds: None }).await;
    assert_eq!(ctx.position, 20.0);
}

#[tokio::test]
async fn test_progress_crossing_chapter_announces_it() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;
    player.send(PlayerEvent::Play).await;

    player.native(progress(295.0)).await;
    let ctx = player.native(progress(301.0)).await;
    assert_eq!(ctx.current_chapter.as_ref().map(|c| c.id), Some(1));

    let announced = player
        .recorder
        .entries()
        .iter()
        .filter(|e| e.event == PlayerEventType::ChapterChanged)
        .count();
    assert_eq!(announced, 1);
}

#[tokio::test]
async fn test_native_pause_and_end_mirror_into_paused() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;
    player.send(PlayerEvent::Play).await;

    let ctx = player
        .native(PlayerEvent::NativeStateChanged {
            state: NativePlaybackState::Paused,
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Paused);

    player
        .native(PlayerEvent::NativeStateChanged {
            state: NativePlaybackState::Playing,
        })
        .await;
    assert_eq!(player.state(), PlayerState::Playing);

    let ctx = player
        .native(PlayerEvent::NativeStateChanged {
            state: NativePlaybackState::Ended,
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Paused);
    assert_eq!(ctx.position, 1200.0);
}

#[tokio::test]
async fn test_buffering_round_trip() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;
    player.send(PlayerEvent::Play).await;

    let ctx = player
        .native(PlayerEvent::NativeStateChanged {
            state: NativePlaybackState::Buffering,
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Buffering);
    assert!(ctx.is_buffering);

    let ctx = player
        .native(PlayerEvent::NativeStateChanged {
            state: NativePlaybackState::Playing,
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Playing);
    assert!(!ctx.is_buffering);
    assert!(ctx.is_playing);
}

#[tokio::test]
async fn test_loading_new_track_ends_previous_session() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;
    player.send(PlayerEvent::Play).await;

    let ctx = player
        .send(PlayerEvent::LoadTrack {
            track: track("li_2"),
            start_position: None,
            auto_play: false,
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Loading);
    assert_eq!(ctx.current_track.as_ref().unwrap().library_item_id, "li_2");
    assert_eq!(ctx.session_id.as_deref(), Some("session-2"));

    let records = player.sessions.records();
    assert!(records[0].ended_at.is_some());
    assert!(records[1].ended_at.is_none());
}

#[tokio::test]
async fn test_reload_queue_swaps_source_and_keeps_playing() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;
    player.send(PlayerEvent::Play).await;
    player.engine.clear_commands();

    let mut downloaded = track("li_1");
    downloaded.source = "file:///downloads/li_1.m4b".to_string();
    downloaded.is_local = true;

    let ctx = player
        .send(PlayerEvent::ReloadQueue {
            track: Some(downloaded),
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Playing);
    assert!(ctx.current_track.as_ref().unwrap().is_local);
    assert_eq!(player.engine.commands(), vec!["load li_1 @0", "play"]);
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn test_play_and_pause_without_track_are_rejected() {
    let player = TestPlayer::start();

    let ctx = player.send(PlayerEvent::Play).await;
    assert_eq!(ctx.current_state, PlayerState::Idle);
    player.send(PlayerEvent::Pause).await;
    player.send(PlayerEvent::Seek { position: 10.0 }).await;

    let entries = player.recorder.entries();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| !e.allowed && e.to_state.is_none()));
    assert!(entries[0].reason.as_deref().unwrap().contains("no track loaded"));
    assert!(entries[1].reason.as_deref().unwrap().contains("no track loaded"));

    // Subscribers still hear about rejected events
    assert_eq!(player.recorder.update_count(), 3);
    assert!(player.engine.commands().is_empty());
    assert_eq!(
        player.handle.diagnostics().metrics().rejected_transition_count,
        3
    );
}

#[tokio::test]
async fn test_seek_while_loading_is_rejected() {
    let player = TestPlayer::start();
    player
        .send(PlayerEvent::LoadTrack {
            track: track("li_1"),
            start_position: None,
            auto_play: false,
        })
        .await;

    let ctx = player.send(PlayerEvent::Seek { position: 10.0 }).await;
    assert_eq!(ctx.current_state, PlayerState::Loading);
    assert_eq!(ctx.position, 0.0);

    let last = player.recorder.entries().pop().unwrap();
    assert_eq!(last.event, PlayerEventType::Seek);
    assert!(!last.allowed);
}

#[tokio::test]
async fn test_no_op_events_never_change_state() {
    let player = TestPlayer::start();
    player.load_ready(track("li_1")).await;

    let before = player.handle.context();
    let ctx = player.send(PlayerEvent::DismissPositionJump).await;
    assert_eq!(ctx.current_state, before.current_state);

    let last = player.recorder.entries().pop().unwrap();
    assert!(last.allowed);
    assert!(last.no_op);
    assert_eq!(last.to_state, Some(PlayerState::Ready));
}

/// Poll until `done` holds and only the held server push is outstanding
async fn wait_for_queue(handle: &CoordinatorHandle, done: impl Fn(&CoordinatorHandle) -> bool) {
    let sender = handle.event_sender();
    tokio::time::timeout(Duration::from_secs(2), async {
        while !(sender.pending() == 1 && done(handle)) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("queue did not drain");
}

#[tokio::test]
async fn test_stop_with_inline_engine_callback_stays_idle_during_push() {
    let (sender, inbox) = bus::channel();
    let sync = Arc::new(ScriptedProgressSync::default());
    let collaborators = Collaborators {
        native: Arc::new(SimulatedNativeEngine::with_tick(
            sender.clone(),
            Duration::from_secs(3600),
        )),
        sessions: Arc::new(MemorySessionLog::default()),
        sync: sync.clone(),
        store: Arc::new(MemoryStateStore::default()),
    };
    let handle =
        Coordinator::new(inbox, sender, collaborators, CoordinatorSettings::default()).spawn();

    handle.dispatch(PlayerEvent::LoadTrack {
        track: track("li_1"),
        start_position: None,
        auto_play: true,
    });
    handle.settled().await;
    assert_eq!(handle.context().current_state, PlayerState::Playing);

    // The engine queues NATIVE_STATE_CHANGED(stopped) from inside stop()
    sync.hold_pushes();
    handle.dispatch(PlayerEvent::Stop);
    wait_for_queue(&handle, |h| h.context().current_state == PlayerState::Idle).await;

    handle.dispatch(PlayerEvent::SetVolume { volume: 0.3 });
    wait_for_queue(&handle, |h| h.context().volume == 0.3).await;
    assert_eq!(handle.context().current_state, PlayerState::Idle);

    sync.release_pushes();
    handle.settled().await;

    let ctx = handle.context();
    assert_eq!(ctx.current_state, PlayerState::Idle);
    assert_eq!(ctx.volume, 0.3);
    assert_eq!(sync.pushes().len(), 1);

    let history = handle.diagnostics().history();
    assert!(history
        .iter()
        .all(|entry| entry.to_state != Some(PlayerState::SyncingSession)));
    assert_eq!(handle.diagnostics().metrics().rejected_transition_count, 0);
}

#[tokio::test]
async fn test_stale_native_track_is_ignored_while_idle() {
    let player = TestPlayer::start();

    let ctx = player
        .native(PlayerEvent::NativeTrackChanged {
            track: Some(track("li_stale")),
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Idle);
    assert!(ctx.current_track.is_none());
    assert_eq!(ctx.duration, 0.0);

    player.load_ready(track("li_1")).await;
    player.send(PlayerEvent::Stop).await;
    let ctx = player
        .native(PlayerEvent::NativeTrackChanged {
            track: Some(track("li_stale")),
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Stopping);
    assert_eq!(ctx.current_track.as_ref().unwrap().library_item_id, "li_1");

    let ctx = player
        .native(PlayerEvent::NativeStateChanged {
            state: NativePlaybackState::Stopped,
        })
        .await;
    assert_eq!(ctx.current_state, PlayerState::Idle);
    assert!(ctx.current_track.is_none());
}
