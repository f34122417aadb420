//! Simulated native audio engine
//!
//! Stand-in for a platform audio engine: acknowledges commands and emits
//! the callbacks a real engine would through the Event Bus. Commanded
//! play/pause are acknowledged by return value only; externally visible
//! changes (track loaded, stopped, ended) and progress ticks arrive as
//! `NATIVE_*` events.

use super::NativeAudioEngine;
use crate::coordinator::{EventSender, EventSource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use shelfplay_common::events::{NativePlaybackState, PlayerEvent, TrackDescriptor};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Progress tick period
const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct EngineState {
    track: Option<TrackDescriptor>,
    position: f64,
    rate: f64,
    volume: f64,
    playing: bool,
}

/// Tokio-driven engine emitting NATIVE_* events
pub struct SimulatedNativeEngine {
    events: EventSender,
    state: Arc<Mutex<EngineState>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    tick: Duration,
}

impl SimulatedNativeEngine {
    pub fn new(events: EventSender) -> Self {
        Self::with_tick(events, TICK)
    }

    /// Engine with a custom progress period
    pub fn with_tick(events: EventSender, tick: Duration) -> Self {
        Self {
            events,
            state: Arc::new(Mutex::new(EngineState {
                rate: 1.0,
                volume: 1.0,
                ..Default::default()
            })),
            ticker: Mutex::new(None),
            tick,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        lock_state(&self.state)
    }

    fn emit(&self, event: PlayerEvent) {
        self.events.send_from(EventSource::Native, event);
    }

    fn start_ticker(&self) {
        let mut ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if ticker.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let state = self.state.clone();
        let events = self.events.clone();
        let tick = self.tick;
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            loop {
                interval.tick().await;
                let (position, duration, ended) = {
                    let mut s = lock_state(&state);
                    let Some(track) = s.track.as_ref() else { break };
                    if !s.playing {
                        break;
                    }
                    let duration = track.duration;
                    s.position = (s.position + tick.as_secs_f64() * s.rate).min(duration);
                    let ended = duration > 0.0 && s.position >= duration;
                    if ended {
                        s.playing = false;
                    }
                    (s.position, duration, ended)
                };

                events.send_from(
                    EventSource::Native,
                    PlayerEvent::NativeProgressUpdated {
                        position,
                        duration,
                        buffered: Some(duration),
                    },
                );
                if ended {
                    events.send_from(
                        EventSource::Native,
                        PlayerEvent::NativeStateChanged {
                            state: NativePlaybackState::Ended,
                        },
                    );
                    break;
                }
            }
        }));
    }

    fn stop_ticker(&self) {
        if let Some(ticker) = self
            .ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            ticker.abort();
        }
    }
}

fn lock_state(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl Drop for SimulatedNativeEngine {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[async_trait]
impl NativeAudioEngine for SimulatedNativeEngine {
    async fn load(&self, track: &TrackDescriptor, start_position: f64) -> Result<()> {
        if track.source.is_empty() {
            return Err(Error::Native {
                message: format!("No source for '{}'", track.title),
                code: Some("E_NO_SOURCE".to_string()),
            });
        }
        self.stop_ticker();
        {
            let mut s = self.lock();
            s.track = Some(track.clone());
            s.position = start_position.max(0.0);
            s.playing = false;
        }
        debug!("Simulated engine loaded {}", track.source);
        self.emit(PlayerEvent::NativeTrackChanged {
            track: Some(track.clone()),
        });
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        {
            let mut s = self.lock();
            if s.track.is_none() {
                return Err(Error::native("play without a loaded track"));
            }
            s.playing = true;
        }
        self.start_ticker();
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.lock().playing = false;
        self.stop_ticker();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stop_ticker();
        {
            let mut s = self.lock();
            s.track = None;
            s.position = 0.0;
            s.playing = false;
        }
        self.emit(PlayerEvent::NativeStateChanged {
            state: NativePlaybackState::Stopped,
        });
        Ok(())
    }

    async fn seek(&self, position: f64) -> Result<()> {
        let mut s = self.lock();
        let Some(track) = s.track.as_ref() else {
            return Err(Error::native("seek without a loaded track"));
        };
        let duration = track.duration;
        s.position = if duration > 0.0 {
            position.clamp(0.0, duration)
        } else {
            position.max(0.0)
        };
        Ok(())
    }

    async fn set_rate(&self, rate: f64) -> Result<()> {
        self.lock().rate = rate;
        Ok(())
    }

    async fn set_volume(&self, volume: f64) -> Result<()> {
        self.lock().volume = volume;
        Ok(())
    }

    async fn position(&self) -> Option<f64> {
        let s = self.lock();
        s.track.as_ref().map(|_| s.position)
    }
}
