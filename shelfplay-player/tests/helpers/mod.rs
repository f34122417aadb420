//! Test helper modules for shelfplay-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - Fakes: recording native engine and in-memory session log, progress
//!   server and state store
//! - Harness: coordinator wiring, track builder, transition recorder

#![allow(dead_code)]

pub mod fakes;
pub mod harness;

// Re-export commonly used types
pub use fakes::{MemorySessionLog, MemoryStateStore, RecordingEngine, ScriptedProgressSync};
pub use harness::{track, TestPlayer, TransitionRecorder};
