//! # Shelfplay Common Library
//!
//! Shared vocabulary for the shelfplay audiobook player:
//! - Player states and the closed `PlayerEvent` set
//! - Track, chapter and session descriptors
//! - Position reconciliation result types
//! - Persisted player-state blob
//! - Configuration folder resolution
//! - Time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{PlayerEvent, PlayerEventType, PlayerState};
