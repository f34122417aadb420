//! # Shelfplay Player Library
//!
//! Player State Coordinator for an audiobook/podcast client.
//!
//! **Purpose:** Serialize every playback input (user commands, native-engine
//! callbacks, session and sync notifications, app lifecycle) through one
//! ordered bus, validate each against the Transition Table and publish
//! immutable context snapshots to subscribers.
//!
//! **Architecture:** A single coordinator task owns the context. Native
//! engine, session log, progress server and state blob sit behind traits
//! in [`services`]; SQLite adapters live in [`db`]; [`api`] exposes an
//! HTTP/SSE control surface.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod reconcile;
pub mod services;

pub use coordinator::{Coordinator, CoordinatorHandle, StateContext};
pub use error::{Error, Result};
