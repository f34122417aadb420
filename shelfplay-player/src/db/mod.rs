//! Database access layer
//!
//! SQLite-backed adapters: runtime settings, the persisted player-state
//! blob and the local play-session log.

pub mod init;
pub mod player_state;
pub mod sessions;
pub mod settings;

pub use init::{connect, init_schema};
pub use player_state::SqliteStateStore;
pub use sessions::SqliteSessionLog;
