//! Persisted player-state blob
//!
//! Stored as JSON under the `player_state` key of the settings table and
//! read once at cold start to seed RESTORE_STATE.

use super::settings::{delete_setting, get_setting, set_setting};
use crate::error::{Error, Result};
use crate::services::PlayerStateStore;
use async_trait::async_trait;
use shelfplay_common::events::PersistedPlayerState;
use sqlx::{Pool, Sqlite};
use tracing::{debug, warn};

const PLAYER_STATE_KEY: &str = "player_state";

/// SQLite-backed [`PlayerStateStore`]
#[derive(Clone)]
pub struct SqliteStateStore {
    db: Pool<Sqlite>,
}

impl SqliteStateStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PlayerStateStore for SqliteStateStore {
    async fn save(&self, state: &PersistedPlayerState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        set_setting(&self.db, PLAYER_STATE_KEY, json).await?;
        debug!(position = state.position, "Persisted player state");
        Ok(())
    }

    async fn load(&self) -> Result<Option<PersistedPlayerState>> {
        let Some(json) = get_setting::<String>(&self.db, PLAYER_STATE_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!("Discarding unreadable persisted player state: {}", e);
                Err(Error::Persistence(e.to_string()))
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        delete_setting(&self.db, PLAYER_STATE_KEY).await
    }
}
