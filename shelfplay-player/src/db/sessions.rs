//! Local play-session log
//!
//! One row per listening session keyed by (user, library item). Sessions
//! stay open until ended; restore reads the most recently updated open one.

use crate::error::{Error, Result};
use crate::services::{SessionKey, SessionLog, SessionRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfplay_common::events::TrackDescriptor;
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;
use uuid::Uuid;

/// SQLite-backed [`SessionLog`]
#[derive(Clone)]
pub struct SqliteSessionLog {
    db: Pool<Sqlite>,
}

impl SqliteSessionLog {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Session(format!("Invalid {} '{}': {}", column, value, e)))
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord> {
    let started_at: String = row.get("started_at");
    let updated_at: String = row.get("updated_at");
    let ended_at: Option<String> = row.get("ended_at");

    Ok(SessionRecord {
        session_id: row.get("session_id"),
        user_id: row.get("user_id"),
        library_item_id: row.get("library_item_id"),
        episode_id: row.get("episode_id"),
        title: row.get("title"),
        position: row.get("position"),
        time_listened: row.get("time_listened"),
        playback_rate: row.get("playback_rate"),
        started_at: parse_timestamp("started_at", &started_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
        ended_at: ended_at
            .as_deref()
            .map(|v| parse_timestamp("ended_at", v))
            .transpose()?,
    })
}

#[async_trait]
impl SessionLog for SqliteSessionLog {
    async fn start_session(
        &self,
        key: &SessionKey,
        track: &TrackDescriptor,
        position: f64,
        playback_rate: f64,
    ) -> Result<SessionRecord> {
        let now = shelfplay_common::time::now();
        let record = SessionRecord {
            session_id: Uuid::new_v4().to_string(),
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

        sqlx::query(
            r#"
            INSERT INTO play_sessions (
                session_id, user_id, library_item_id, episode_id, title,
                position, time_listened, playback_rate, started_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.session_id)
        .bind(&record.user_id)
        .bind(&record.library_item_id)
        .bind(&record.episode_id)
        .bind(&record.title)
        .bind(record.position)
        .bind(record.time_listened)
        .bind(record.playback_rate)
        .bind(record.started_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        debug!(session_id = %record.session_id, item = %record.library_item_id, "Started play session");
        Ok(record)
    }

    async fn update_session(
        &self,
        session_id: &str,
        position: f64,
        time_listened: f64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE play_sessions
            SET position = ?, time_listened = ?, updated_at = ?
            WHERE session_id = ? AND ended_at IS NULL
            "#,
        )
        .bind(position)
        .bind(time_listened)
        .bind(shelfplay_common::time::now().to_rfc3339())
        .bind(session_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Session(format!("No open session {}", session_id)));
        }
        Ok(())
    }

    async fn end_session(&self, session_id: &str, position: f64) -> Result<()> {
        let now = shelfplay_common::time::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE play_sessions
            SET position = ?, updated_at = ?, ended_at = ?
            WHERE session_id = ? AND ended_at IS NULL
            "#,
        )
        .bind(position)
        .bind(&now)
        .bind(&now)
        .bind(session_id)
        .execute(&self.db)
        .await?;

        debug!(session_id, "Ended play session");
        Ok(())
    }

    async fn latest_open_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, user_id, library_item_id, episode_id, title,
                   position, time_listened, playback_rate,
                   started_at, updated_at, ended_at
            FROM play_sessions
            WHERE user_id = ? AND library_item_id = ? AND ended_at IS NULL
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(&key.user_id)
        .bind(&key.library_item_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }
}
