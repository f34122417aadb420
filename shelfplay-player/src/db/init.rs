//! Database initialization
//!
//! Opens the pool and creates tables idempotently at startup.

use crate::error::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open (creating if needed) the SQLite database at `path`
pub async fn connect(path: &Path) -> Result<Pool<Sqlite>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(60)))
        .connect(&db_url)
        .await?;

    info!("Connected to database: {}", path.display());
    Ok(pool)
}

/// Create the settings and play_sessions tables if missing
pub async fn init_schema(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS play_sessions (
            session_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            library_item_id TEXT NOT NULL,
            episode_id TEXT,
            title TEXT NOT NULL,
            position REAL NOT NULL DEFAULT 0,
            time_listened REAL NOT NULL DEFAULT 0,
            playback_rate REAL NOT NULL DEFAULT 1,
            started_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_play_sessions_open
         ON play_sessions (user_id, library_item_id, ended_at, updated_at)",
    )
    .execute(pool)
    .await?;

    info!("Database schema ready");
    Ok(())
}
