//! Settings database access
//!
//! Read/write the `settings` key/value table. Runtime tuning for the
//! coordinator lives here; a value missing on first read is written back
//! with its built-in default so the table documents what is in effect.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::info;

/// Read a setting, writing `default` back when the key is absent
pub async fn get_or_init<T>(db: &Pool<Sqlite>, key: &str, default: T) -> Result<T>
where
    T: FromStr + ToString,
{
    match get_setting::<T>(db, key).await? {
        Some(value) => Ok(value),
        None => {
            info!("Setting '{}' not found, storing default {}", key, default.to_string());
            set_setting(db, key, default.to_string()).await?;
            Ok(default)
        }
    }
}

/// Generic setting getter
///
/// Returns None if key doesn't exist in database.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

/// Remove a setting; absent keys are not an error
pub async fn delete_setting(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_get_setting_missing_is_none() {
        let db = setup_test_db().await;
        let value: Option<u64> = get_setting(&db, "undo_window_secs").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let db = setup_test_db().await;
        set_setting(&db, "jump_forward_secs", 45.0f64).await.unwrap();
        set_setting(&db, "jump_forward_secs", 15.0f64).await.unwrap();

        let value: Option<f64> = get_setting(&db, "jump_forward_secs").await.unwrap();
        assert_eq!(value, Some(15.0));
    }

    #[tokio::test]
    async fn test_get_or_init_writes_default_back() {
        let db = setup_test_db().await;
        let value: u32 = get_or_init(&db, "max_native_failures", 3u32).await.unwrap();
        assert_eq!(value, 3);

        let stored: Option<String> = get_setting(&db, "max_native_failures").await.unwrap();
        assert_eq!(stored.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_get_or_init_keeps_existing_value() {
        let db = setup_test_db().await;
        set_setting(&db, "history_capacity", 250usize).await.unwrap();

        let value: usize = get_or_init(&db, "history_capacity", 100usize).await.unwrap();
        assert_eq!(value, 250);
    }

    #[tokio::test]
    async fn test_unparseable_value_is_config_error() {
        let db = setup_test_db().await;
        set_setting(&db, "undo_window_secs", "soon").await.unwrap();

        let result = get_setting::<u64>(&db, "undo_window_secs").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_coordinator_settings_load_populates_table() {
        let db = setup_test_db().await;
        set_setting(&db, "undo_window_secs", 90u64).await.unwrap();

        let settings = crate::config::CoordinatorSettings::load(&db, "reader").await.unwrap();
        assert_eq!(settings.user_id, "reader");
        assert_eq!(settings.undo_window_secs, 90);
        assert_eq!(settings.history_capacity, 100);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 9);
    }
}
