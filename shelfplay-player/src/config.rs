//! Configuration management for the shelfplay player
//!
//! Two-tier configuration:
//! 1. **TOML Bootstrap**: database path, port, server endpoint, logging
//!    (static, read once at startup)
//! 2. **Database Runtime**: coordinator tuning from the `settings` table;
//!    missing values are written back with built-in defaults
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--port, --database)
//! 2. Environment variables (via clap `env`)
//! 3. TOML configuration file
//! 4. Database settings table
//! 5. Built-in defaults (code constants)

use crate::error::{Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Bootstrap configuration loaded from TOML file
///
/// Every field has a default so a missing file still boots.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file (relative or absolute)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP control port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Progress server base URL; `None` runs offline
    #[serde(default)]
    pub server_url: Option<String>,

    /// Bearer token sent to the progress server
    #[serde(default)]
    pub api_token: Option<String>,

    /// Listener identity used to key local sessions
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            port: default_port(),
            server_url: None,
            api_token: None,
            user_id: default_user_id(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    5790
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_user_id() -> String {
    "local".to_string()
}

fn default_database_path() -> PathBuf {
    shelfplay_common::config::default_data_folder().join("shelfplay.db")
}

/// Coordinator tuning loaded from the `settings` table
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Listener identity for session-log keys
    pub user_id: String,
    /// Transition history ring size
    pub history_capacity: usize,
    /// Reconciliation jump that raises the undo notice (seconds)
    pub position_jump_threshold_secs: f64,
    /// How long the undo notice stays actionable (seconds)
    pub undo_window_secs: u64,
    /// Minimum background period before foreground reconciliation (seconds)
    pub foreground_reconcile_after_secs: u64,
    /// Consecutive native failures that escalate to `fatal_error`
    pub max_native_failures: u32,
    pub jump_forward_secs: f64,
    pub jump_backward_secs: f64,
    /// Throttle for local session-log updates during playback (seconds)
    pub session_update_interval_secs: u64,
    /// Throttle for server pushes during playback (seconds)
    pub server_sync_interval_secs: u64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            history_capacity: 100,
            position_jump_threshold_secs: 30.0,
            undo_window_secs: 60,
            foreground_reconcile_after_secs: 60,
            max_native_failures: 3,
            jump_forward_secs: 30.0,
            jump_backward_secs: 10.0,
            session_update_interval_secs: 15,
            server_sync_interval_secs: 60,
        }
    }
}

impl CoordinatorSettings {
    /// Load settings from the database, writing defaults back for missing keys
    pub async fn load(pool: &SqlitePool, user_id: &str) -> Result<Self> {
        use crate::db::settings::get_or_init;

        let defaults = Self::default();
        let settings = Self {
            user_id: user_id.to_string(),
            history_capacity: get_or_init(pool, "history_capacity", defaults.history_capacity)
                .await?
                .max(1),
            position_jump_threshold_secs: get_or_init(
                pool,
                "position_jump_threshold_secs",
                defaults.position_jump_threshold_secs,
            )
            .await?,
            undo_window_secs: get_or_init(pool, "undo_window_secs", defaults.undo_window_secs)
                .await?,
            foreground_reconcile_after_secs: get_or_init(
                pool,
                "foreground_reconcile_after_secs",
                defaults.foreground_reconcile_after_secs,
            )
            .await?,
            max_native_failures: get_or_init(
                pool,
                "max_native_failures",
                defaults.max_native_failures,
            )
            .await?
            .max(1),
            jump_forward_secs: get_or_init(pool, "jump_forward_secs", defaults.jump_forward_secs)
                .await?,
            jump_backward_secs: get_or_init(pool, "jump_backward_secs", defaults.jump_backward_secs)
                .await?,
            session_update_interval_secs: get_or_init(
                pool,
                "session_update_interval_secs",
                defaults.session_update_interval_secs,
            )
            .await?,
            server_sync_interval_secs: get_or_init(
                pool,
                "server_sync_interval_secs",
                defaults.server_sync_interval_secs,
            )
            .await?,
        };

        info!(
            "Loaded coordinator settings: history={}, jump_threshold={}s, undo_window={}s",
            settings.history_capacity,
            settings.position_jump_threshold_secs,
            settings.undo_window_secs
        );
        Ok(settings)
    }

    pub fn undo_window(&self) -> Duration {
        Duration::from_secs(self.undo_window_secs)
    }

    pub fn foreground_reconcile_after(&self) -> Duration {
        Duration::from_secs(self.foreground_reconcile_after_secs)
    }

    pub fn session_update_interval(&self) -> Duration {
        Duration::from_secs(self.session_update_interval_secs)
    }

    pub fn server_sync_interval(&self) -> Duration {
        Duration::from_secs(self.server_sync_interval_secs)
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub port: Option<u16>,
}

/// Resolve and load the bootstrap file, then apply CLI overrides
///
/// An explicitly named file that cannot be parsed is an error; a missing
/// implicit file falls back to defaults.
pub fn load_bootstrap(explicit: Option<&Path>, overrides: ConfigOverrides) -> Result<TomlConfig> {
    let path = shelfplay_common::config::resolve_config_path(explicit, "SHELFPLAY_CONFIG");
    let mut config: TomlConfig = match (&path, explicit) {
        (Some(path), Some(_)) => shelfplay_common::config::load_toml(path)
            .map_err(|e| Error::Config(e.to_string()))?,
        (path, None) => shelfplay_common::config::load_toml_or_default(path.as_deref()),
        (None, Some(_)) => TomlConfig::default(),
    };

    if let Some(path) = &path {
        info!("Loaded TOML configuration from {}", path.display());
    }

    if let Some(database_path) = overrides.database_path {
        config.database_path = database_path;
    }
    if let Some(port) = overrides.port {
        config.port = port;
    }
    Ok(config)
}
