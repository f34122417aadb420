//! Error types for shelfplay-player
//!
//! Handler failures never escape `dispatch`: the coordinator converts them
//! into a transition to `error`/`fatal_error`. These types exist for the
//! collaborator seams, configuration, persistence and the HTTP layer.

use thiserror::Error;

/// Main error type for shelfplay-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP server or client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Native audio engine rejected or failed a command
    #[error("Native engine error{}: {message}", code.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default())]
    Native {
        message: String,
        code: Option<String>,
    },

    /// Local session log errors
    #[error("Session log error: {0}")]
    Session(String),

    /// Server progress sync errors
    #[error("Sync error: {0}")]
    Sync(String),

    /// Persisted player-state blob errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Operation not valid for the current context
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a native engine failure without an error code
    pub fn native(message: impl Into<String>) -> Self {
        Error::Native {
            message: message.into(),
            code: None,
        }
    }

    /// Whether the failure came from the native engine
    ///
    /// Native failures count toward escalation to `fatal_error`.
    pub fn is_native(&self) -> bool {
        matches!(self, Error::Native { .. })
    }

    /// Error code, when the source supplied one
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Native { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<shelfplay_common::Error> for Error {
    fn from(e: shelfplay_common::Error) -> Self {
        match e {
            shelfplay_common::Error::Database(e) => Error::Database(e),
            shelfplay_common::Error::Io(e) => Error::Io(e),
            shelfplay_common::Error::Config(msg) => Error::Config(msg),
            shelfplay_common::Error::Serialization(e) => Error::Serialization(e),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Sync(e.to_string())
    }
}

/// Convenience Result type using shelfplay-player Error
pub type Result<T> = std::result::Result<T, Error>;
