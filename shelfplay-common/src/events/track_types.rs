//! Track, chapter and persisted-state descriptors
//!
//! Common structs carried in event payloads and in the persisted blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chapter boundaries within a track (seconds)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: u32,
    pub start: f64,
    pub end: f64,
    pub title: String,
}

impl Chapter {
    /// Half-open containment: `start <= position < end`
    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position < self.end
    }
}

/// Descriptor of the loaded audiobook/podcast track
///
/// Replaced wholesale on every load; never patched field by field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    /// Library item the track belongs to (session log key)
    pub library_item_id: String,
    /// Podcast episode within the item, if any
    #[serde(default)]
    pub episode_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Stream URL or local file path handed to the native engine
    pub source: String,
    /// Whether `source` is a downloaded local file
    #[serde(default)]
    pub is_local: bool,
    /// Total duration in seconds (0 when unknown until the engine reports it)
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl TrackDescriptor {
    /// Chapter containing `position`
    ///
    /// A position at or past the final chapter's end maps to the final chapter.
    pub fn chapter_at(&self, position: f64) -> Option<&Chapter> {
        self.chapters
            .iter()
            .find(|c| c.contains(position))
            .or_else(|| self.chapters.last().filter(|c| position >= c.end))
    }
}

/// Player-state blob written on meaningful transitions and read once at cold start
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPlayerState {
    pub current_track: Option<TrackDescriptor>,
    pub position: f64,
    pub playback_rate: f64,
    pub volume: f64,
    pub is_playing: bool,
    pub current_play_session_id: Option<String>,
    /// When the blob was written (drives smart rewind after a cold start)
    #[serde(default = "crate::time::now")]
    pub saved_at: DateTime<Utc>,
}
