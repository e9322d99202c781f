//! Types for Halfbeat backend API requests and responses.

use chrono::{DateTime, Utc};
use halfbeat_core::{PlayUrl, QueueSnapshot, Track, TrackId};
use serde::{Deserialize, Serialize};

/// Configuration for connecting to the Halfbeat backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend (e.g., "http://127.0.0.1:9999")
    pub base_url: String,
    /// Bearer token sent with every request, if any
    pub access_token: Option<String>,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl ClientConfig {
    /// Create a config with just the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9999".to_string(),
            access_token: None,
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

// =============================================================================
// Play URL Types
// =============================================================================

/// Response from the play URL endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayUrlResponse {
    pub proxy_url: String,
    pub expires_at: DateTime<Utc>,
}

impl From<PlayUrlResponse> for PlayUrl {
    fn from(response: PlayUrlResponse) -> Self {
        PlayUrl::new(response.proxy_url, response.expires_at)
    }
}

/// Response from the local cache endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalCacheResponse {
    #[serde(default)]
    pub url: Option<String>,
}

// =============================================================================
// Persistence Types
// =============================================================================

/// Playback metadata written back for a track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackUpdateRequest {
    pub stream_url: Option<String>,
    pub stream_url_expires_at: Option<DateTime<Utc>>,
    pub skip_start: f64,
    pub skip_end: f64,
    pub skip_local: bool,
}

impl From<&Track> for TrackUpdateRequest {
    fn from(track: &Track) -> Self {
        Self {
            stream_url: track.stream_url.clone(),
            stream_url_expires_at: track.stream_url_expires_at,
            skip_start: track.skip_start,
            skip_end: track.skip_end,
            skip_local: track.skip_local,
        }
    }
}

/// Request body for saving queue state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStateRequest {
    pub track_ids: Vec<TrackId>,
    /// -1 when nothing is current
    pub current_index: i64,
}

impl From<&QueueSnapshot> for QueueStateRequest {
    fn from(snapshot: &QueueSnapshot) -> Self {
        Self {
            track_ids: snapshot.track_ids.clone(),
            current_index: snapshot.current_index.map_or(-1, |i| i as i64),
        }
    }
}

/// Request body for a play-history entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub favorite_id: Option<String>,
    pub track_id: TrackId,
}
