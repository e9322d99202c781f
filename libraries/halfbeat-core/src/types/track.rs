/// Track domain type
use crate::types::TrackId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A playable unit: an external source reference, a cached play URL and a
/// skip interval into the source media
///
/// The catalog owns tracks. The playback engine works on transient copies
/// that may carry a resolved URL which has not been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// External source reference (video id) used to issue play URLs
    #[serde(default)]
    pub external_ref: Option<String>,

    /// Page selector within the external source
    #[serde(default)]
    pub page: u32,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Display artist
    #[serde(default)]
    pub artist: Option<String>,

    /// Last known play URL (proxy, local or direct)
    #[serde(default)]
    pub stream_url: Option<String>,

    /// Expiry of `stream_url`, when known
    #[serde(default)]
    pub stream_url_expires_at: Option<DateTime<Utc>>,

    /// Playback start within the media, in seconds
    #[serde(default)]
    pub skip_start: f64,

    /// Playback end within the media, in seconds (0 = end of media)
    #[serde(default)]
    pub skip_end: f64,

    /// Bypass the local cache when resolving this track
    #[serde(default)]
    pub skip_local: bool,
}

impl Track {
    /// Create a new track with minimal metadata
    pub fn new(id: impl Into<TrackId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external_ref: None,
            page: 0,
            name: name.into(),
            artist: None,
            stream_url: None,
            stream_url_expires_at: None,
            skip_start: 0.0,
            skip_end: 0.0,
            skip_local: false,
        }
    }

    /// Set the external source reference
    #[must_use]
    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    /// Set the cached play URL and its expiry
    #[must_use]
    pub fn with_stream_url(
        mut self,
        url: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.stream_url = Some(url.into());
        self.stream_url_expires_at = expires_at;
        self
    }

    /// Set the skip interval (seconds, `end == 0` plays to the end)
    #[must_use]
    pub fn with_skip(mut self, start: f64, end: f64) -> Self {
        self.skip_start = start;
        self.skip_end = end;
        self
    }

    /// Whether the track can ask the backend for a fresh play URL
    pub fn has_external_ref(&self) -> bool {
        self.external_ref.as_deref().is_some_and(|r| !r.is_empty())
    }

    /// Cached play URL, ignoring empty strings
    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Drop the cached play URL so the next resolution must refresh
    pub fn clear_stream_url(&mut self, now: DateTime<Utc>) {
        self.stream_url = None;
        self.stream_url_expires_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_track_has_open_interval() {
        let track = Track::new("t1", "Song");
        assert_eq!(track.skip_start, 0.0);
        assert_eq!(track.skip_end, 0.0);
        assert!(!track.skip_local);
        assert!(!track.has_external_ref());
    }

    #[test]
    fn empty_external_ref_is_not_usable() {
        let track = Track::new("t1", "Song").with_external_ref("");
        assert!(!track.has_external_ref());
    }

    #[test]
    fn empty_stream_url_reads_as_none() {
        let track = Track::new("t1", "Song").with_stream_url("", None);
        assert_eq!(track.stream_url(), None);
    }

    #[test]
    fn clear_stream_url_marks_expired() {
        let now = Utc::now();
        let mut track =
            Track::new("t1", "Song").with_stream_url("http://127.0.0.1:9999/audio?u=x", None);
        track.clear_stream_url(now);
        assert!(track.stream_url.is_none());
        assert_eq!(track.stream_url_expires_at, Some(now));
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let json = r#"{"id":"s1","externalRef":"BV1","skipStart":3.5}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.id.as_str(), "s1");
        assert_eq!(track.external_ref.as_deref(), Some("BV1"));
        assert_eq!(track.skip_start, 3.5);
        assert_eq!(track.skip_end, 0.0);
        assert_eq!(track.page, 0);
    }
}
