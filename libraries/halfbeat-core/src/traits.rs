/// Backend contracts consumed by the playback engine
use crate::error::Result;
use crate::types::{PlayUrl, QueueSnapshot, Track, TrackId};
use async_trait::async_trait;

/// Issues time-limited proxy URLs for external sources
///
/// Implementers talk to whatever service turns a source reference into a
/// streamable URL. Failures are reported as `UpstreamError`; retrying is the
/// caller's decision.
#[async_trait]
pub trait PlayUrlIssuer: Send + Sync {
    /// Issue a fresh proxy URL for `external_ref`
    ///
    /// # Arguments
    /// * `external_ref` - Source video reference
    /// * `page` - Page selector within the source (0 and 1 both mean the first page)
    async fn issue_play_url(&self, external_ref: &str, page: u32) -> Result<PlayUrl>;
}

/// Query surface of the download manager
#[async_trait]
pub trait LocalCacheIndex: Send + Sync {
    /// Local URL of a previously downloaded copy of the track, if any
    async fn local_url(&self, track_id: &TrackId) -> Result<Option<String>>;
}

/// Liveness check for a candidate URL (HEAD-equivalent)
///
/// Returns `true` only when the URL answered successfully. Implementers should
/// not apply their own long timeouts; the resolver bounds the call.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Probe `url`
    async fn probe(&self, url: &str) -> bool;
}

/// Best-effort persistence of playback side effects
///
/// Every call is fire-and-forget from the engine's point of view: errors are
/// logged and never block playback.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Store the track's playback metadata (refreshed URL, skip interval)
    async fn persist_track(&self, track: &Track) -> Result<()>;

    /// Store the current queue order and position
    async fn persist_queue_state(&self, snapshot: &QueueSnapshot) -> Result<()>;

    /// Append a play-history entry
    ///
    /// # Arguments
    /// * `favorite_context` - Playlist the track was started from, if any
    /// * `track_id` - Track that started playing
    async fn record_playback_event(
        &self,
        favorite_context: Option<&str>,
        track_id: &TrackId,
    ) -> Result<()>;
}
