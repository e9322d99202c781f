//! Core types for playback management

use crate::interval::Interval;
use halfbeat_core::Track;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue advance policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayMode {
    /// Advance in queue order, wrapping at the end
    #[default]
    Sequential,

    /// Pick a uniformly random index (the current one included)
    Shuffle,

    /// Replay the current track on natural end; manual skips still move
    SingleRepeat,
}

/// Orchestrator lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestratorState {
    /// Nothing selected
    #[default]
    Idle,

    /// Waiting for a source to be resolved
    Binding,

    /// Source bound, waiting for the device to become playable
    Ready,

    /// Device is playing
    Playing,

    /// Device is paused with a bound source
    Paused,

    /// A device fault is being handled
    ErrorHandling,
}

/// Configuration for the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Automatic retries per track before giving up (default: 2)
    pub max_retries: u32,

    /// Delay before a retry re-selects the track (default: 500ms)
    pub retry_delay_ms: u64,

    /// Cached proxy URLs expiring within this margin are refreshed (default: 60s)
    pub expiry_margin_secs: i64,

    /// Upper bound for the local cache liveness probe (default: 1500ms)
    pub local_probe_timeout_ms: u64,

    /// Synthetic lifetime given to local cache URLs (default: 365 days)
    pub local_expiry_days: i64,

    /// Quiet period before queue state is persisted (default: 1000ms)
    pub queue_persist_debounce_ms: u64,

    /// Quiet period before an edited skip interval is persisted (default: 500ms)
    pub track_persist_debounce_ms: u64,

    /// Initial volume in [0, 1] (default: 0.5)
    pub volume: f32,

    /// Initial play mode (default: Sequential)
    pub play_mode: PlayMode,

    /// Origin serving proxy (`/audio`) and local cache (`/local`) URLs
    pub proxy_origin: String,
}

impl PlaybackConfig {
    /// Retry delay as a `Duration`
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Local probe timeout as a `Duration`
    pub fn local_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.local_probe_timeout_ms)
    }

    /// Queue persistence debounce as a `Duration`
    pub fn queue_persist_debounce(&self) -> Duration {
        Duration::from_millis(self.queue_persist_debounce_ms)
    }

    /// Track persistence debounce as a `Duration`
    pub fn track_persist_debounce(&self) -> Duration {
        Duration::from_millis(self.track_persist_debounce_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 500,
            expiry_margin_secs: 60,
            local_probe_timeout_ms: 1500,
            local_expiry_days: 365,
            queue_persist_debounce_ms: 1000,
            track_persist_debounce_ms: 500,
            volume: 0.5,
            play_mode: PlayMode::Sequential,
            proxy_origin: "http://127.0.0.1:9999".to_string(),
        }
    }
}

/// Observable session state, published after every processed input
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    /// Orchestrator state
    pub state: OrchestratorState,

    /// Queue in play order
    pub queue: Vec<Track>,

    /// Index of the current track within `queue`
    pub current_index: Option<usize>,

    /// Working copy of the current track (refreshed URL, edited interval)
    pub current_track: Option<Track>,

    /// Active play mode
    pub play_mode: PlayMode,

    /// Intended play state
    pub is_playing: bool,

    /// Volume level in [0, 1]
    pub volume: f32,

    /// Whether output is muted
    pub muted: bool,

    /// Last reported device position in seconds
    pub progress: f64,

    /// Media duration once known
    pub duration: Option<f64>,

    /// Active playback window
    pub interval: Interval,

    /// Human-readable status line (errors, retries)
    pub status: Option<String>,

    /// URL currently bound to the device
    pub bound_url: Option<String>,
}

impl PlayerSnapshot {
    /// Position relative to the interval start, clamped to its length
    pub fn progress_in_interval(&self) -> f64 {
        self.interval.progress_in_interval(self.progress)
    }
}
