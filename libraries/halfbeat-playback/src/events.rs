//! Playback events
//!
//! Broadcast to observers alongside the `PlayerSnapshot` watch channel.
//! Snapshots carry the full state; events mark the transitions a UI wants to
//! react to once (notifications, track change animations).

use crate::source::SourceKind;
use crate::types::{OrchestratorState, PlayMode};
use halfbeat_core::TrackId;
use serde::{Deserialize, Serialize};

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Orchestrator state changed
    StateChanged {
        /// The new state
        state: OrchestratorState,
    },

    /// A different track became current
    TrackChanged {
        /// ID of the new track
        track_id: TrackId,
        /// ID of the previous track (if any)
        previous_track_id: Option<TrackId>,
    },

    /// A playable source was found for the current track
    SourceResolved {
        /// Track the source belongs to
        track_id: TrackId,
        /// Where the source comes from
        kind: SourceKind,
        /// Whether a new proxy URL was issued
        refreshed: bool,
    },

    /// Track reached its interval end (natural or synthesized)
    TrackFinished {
        /// ID of the finished track
        track_id: TrackId,
    },

    /// Volume, mute or compensation changed
    VolumeChanged {
        /// User level in [0, 1]
        level: f32,
        /// Whether output is muted
        muted: bool,
        /// Value sent to the device
        effective: f32,
    },

    /// Play mode changed
    PlayModeChanged {
        /// The new mode
        mode: PlayMode,
    },

    /// Queue changed (replaced, reordered, shrunk)
    QueueChanged {
        /// New queue length
        length: usize,
    },

    /// Skip interval of the current track edited
    IntervalChanged {
        /// Edited track
        track_id: TrackId,
        /// New skip start
        skip_start: f64,
        /// New skip end (0 = end of media)
        skip_end: f64,
    },

    /// An automatic retry was scheduled
    RetryScheduled {
        /// Track being retried
        track_id: TrackId,
        /// Consecutive failures so far
        attempt: u32,
        /// Delay before the retry in milliseconds
        delay_ms: u64,
    },

    /// Playback failed
    Error {
        /// Affected track
        track_id: Option<TrackId>,
        /// Human-readable reason
        message: String,
        /// Whether recovery gave up
        terminal: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize() {
        let event = PlaybackEvent::TrackChanged {
            track_id: TrackId::new("t2"),
            previous_track_id: Some(TrackId::new("t1")),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("TrackChanged"));
        assert!(json.contains("t2"));
    }
}
