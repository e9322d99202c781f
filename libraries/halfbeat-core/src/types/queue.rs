/// Persisted shape of the play queue
use crate::types::TrackId;
use serde::{Deserialize, Serialize};

/// Queue order and position, as written to the backend
///
/// Only identities are persisted; the catalog owns the track data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Track ids in queue order (duplicates allowed)
    pub track_ids: Vec<TrackId>,

    /// Index of the current track, if any
    pub current_index: Option<usize>,
}

impl QueueSnapshot {
    /// Check if the snapshot has no tracks
    pub fn is_empty(&self) -> bool {
        self.track_ids.is_empty()
    }
}
