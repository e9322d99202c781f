//! Play queue with mode-aware navigation
//!
//! Navigation rules:
//! - A single-track queue always resolves to that track
//! - `Shuffle` picks a random index for both directions
//! - `Sequential` and `SingleRepeat` step with wraparound
//! - Natural end replays under `SingleRepeat`, otherwise behaves like `next`

use crate::error::{PlaybackError, Result};
use crate::shuffle::IndexPicker;
use crate::types::PlayMode;
use halfbeat_core::{QueueSnapshot, Track, TrackId};

/// What to do when the current track finishes on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaturalEnd {
    /// Play the current track again from its interval start
    Replay,

    /// Move to the track at this index
    Advance(usize),
}

/// Ordered play queue
#[derive(Debug, Clone)]
pub struct QueueManager {
    tracks: Vec<Track>,
    current: Option<usize>,
    mode: PlayMode,
    picker: IndexPicker,
}

impl QueueManager {
    /// Create an empty queue
    pub fn new(mode: PlayMode) -> Self {
        Self {
            tracks: Vec::new(),
            current: None,
            mode,
            picker: IndexPicker::new(),
        }
    }

    /// Create an empty queue with a deterministic shuffle sequence
    pub fn with_seed(mode: PlayMode, seed: u64) -> Self {
        Self {
            picker: IndexPicker::seeded(seed),
            ..Self::new(mode)
        }
    }

    /// Active play mode
    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    /// Change play mode; position is kept
    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
    }

    /// Tracks in play order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Current index
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Track at the current index
    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|index| self.tracks.get(index))
    }

    /// Track at `index`
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Replace the queue wholesale
    ///
    /// An out-of-range `current` is dropped to the first track.
    pub fn set_queue(&mut self, tracks: Vec<Track>, current: Option<usize>) {
        self.current = if tracks.is_empty() {
            None
        } else {
            Some(current.filter(|index| *index < tracks.len()).unwrap_or(0))
        };
        self.tracks = tracks;
    }

    /// Make `track` current, optionally replacing the queue first
    ///
    /// The index is the track's position in the (new) queue, or 0 when it
    /// is not part of it. An empty queue becomes `[track]`.
    pub fn select_track(&mut self, track: &Track, queue: Option<Vec<Track>>) -> usize {
        if let Some(queue) = queue {
            self.tracks = queue;
        }
        if self.tracks.is_empty() {
            self.tracks.push(track.clone());
        }

        let index = self.position_of(&track.id).unwrap_or(0);
        self.current = Some(index);
        index
    }

    /// Jump to `index`
    pub fn play_at(&mut self, index: usize) -> Result<&Track> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        self.current = Some(index);
        Ok(&self.tracks[index])
    }

    /// Advance for a manual skip forward
    pub fn next(&mut self) -> Option<usize> {
        let index = self.next_index()?;
        self.current = Some(index);
        Some(index)
    }

    /// Step back for a manual skip backward
    pub fn previous(&mut self) -> Option<usize> {
        let len = self.tracks.len();
        let index = match len {
            0 => return None,
            1 => 0,
            _ => match self.mode {
                PlayMode::Shuffle => self.picker.pick(len)?,
                PlayMode::Sequential | PlayMode::SingleRepeat => {
                    let current = self.current.unwrap_or(0);
                    if current == 0 {
                        len - 1
                    } else {
                        current - 1
                    }
                }
            },
        };
        self.current = Some(index);
        Some(index)
    }

    /// Decide what follows a track that finished on its own
    pub fn on_natural_end(&mut self) -> Option<NaturalEnd> {
        if self.tracks.is_empty() {
            return None;
        }
        if self.mode == PlayMode::SingleRepeat {
            return Some(NaturalEnd::Replay);
        }
        self.next().map(NaturalEnd::Advance)
    }

    /// Move the track at `from` to `to`, keeping the current track current
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.tracks.len();
        if from >= len {
            return Err(PlaybackError::IndexOutOfBounds(from));
        }
        if to >= len {
            return Err(PlaybackError::IndexOutOfBounds(to));
        }
        if from == to {
            return Ok(());
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        if let Some(current) = self.current {
            self.current = Some(if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            });
        }
        Ok(())
    }

    /// Remove the track at `index`
    ///
    /// Removing the current track makes the track that slid into its slot
    /// current, or the new last track when the removed one was last.
    pub fn remove(&mut self, index: usize) -> Result<Track> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        let removed = self.tracks.remove(index);

        self.current = match self.current {
            _ if self.tracks.is_empty() => None,
            Some(current) if index < current => Some(current - 1),
            Some(current) if index == current && index >= self.tracks.len() => {
                Some(self.tracks.len() - 1)
            }
            other => other,
        };
        Ok(removed)
    }

    /// Replace every copy of `track` (matched by id) with the new value
    ///
    /// Returns how many entries were updated.
    pub fn update_track(&mut self, track: &Track) -> usize {
        let mut updated = 0;
        for entry in self.tracks.iter_mut().filter(|t| t.id == track.id) {
            *entry = track.clone();
            updated += 1;
        }
        updated
    }

    /// Persistable view of the queue
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            track_ids: self.tracks.iter().map(|t| t.id.clone()).collect(),
            current_index: self.current,
        }
    }

    fn next_index(&mut self) -> Option<usize> {
        let len = self.tracks.len();
        match len {
            0 => None,
            1 => Some(0),
            _ => match self.mode {
                PlayMode::Shuffle => self.picker.pick(len),
                PlayMode::Sequential | PlayMode::SingleRepeat => {
                    Some(self.current.map_or(0, |current| (current + 1) % len))
                }
            },
        }
    }

    fn position_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(PlayMode::default())
    }
}
