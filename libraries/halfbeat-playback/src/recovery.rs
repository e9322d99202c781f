//! Bounded error recovery
//!
//! Device faults and resolution failures on a track are counted in a
//! per-track ledger. Each failure either schedules one more attempt (with the
//! local cache disabled, or with the cached URL dropped) or gives up once the
//! count exceeds `max_retries`. Counts are reset only by manual navigation,
//! never by an automatic retry, so a permanently broken source terminates.

use crate::device::DeviceErrorCode;
use crate::error::{DeviceError, ResolutionCause, ResolutionError};
use crate::source::SourceKind;
use crate::types::PlayMode;
use chrono::{DateTime, Utc};
use halfbeat_core::{Track, TrackId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Per-track failure bookkeeping
#[derive(Debug, Clone, Default)]
pub struct RetryLedger {
    counts: HashMap<TrackId, u32>,
    handling: HashSet<TrackId>,
}

impl RetryLedger {
    /// Consecutive failures recorded for a track
    pub fn count(&self, id: &TrackId) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    /// Record one more failure and return the new count
    pub fn increment(&mut self, id: &TrackId) -> u32 {
        let count = self.counts.entry(id.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Whether a fault on this track is currently being handled
    pub fn is_handling(&self, id: &TrackId) -> bool {
        self.handling.contains(id)
    }

    /// Mark a track as being handled; `false` if it already was
    pub fn begin_handling(&mut self, id: &TrackId) -> bool {
        self.handling.insert(id.clone())
    }

    /// Clear the handling mark
    pub fn end_handling(&mut self, id: &TrackId) {
        self.handling.remove(id);
    }

    /// Forget everything about a track
    pub fn reset(&mut self, id: &TrackId) {
        self.counts.remove(id);
        self.handling.remove(id);
    }
}

/// Queue facts that shape a give-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryContext {
    /// Active play mode
    pub play_mode: PlayMode,

    /// Queue length
    pub queue_len: usize,
}

/// Decision for a failure
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Nothing to do
    Ignore,

    /// Retry the track with the local cache disabled
    RetryLocalDisabled(Track),

    /// Retry the track with its cached URL dropped
    RetryRefreshed(Track),

    /// Stop trying
    GiveUp {
        /// Status line for the user
        reason: String,
        /// Move on to the next track so single-repeat does not loop on a
        /// broken source
        skip_to_next: bool,
    },
}

/// Error recovery state machine
#[derive(Debug, Clone)]
pub struct ErrorRecovery {
    ledger: RetryLedger,
    max_retries: u32,
}

impl ErrorRecovery {
    /// Create a state machine allowing `max_retries` automatic retries per track
    pub fn new(max_retries: u32) -> Self {
        Self {
            ledger: RetryLedger::default(),
            max_retries,
        }
    }

    /// Failure bookkeeping
    pub fn ledger(&self) -> &RetryLedger {
        &self.ledger
    }

    /// Decide how to react to a device fault on `track`
    ///
    /// # Arguments
    /// * `track` - Track bound when the fault fired
    /// * `bound` - Kind of the URL that failed
    /// * `error` - Device-reported fault
    /// * `context` - Queue facts for the give-up decision
    /// * `now` - Timestamp recorded as the dropped URL's expiry
    pub fn handle_device_error(
        &mut self,
        track: &Track,
        bound: SourceKind,
        error: &DeviceError,
        context: RecoveryContext,
        now: DateTime<Utc>,
    ) -> RecoveryAction {
        if !self.ledger.begin_handling(&track.id) {
            debug!(track_id = %track.id, "Fault already being handled");
            return RecoveryAction::Ignore;
        }

        if error.code == DeviceErrorCode::Aborted {
            debug!(track_id = %track.id, "Fetch aborted, not retrying");
            self.ledger.end_handling(&track.id);
            return RecoveryAction::Ignore;
        }

        if bound == SourceKind::Local && track.has_external_ref() {
            let count = self.ledger.increment(&track.id);
            warn!(track_id = %track.id, attempt = count, "Local copy failed to play");
            if count > self.max_retries {
                return self.give_up(
                    track,
                    "Local file is damaged and the stream could not be fetched",
                    context,
                );
            }
            let mut retry = track.clone();
            retry.skip_local = true;
            retry.stream_url_expires_at = Some(now);
            return RecoveryAction::RetryLocalDisabled(retry);
        }

        if error.code.is_source_failure() && track.has_external_ref() {
            let count = self.ledger.increment(&track.id);
            warn!(
                track_id = %track.id,
                code = %error.code,
                attempt = count,
                "Stream failed, refreshing play URL"
            );
            if count > self.max_retries {
                return self.give_up(track, "Could not obtain a working play URL", context);
            }
            let mut retry = track.clone();
            retry.clear_stream_url(now);
            return RecoveryAction::RetryRefreshed(retry);
        }

        warn!(track_id = %track.id, error = %error, "Unrecoverable device error");
        self.ledger.end_handling(&track.id);
        RecoveryAction::GiveUp {
            reason: format!("Audio error: {error}"),
            skip_to_next: false,
        }
    }

    /// Decide how to react to a failed resolution
    ///
    /// Shares the per-track count with device faults.
    pub fn handle_resolution_error(
        &mut self,
        track: &Track,
        error: &ResolutionError,
        context: RecoveryContext,
    ) -> RecoveryAction {
        if error.cause == ResolutionCause::NoSource {
            warn!(track_id = %track.id, "Track has nothing to play");
            return RecoveryAction::GiveUp {
                reason: error.to_string(),
                skip_to_next: false,
            };
        }

        let count = self.ledger.increment(&track.id);
        warn!(track_id = %track.id, attempt = count, error = %error, "Resolution failed");
        if count > self.max_retries {
            return self.give_up(track, &format!("Failed to get play URL: {}", error.cause), context);
        }
        RecoveryAction::RetryRefreshed(track.clone())
    }

    /// The track's source loaded; new faults may be handled again
    pub fn on_track_loaded(&mut self, id: &TrackId) {
        self.ledger.end_handling(id);
    }

    /// A scheduled retry is starting; its faults are a new episode
    pub fn on_retry_started(&mut self, id: &TrackId) {
        self.ledger.end_handling(id);
    }

    /// Manual navigation to `id`: forget its failures
    pub fn reset(&mut self, id: &TrackId) {
        self.ledger.reset(id);
    }

    fn give_up(&mut self, track: &Track, reason: &str, context: RecoveryContext) -> RecoveryAction {
        self.ledger.end_handling(&track.id);
        let skip_to_next = context.play_mode == PlayMode::SingleRepeat && context.queue_len > 1;
        info!(
            track_id = %track.id,
            skip_to_next,
            "Giving up after {} retries",
            self.max_retries
        );
        RecoveryAction::GiveUp {
            reason: reason.to_string(),
            skip_to_next,
        }
    }
}

impl Default for ErrorRecovery {
    fn default() -> Self {
        Self::new(2)
    }
}
