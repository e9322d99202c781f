//! Error types for playback management

use crate::device::DeviceErrorCode;
use halfbeat_core::{TrackId, UpstreamError};
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Queue is empty
    #[error("Queue is empty")]
    QueueEmpty,

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Source resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Device-reported fault
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Skip interval bounds rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The session run loop has stopped
    #[error("Playback session closed")]
    SessionClosed,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure to obtain a playable URL for a track
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Failed to resolve source for track {track_id}: {cause}")]
pub struct ResolutionError {
    /// Track the resolution was started for
    pub track_id: TrackId,

    /// Underlying reason
    pub cause: ResolutionCause,
}

impl ResolutionError {
    /// Create a resolution error
    pub fn new(track_id: TrackId, cause: impl Into<ResolutionCause>) -> Self {
        Self {
            track_id,
            cause: cause.into(),
        }
    }
}

/// Reason a resolution failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionCause {
    /// Backend refused or could not be reached
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// No external reference to refresh from and no usable URL
    #[error("track has no external reference and no playable URL")]
    NoSource,

    /// Backend issued something that is not a URL
    #[error("issued play URL is invalid: {0}")]
    InvalidUrl(String),
}

/// Fault reported by the playback device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Device error ({code}): {message}")]
pub struct DeviceError {
    /// Classified error code
    pub code: DeviceErrorCode,

    /// Device-provided detail
    pub message: String,
}

impl DeviceError {
    /// Create a device error
    pub fn new(code: DeviceErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Skip interval bounds that cannot be honoured as given
///
/// Never fatal: callers recover by re-clamping.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ValidationError {
    /// A bound is NaN or infinite
    #[error("skip bound is not a finite number")]
    NotFinite,

    /// Start lies before the beginning of the media
    #[error("skip start {0} is negative")]
    NegativeStart(f64),

    /// End lies before the beginning of the media
    #[error("skip end {0} is negative")]
    NegativeEnd(f64),

    /// End lies before start
    #[error("skip end {end} is before start {start}")]
    EndBeforeStart {
        /// Requested start
        start: f64,
        /// Requested end
        end: f64,
    },
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
