//! Playback device seam
//!
//! The device is an element-like player: it takes commands synchronously and
//! reports what happened later as [`DeviceEvent`]s. Nothing here assumes a
//! particular backend (browser audio element, native player, test double).

use crate::error::{DeviceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Command issued to the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceCommand {
    /// Replace the media source
    SetSource(String),

    /// Start loading the current source
    Load,

    /// Start or resume playback
    Play,

    /// Pause playback
    Pause,

    /// Jump to an absolute position in seconds
    Seek(f64),

    /// Set output volume in [0, 1]
    SetVolume(f32),

    /// Drop the current source
    ClearSource,
}

/// Classified device fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceErrorCode {
    /// Fetch aborted, usually by a source change
    Aborted,

    /// Network failure while fetching media (expired URL, 403/404)
    Network,

    /// Media could not be decoded
    Decode,

    /// Source format or URL not supported
    SrcNotSupported,

    /// Anything else
    Unknown,
}

impl DeviceErrorCode {
    /// Map a numeric media error code (1 = aborted .. 4 = unsupported)
    pub fn from_media_code(code: u16) -> Self {
        match code {
            1 => Self::Aborted,
            2 => Self::Network,
            3 => Self::Decode,
            4 => Self::SrcNotSupported,
            _ => Self::Unknown,
        }
    }

    /// Whether a fresh URL might fix this fault
    pub fn is_source_failure(self) -> bool {
        matches!(self, Self::Network | Self::SrcNotSupported)
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aborted => "aborted",
            Self::Network => "network",
            Self::Decode => "decode",
            Self::SrcNotSupported => "source not supported",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Event reported by the device
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Periodic position report in seconds
    TimeUpdate {
        /// Current position
        position: f64,
    },

    /// Media duration became known (may be NaN or infinite for streams)
    LoadedMetadata {
        /// Reported duration in seconds
        duration: f64,
    },

    /// Enough data is buffered to start playing
    CanPlay,

    /// Media played to its end
    Ended,

    /// Device started playing
    Play,

    /// Device paused
    Pause,

    /// Device fault
    Error(DeviceError),
}

/// Physical playback device
///
/// Implementors apply commands and feed resulting events back through the
/// session's `DeviceEventSender`.
pub trait AudioDevice: Send {
    /// Apply a single command
    ///
    /// Errors are logged by the session; playback state is driven by events,
    /// not by the return value.
    fn apply(&mut self, command: &DeviceCommand) -> Result<()>;
}

/// Device that records every command, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingDevice {
    pub commands: Vec<DeviceCommand>,
}

#[cfg(test)]
impl AudioDevice for RecordingDevice {
    fn apply(&mut self, command: &DeviceCommand) -> Result<()> {
        self.commands.push(command.clone());
        Ok(())
    }
}
