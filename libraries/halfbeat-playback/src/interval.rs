//! Skip interval arithmetic
//!
//! A track plays only inside `[start, end]` of its source media. The window
//! is derived from the track's skip bounds and the duration reported by the
//! device; until that duration is known the window is provisional and has
//! zero length.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Playback window into the source media, in seconds
///
/// Once the duration is known, `0 <= start <= end <= duration` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Window start
    pub start: f64,

    /// Window end
    pub end: f64,

    /// Media duration the window was computed against (0 while provisional)
    pub duration: f64,
}

impl Interval {
    /// Zero-length window used before the duration is known
    pub const fn provisional() -> Self {
        Self {
            start: 0.0,
            end: 0.0,
            duration: 0.0,
        }
    }

    /// Compute the window for the given skip bounds
    ///
    /// `skip_end == 0` means "end of media". Total over all inputs:
    /// non-finite skip bounds are treated as 0, a non-positive or non-finite
    /// duration yields the provisional window.
    pub fn clamp(skip_start: f64, skip_end: f64, duration: f64) -> Self {
        if !duration.is_finite() || duration <= 0.0 {
            return Self::provisional();
        }

        let start = finite_or_zero(skip_start).clamp(0.0, duration);
        let requested_end = match finite_or_zero(skip_end) {
            end if end == 0.0 => duration,
            end => end,
        };
        let end = requested_end.clamp(start, duration);

        Self {
            start,
            end,
            duration,
        }
    }

    /// Whether the duration is still unknown
    pub fn is_provisional(&self) -> bool {
        self.duration <= 0.0
    }

    /// Window length in seconds
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Position relative to the window start, clamped to `[0, length]`
    pub fn progress_in_interval(&self, position: f64) -> f64 {
        if !position.is_finite() {
            return 0.0;
        }
        (position - self.start).clamp(0.0, self.length())
    }

    /// Whether `position` has run past the window end
    ///
    /// Always `false` for a provisional window.
    pub fn is_past_end(&self, position: f64) -> bool {
        !self.is_provisional() && position > self.end
    }

    /// Whether `position` lies before the window start
    pub fn is_before_start(&self, position: f64) -> bool {
        !self.is_provisional() && position < self.start
    }

    /// Clamp an absolute position into the window
    pub fn clamp_position(&self, position: f64) -> f64 {
        let position = finite_or_zero(position).max(0.0);
        if self.is_provisional() {
            position
        } else {
            position.clamp(self.start, self.end)
        }
    }
}

/// Check skip bounds as entered by a user
///
/// Rejections are advisory: `Interval::clamp` accepts any input.
pub fn validate_skip_bounds(skip_start: f64, skip_end: f64) -> Result<(), ValidationError> {
    if !skip_start.is_finite() || !skip_end.is_finite() {
        return Err(ValidationError::NotFinite);
    }
    if skip_start < 0.0 {
        return Err(ValidationError::NegativeStart(skip_start));
    }
    if skip_end < 0.0 {
        return Err(ValidationError::NegativeEnd(skip_end));
    }
    if skip_end != 0.0 && skip_end < skip_start {
        return Err(ValidationError::EndBeforeStart {
            start: skip_start,
            end: skip_end,
        });
    }
    Ok(())
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
