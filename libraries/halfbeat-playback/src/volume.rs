//! Output volume with per-track loudness compensation
//!
//! The user-facing level is linear in [0, 1]. A compensation offset in dB
//! (for normalising quiet or loud sources) is applied on top, and the result
//! is clamped back into the device's [0, 1] range.

/// Volume controller
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// User level in [0, 1]
    level: f32,

    /// Mute state (preserves level)
    muted: bool,

    /// Loudness compensation in dB
    compensation_db: f32,
}

impl Volume {
    /// Create a volume controller at `level` (clamped into [0, 1])
    pub fn new(level: f32) -> Self {
        Self {
            level: sanitize_level(level),
            muted: false,
            compensation_db: 0.0,
        }
    }

    /// Set the user level
    pub fn set_level(&mut self, level: f32) {
        self.level = sanitize_level(level);
    }

    /// User level in [0, 1]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Set loudness compensation; non-finite values reset it to 0 dB
    pub fn set_compensation_db(&mut self, db: f32) {
        self.compensation_db = if db.is_finite() { db } else { 0.0 };
    }

    /// Loudness compensation in dB
    pub fn compensation_db(&self) -> f32 {
        self.compensation_db
    }

    /// Mute output (preserves level)
    pub fn mute(&mut self) {
        self.muted = true;
    }

    /// Unmute output
    pub fn unmute(&mut self) {
        self.muted = false;
    }

    /// Set mute state
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Value to hand to the device
    ///
    /// `clamp(level * 10^(dB/20), 0, 1)`, or 0 when muted.
    pub fn effective(&self) -> f32 {
        if self.muted {
            return 0.0;
        }
        let gain = 10.0_f32.powf(self.compensation_db / 20.0);
        (self.level * gain).clamp(0.0, 1.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(0.5)
    }
}

fn sanitize_level(level: f32) -> f32 {
    if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
