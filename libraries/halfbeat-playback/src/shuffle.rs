//! Random index selection for shuffle play
//!
//! Shuffle does not permute the queue: each advance picks a uniformly random
//! index, which may be the current one.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform index picker
#[derive(Debug, Clone)]
pub struct IndexPicker {
    rng: StdRng,
}

impl IndexPicker {
    /// Picker seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic picker for reproducible sequences
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick an index in `0..len`, or `None` for an empty range
    pub fn pick(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.rng.gen_range(0..len))
        }
    }
}

impl Default for IndexPicker {
    fn default() -> Self {
        Self::new()
    }
}
