//! Logarithmic volume level.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

/// Amount a single volume command moves the level.
pub const VOLUME_STEP: f64 = 0.5;
/// Lowest accepted level (gain of 1/32).
pub const MIN_VOLUME: f64 = -5.0;
/// Highest accepted level (gain of 32).
pub const MAX_VOLUME: f64 = 5.0;

/// Volume level on a base-2 logarithmic scale.
///
/// A level of 0 leaves samples untouched, +1 doubles their amplitude and
/// -1 halves it. Levels are clamped to `[MIN_VOLUME, MAX_VOLUME]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Volume(f64);

impl Volume {
    /// Creates a volume, clamping `level` into the accepted range.
    #[must_use]
    pub fn new(level: f64) -> Self {
        Self(level.clamp(MIN_VOLUME, MAX_VOLUME))
    }

    #[must_use]
    pub fn level(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn raised(self) -> Self {
        Self::new(self.0 + VOLUME_STEP)
    }

    #[must_use]
    pub fn lowered(self) -> Self {
        Self::new(self.0 - VOLUME_STEP)
    }

    /// Linear amplitude factor applied to samples.
    #[must_use]
    pub fn gain(self) -> f32 {
        2f64.powf(self.0) as f32
    }
}

impl Display for Volume {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}
