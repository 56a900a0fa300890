//! Bearing arithmetic.
//!
//! Every bearing in the simulation is an [`Angle`] in degrees on the
//! half-open range `[0, 360)`. Values are folded back into that range on
//! construction and after every arithmetic operation, so no caller ever
//! observes an out-of-range position.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// Degrees in one full revolution.
pub const FULL_TURN: f64 = 360.0;

/// Bearing around the shared centre, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Angle {
    degrees: f64,
}

/// Fold any real value into `[0, 360)`.
///
/// The remainder is exact in IEEE arithmetic, so multiples of 360 (positive
/// or negative) land on exactly 0. A tiny negative input whose adjustment
/// rounds up to 360 is folded to 0 as well. Non-finite input has no
/// meaningful bearing and maps to 0.
pub fn normalize(degrees: f64) -> Angle {
    if !degrees.is_finite() {
        return Angle::ZERO;
    }
    let mut value = degrees % FULL_TURN;
    if value < 0.0 {
        value += FULL_TURN;
    }
    if value >= FULL_TURN {
        value -= FULL_TURN;
    }
    // -0.0 compares equal to 0.0 but would print and order differently
    if value == 0.0 {
        value = 0.0;
    }
    Angle { degrees: value }
}

impl Angle {
    pub const ZERO: Angle = Angle { degrees: 0.0 };
    pub const HALF_TURN: Angle = Angle { degrees: 180.0 };

    pub fn from_degrees(degrees: f64) -> Self {
        normalize(degrees)
    }

    pub fn from_radians(radians: f64) -> Self {
        normalize(radians.to_degrees())
    }

    pub fn degrees(self) -> f64 {
        self.degrees
    }

    /// Shortest angular separation to `other`, in degrees on `[0, 180]`.
    pub fn separation(self, other: Angle) -> f64 {
        let diff = (self.degrees - other.degrees).abs();
        if diff > 180.0 { FULL_TURN - diff } else { diff }
    }
}

impl Add for Angle {
    type Output = Angle;

    fn add(self, rhs: Angle) -> Angle {
        normalize(self.degrees + rhs.degrees)
    }
}

impl Sub for Angle {
    type Output = Angle;

    fn sub(self, rhs: Angle) -> Angle {
        normalize(self.degrees - rhs.degrees)
    }
}

impl Eq for Angle {}

impl PartialOrd for Angle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Angle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.degrees.total_cmp(&other.degrees)
    }
}

impl From<f64> for Angle {
    fn from(degrees: f64) -> Self {
        normalize(degrees)
    }
}

impl From<Angle> for f64 {
    fn from(angle: Angle) -> Self {
        angle.degrees
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}°", self.degrees)
    }
}
