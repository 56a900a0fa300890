//! Per-kind orbital motion.
//!
//! Each tick a satellite moves by `linear_speed / height` radians. The kind
//! decides the direction:
//! - Standard: always clockwise.
//! - Teleporting: travels away from 0° until it would pass 180°, then jumps
//!   back to exactly 0° and reverses.
//! - Relay: clockwise inside (190°, 345°], anticlockwise above 345° or below
//!   140°, keeping its previous direction in the 140°–190° band.

use super::angle::Angle;
use super::types::{Direction, Satellite, SatelliteKind};

/// Lower edge of the relay hysteresis band, in degrees.
const RELAY_BAND_LOW: f64 = 140.0;
/// Upper edge of the relay hysteresis band, in degrees.
const RELAY_BAND_HIGH: f64 = 190.0;
/// Bearing above which a relay turns back anticlockwise.
const RELAY_TURN_BACK: f64 = 345.0;

/// Result of moving a satellite by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub position: Angle,
    pub direction: Direction,
    /// The satellite jumped to 0° instead of moving smoothly.
    pub teleported: bool,
}

/// Angular distance covered in one tick.
pub fn angular_step(kind: SatelliteKind, height: f64) -> Angle {
    Angle::from_radians(kind.profile().linear_speed / height)
}

/// Compute the next position of a satellite without mutating it.
///
/// # Parameters
///
/// * `kind` - Satellite kind selecting the motion rule
/// * `height` - Orbital radius in km
/// * `position` - Current bearing
/// * `direction` - Current direction of travel
///
/// # Returns
///
/// The new bearing and direction, and whether a teleport happened.
pub fn next_motion(kind: SatelliteKind, height: f64, position: Angle, direction: Direction) -> Motion {
    let step = angular_step(kind, height);
    match kind {
        SatelliteKind::Standard => Motion {
            position: Direction::Clockwise.apply(position, step),
            direction: Direction::Clockwise,
            teleported: false,
        },
        SatelliteKind::Teleporting => {
            let moved = direction.apply(position, step);
            let crossed = match direction {
                Direction::Anticlockwise => moved > Angle::HALF_TURN,
                Direction::Clockwise => moved < Angle::HALF_TURN,
            };
            if crossed {
                Motion {
                    position: Angle::ZERO,
                    direction: direction.reversed(),
                    teleported: true,
                }
            } else {
                Motion {
                    position: moved,
                    direction,
                    teleported: false,
                }
            }
        }
        SatelliteKind::Relay => {
            let bearing = position.degrees();
            let direction = if bearing > RELAY_BAND_HIGH && bearing <= RELAY_TURN_BACK {
                Direction::Clockwise
            } else if bearing > RELAY_TURN_BACK || bearing < RELAY_BAND_LOW {
                Direction::Anticlockwise
            } else {
                direction
            };
            Motion {
                position: direction.apply(position, step),
                direction,
                teleported: false,
            }
        }
    }
}

impl Satellite {
    /// Advance this satellite by one tick. Returns `true` on a teleport.
    pub fn advance_orbit(&mut self) -> bool {
        let motion = next_motion(self.kind, self.height, self.position, self.direction);
        self.position = motion.position;
        self.direction = motion.direction;
        if motion.teleported {
            log::debug!("{} teleported to {}", self.id, self.position);
        }
        motion.teleported
    }
}
