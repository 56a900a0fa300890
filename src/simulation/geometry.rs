//! Geometry calculations for line-of-sight and link distance.
//!
//! Every body sits on a circle around a shared centre and is described in
//! polar form: a height (orbital radius, or the ground radius for devices)
//! and a bearing. Contains helpers for:
//! - Straight-line distance between two polar points (law of cosines)
//! - Occlusion of a link by the central body (tangent/horizon test)

use super::angle::Angle;

/// Radius of the central body in km. Devices sit on this circle.
pub const RADIUS_OF_JUPITER: f64 = 69_911.0;

/// Slack on the visibility threshold so that a body sitting exactly on the
/// tangent line is not lost to rounding in `acos`.
const VISIBILITY_EPSILON: f64 = 1e-9;

/// Euclidean distance between two bodies given in polar form.
///
/// # Parameters
///
/// * `height_a`, `bearing_a` - First body (radius from the centre, bearing)
/// * `height_b`, `bearing_b` - Second body
///
/// # Returns
///
/// The straight-line distance in the same unit as the heights.
pub fn distance(height_a: f64, bearing_a: Angle, height_b: f64, bearing_b: Angle) -> f64 {
    let theta = bearing_a.separation(bearing_b).to_radians();
    let d2 = height_a * height_a + height_b * height_b - 2.0 * height_a * height_b * theta.cos();
    // Coincident points can come out as a tiny negative through cancellation
    d2.max(0.0).sqrt()
}

/// Check whether the central body leaves a clear line between two bodies.
///
/// Convenience wrapper around [`is_visible_around`] with Jupiter as the
/// occluder, which is the only occluder in the simulation.
pub fn is_visible(height_a: f64, bearing_a: Angle, height_b: f64, bearing_b: Angle) -> bool {
    is_visible_around(RADIUS_OF_JUPITER, height_a, bearing_a, height_b, bearing_b)
}

/// Line-of-sight test past a circular occluder at the shared centre.
///
/// From a body at radius `r`, the tangent to the occluder of radius `R`
/// touches it at an angle of `acos(R / r)` away from the body's own bearing
/// (its horizon). The segment between two bodies misses the occluder exactly
/// when their angular separation does not exceed the sum of both horizons.
/// A body on the surface (`r == R`) therefore only sees bodies within its
/// partner's horizon.
///
/// # Parameters
///
/// * `occluder_radius` - Radius of the central body
/// * `height_a`, `bearing_a` - First body
/// * `height_b`, `bearing_b` - Second body
///
/// # Returns
///
/// `true` if the straight line is unobstructed, `false` if the central body
/// blocks it or either body sits inside the occluder.
pub fn is_visible_around(occluder_radius: f64, height_a: f64, bearing_a: Angle, height_b: f64, bearing_b: Angle) -> bool {
    if height_a < occluder_radius || height_b < occluder_radius {
        return false;
    }
    let limit = horizon_angle(occluder_radius, height_a) + horizon_angle(occluder_radius, height_b);
    bearing_a.separation(bearing_b).to_radians() <= limit + VISIBILITY_EPSILON
}

/// Angle (radians) between a body's bearing and the point where its tangent
/// touches the occluder.
fn horizon_angle(occluder_radius: f64, height: f64) -> f64 {
    (occluder_radius / height).clamp(-1.0, 1.0).acos()
}
