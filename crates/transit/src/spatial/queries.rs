//! Spherical geometry helpers: bearings, distances, interpolation.
//!
//! Uses a spherical Earth model, which is plenty for marker rotation and
//! walking-distance thresholds.

use crate::models::types::Coordinate;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Initial great-circle bearing from `from` to `to`, in degrees clockwise
/// from north, normalized to `[0, 360)`.
///
/// Coincident points have no meaningful bearing; they yield `0.0`.
pub fn bearing(from: Coordinate, to: Coordinate) -> f64 {
    if from == to {
        return 0.0;
    }

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let y = delta_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

    if x == 0.0 && y == 0.0 {
        return 0.0;
    }

    normalize_degrees(y.atan2(x).to_degrees())
}

/// Maps any finite angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Linear interpolation between two scalars.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Interpolates latitude and longitude independently.
pub fn lerp_coordinate(a: Coordinate, b: Coordinate, t: f64) -> Coordinate {
    Coordinate::new(lerp(a.lat, b.lat, t), lerp(a.lng, b.lng, t))
}

/// Haversine distance between two coordinates in meters
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}
