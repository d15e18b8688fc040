//! Core data types mirroring the planning/telemetry service payloads.

use std::fmt;

use geo::Point;
use serde::{Deserialize, Deserializer, Serialize};

use crate::identifiers::*;
use crate::models::color::{RouteColor, color_for_route};
use crate::spatial::queries::haversine_distance;

// ============================================================================
// Coordinates
// ============================================================================

/// A WGS84 position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

impl From<Coordinate> for Point {
    fn from(c: Coordinate) -> Self {
        Point::new(c.lng, c.lat)
    }
}

impl From<Point> for Coordinate {
    fn from(p: Point) -> Self {
        Coordinate::new(p.y(), p.x())
    }
}

impl From<Coordinate> for geo::Coord {
    fn from(c: Coordinate) -> Self {
        geo::Coord { x: c.lng, y: c.lat }
    }
}

// ============================================================================
// Stops and vehicles
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopIdentifier,
    #[serde(default)]
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Stop {
    pub fn location(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// A vehicle as reported by one telemetry poll.
///
/// Every positional field is optional upstream; a vehicle lacking either
/// coordinate has an unknown position and is never rendered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleIdentifier,
    #[serde(default)]
    pub route_id: Option<RouteIdentifier>,
    #[serde(default)]
    pub route_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub heading: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

impl Vehicle {
    /// The reported position, if both coordinates are present and finite.
    pub fn position(&self) -> Option<Coordinate> {
        let coordinate = Coordinate::new(self.lat?, self.lng?);
        coordinate.is_finite().then_some(coordinate)
    }

    /// Reported color, else a stable color derived from the route (or the
    /// vehicle itself when the route is unknown).
    pub fn display_color(&self) -> RouteColor {
        if let Some(color) = self.color.as_deref().and_then(|c| c.parse().ok()) {
            return color;
        }

        match (&self.route_id, &self.route_name) {
            (Some(route), _) => color_for_route(route.as_str()),
            (None, Some(name)) => color_for_route(name),
            (None, None) => color_for_route(self.id.as_str()),
        }
    }
}

/// Vehicles with a known position, paired with that position.
pub fn positioned_vehicles(vehicles: &[Vehicle]) -> impl Iterator<Item = (&Vehicle, Coordinate)> {
    vehicles
        .iter()
        .filter_map(|vehicle| vehicle.position().map(|position| (vehicle, position)))
}

// Upstream passes raw telemetry through when a fix is incomplete, so numbers
// may arrive as strings ("270") or garbage; only finite numbers survive.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite()))
}

// ============================================================================
// Trips
// ============================================================================

/// A user-chosen location snapped to its nearest stop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripEndpoint {
    pub location: Coordinate,
    pub nearest_stop: Stop,
    /// Walking distance in meters between `location` and `nearest_stop`.
    pub distance_m: f64,
}

/// The vehicle expected to serve a segment, with its ETA estimates in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NextBusInfo {
    pub vehicle_id: VehicleIdentifier,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub distance_to_origin_stop: Option<f64>,
    #[serde(default)]
    pub eta_to_origin_stop: Option<f64>,
    #[serde(default)]
    pub wait_eta_s: Option<f64>,
    #[serde(default)]
    pub ride_eta_s: Option<f64>,
    #[serde(default)]
    pub segment_eta_s: Option<f64>,
}

impl NextBusInfo {
    pub fn location(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }

    /// Best available ETA for the whole segment, in seconds.
    pub fn best_eta(&self) -> Option<f64> {
        self.segment_eta_s
            .or_else(|| Some(self.wait_eta_s? + self.ride_eta_s?))
            .or(self.wait_eta_s)
            .or(self.eta_to_origin_stop)
    }
}

/// A contiguous ride on a single route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripSegment {
    pub route_id: RouteIdentifier,
    #[serde(default)]
    pub route_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub start_stop: Stop,
    pub end_stop: Stop,
    #[serde(default)]
    pub stops: Vec<Stop>,
    /// High-resolution path following the street network, when known.
    #[serde(default, alias = "path")]
    pub shape: Option<Vec<Coordinate>>,
    #[serde(default)]
    pub next_bus: Option<NextBusInfo>,
}

impl TripSegment {
    /// Every stop this segment touches: start, intermediates, end.
    pub fn touched_stops(&self) -> impl Iterator<Item = &Stop> {
        std::iter::once(&self.start_stop)
            .chain(self.stops.iter())
            .chain(std::iter::once(&self.end_stop))
    }

    /// How far the serving vehicle is from the boarding stop, in meters.
    /// Falls back to the straight-line distance when the service omits it.
    pub fn next_bus_distance_m(&self) -> Option<f64> {
        let bus = self.next_bus.as_ref()?;
        Some(
            bus.distance_to_origin_stop
                .unwrap_or_else(|| haversine_distance(bus.location(), self.start_stop.location())),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripResponse {
    pub origin: TripEndpoint,
    pub destination: TripEndpoint,
    pub system_id: SystemIdentifier,
    #[serde(default)]
    pub segments: Vec<TripSegment>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TripResponse {
    /// True when at least one segment is tracking a live vehicle.
    pub fn has_realtime(&self) -> bool {
        self.segments.iter().any(|s| s.next_bus.is_some())
    }

    pub fn key(&self) -> TripKey {
        TripKey {
            system: self.system_id.clone(),
            origin_stop: self.origin.nearest_stop.id.clone(),
            destination_stop: self.destination.nearest_stop.id.clone(),
        }
    }
}

/// Distinguishes a refreshed copy of a trip from a genuinely new one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TripKey {
    pub system: SystemIdentifier,
    pub origin_stop: StopIdentifier,
    pub destination_stop: StopIdentifier,
}

impl fmt::Display for TripKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}->{}", self.system, self.origin_stop, self.destination_stop)
    }
}

/// The inputs of a planning request, kept so the trip can be re-planned.
#[derive(Clone, Debug, PartialEq)]
pub struct TripRequest {
    pub system: SystemIdentifier,
    pub origin: Coordinate,
    pub destination: Coordinate,
}

// ============================================================================
// Route shapes and systems
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePathPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub stop_id: Option<StopIdentifier>,
    #[serde(default)]
    pub stop_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    pub route_id: RouteIdentifier,
    #[serde(default)]
    pub route_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub path: Vec<RoutePathPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitSystem {
    pub id: SystemIdentifier,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, TransitError>;
