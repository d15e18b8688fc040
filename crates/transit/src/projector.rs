//! Turns trips and route shapes into colored polylines ready to draw.

use serde::{Deserialize, Serialize};

use crate::identifiers::RouteIdentifier;
use crate::models::color::{RouteColor, color_for_route, fallback_color};
use crate::models::types::{Coordinate, RoutePath, Stop, TripResponse};

/// Where a trip line's coordinates came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineSource {
    Shape,
    Stops,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TripLine {
    /// Position of the segment within the trip, not within the output.
    pub segment_index: usize,
    pub route_id: RouteIdentifier,
    pub label: Option<String>,
    pub coordinates: Vec<Coordinate>,
    pub color: RouteColor,
    pub source: LineSource,
}

/// One line per drawable segment, in trip order.
///
/// The shape polyline wins when present and non-empty; otherwise the stops
/// are connected. Segments with neither are skipped. Uncolored segments take
/// the fallback palette entry for their index, so re-rendering the same trip
/// always yields the same colors.
pub fn project_trip(trip: &TripResponse) -> Vec<TripLine> {
    trip.segments
        .iter()
        .enumerate()
        .filter_map(|(index, segment)| {
            let (coordinates, source) = match segment.shape.as_deref() {
                Some(shape) if !shape.is_empty() => (shape.to_vec(), LineSource::Shape),
                _ if !segment.stops.is_empty() => (
                    segment.stops.iter().map(Stop::location).collect(),
                    LineSource::Stops,
                ),
                _ => return None,
            };

            let color = segment
                .color
                .as_deref()
                .and_then(|c| RouteColor::parse(c).ok())
                .unwrap_or_else(|| fallback_color(index));

            Some(TripLine {
                segment_index: index,
                route_id: segment.route_id.clone(),
                label: segment.short_name.clone().or_else(|| segment.route_name.clone()),
                coordinates,
                color,
                source,
            })
        })
        .collect()
}

// ============================================================================
// Walking legs
// ============================================================================

/// Distances (meters, inclusive) for which a walk to or from a stop is drawn.
///
/// Below `min_m` the user is effectively at the stop; above `max_m` the snap
/// is too far off to be a sensible walk.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkPolicy {
    pub min_m: f64,
    pub max_m: f64,
}

impl Default for WalkPolicy {
    fn default() -> Self {
        Self {
            min_m: 20.0,
            max_m: 5000.0,
        }
    }
}

impl WalkPolicy {
    pub fn shows(&self, distance_m: f64) -> bool {
        distance_m.is_finite() && distance_m >= self.min_m && distance_m <= self.max_m
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkDirection {
    ToBoardingStop,
    FromAlightingStop,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WalkingLeg {
    pub direction: WalkDirection,
    pub from: Coordinate,
    pub to: Coordinate,
    pub distance_m: f64,
}

pub fn walking_legs(trip: &TripResponse, policy: &WalkPolicy) -> Vec<WalkingLeg> {
    if trip.segments.is_empty() {
        return Vec::new();
    }

    let mut legs = Vec::with_capacity(2);

    if policy.shows(trip.origin.distance_m) {
        legs.push(WalkingLeg {
            direction: WalkDirection::ToBoardingStop,
            from: trip.origin.location,
            to: trip.origin.nearest_stop.location(),
            distance_m: trip.origin.distance_m,
        });
    }

    if policy.shows(trip.destination.distance_m) {
        legs.push(WalkingLeg {
            direction: WalkDirection::FromAlightingStop,
            from: trip.destination.nearest_stop.location(),
            to: trip.destination.location,
            distance_m: trip.destination.distance_m,
        });
    }

    legs
}

// ============================================================================
// Route overview lines
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct RouteLine {
    pub route_id: RouteIdentifier,
    pub label: Option<String>,
    pub coordinates: Vec<Coordinate>,
    pub color: RouteColor,
}

pub fn route_path_lines(paths: &[RoutePath]) -> Vec<RouteLine> {
    paths
        .iter()
        .filter(|route| !route.path.is_empty())
        .map(|route| RouteLine {
            route_id: route.route_id.clone(),
            label: route.short_name.clone().or_else(|| route.route_name.clone()),
            coordinates: route
                .path
                .iter()
                .map(|p| Coordinate::new(p.lat, p.lng))
                .collect(),
            color: route
                .color
                .as_deref()
                .and_then(|c| RouteColor::parse(c).ok())
                .unwrap_or_else(|| color_for_route(route.route_id.as_str())),
        })
        .collect()
}
