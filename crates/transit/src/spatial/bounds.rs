//! Bounding regions used for camera framing.

use geo::{BoundingRect, MultiPoint, Point, Rect};

use crate::models::types::{Coordinate, Stop, TripResponse};

/// The smallest axis-aligned rectangle containing a set of coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingRegion(Rect);

impl BoundingRegion {
    /// Returns `None` for an empty set; non-finite coordinates are ignored.
    pub fn from_coordinates(coordinates: impl IntoIterator<Item = Coordinate>) -> Option<Self> {
        let points: Vec<Point> = coordinates
            .into_iter()
            .filter(Coordinate::is_finite)
            .map(Point::from)
            .collect();

        MultiPoint::from(points).bounding_rect().map(Self)
    }

    /// System Bounds: every stop of the current system.
    pub fn from_stops(stops: &[Stop]) -> Option<Self> {
        Self::from_coordinates(stops.iter().map(Stop::location))
    }

    /// Active Trip Bounds: both snapped endpoint stops, every stop touched by
    /// a segment, and any shape points.
    pub fn from_trip(trip: &TripResponse) -> Option<Self> {
        let endpoints = [
            trip.origin.nearest_stop.location(),
            trip.destination.nearest_stop.location(),
        ];
        let stops = trip
            .segments
            .iter()
            .flat_map(|segment| segment.touched_stops().map(Stop::location));
        let shapes = trip
            .segments
            .iter()
            .flat_map(|segment| segment.shape.iter().flatten().copied());

        Self::from_coordinates(endpoints.into_iter().chain(stops).chain(shapes))
    }

    pub fn south_west(&self) -> Coordinate {
        let min = self.0.min();
        Coordinate::new(min.y, min.x)
    }

    pub fn north_east(&self) -> Coordinate {
        let max = self.0.max();
        Coordinate::new(max.y, max.x)
    }
}
