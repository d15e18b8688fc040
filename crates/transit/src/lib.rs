//! # ridewatch-transit
//!
//! Data model and pure geometry for a live transit map.
//!
//! ## Features
//!
//! - **Wire types**: stops, vehicles, trips and route shapes as the planning
//!   service serves them, tolerant of string-or-number identifiers
//! - **Geometry**: bearings, haversine distance, interpolation, bounding regions
//! - **Projection**: trip segments and route shapes to colored polylines, with
//!   a deterministic fallback palette
//!
//! ## Example
//!
//! ```
//! use ridewatch_transit::prelude::*;
//!
//! let stops = vec![
//!     Stop { id: StopIdentifier::new("1"), name: "Quad".into(), lat: 42.381, lng: -71.125 },
//!     Stop { id: StopIdentifier::new("2"), name: "Yard".into(), lat: 42.374, lng: -71.117 },
//! ];
//!
//! let region = BoundingRegion::from_stops(&stops).unwrap();
//! assert_eq!(region.south_west(), Coordinate::new(42.374, -71.125));
//!
//! let heading = bearing(stops[0].location(), stops[1].location());
//! assert!(heading > 90.0 && heading < 180.0); // south-east
//! ```

pub mod identifiers;
pub mod models;
pub mod projector;
pub mod spatial;

// Re-exports for convenience
pub mod prelude {
    pub use crate::identifiers::*;
    pub use crate::models::*;
    pub use crate::projector::{
        LineSource, RouteLine, TripLine, WalkDirection, WalkPolicy, WalkingLeg, project_trip,
        route_path_lines, walking_legs,
    };
    pub use crate::spatial::*;
}

pub use prelude::*;
