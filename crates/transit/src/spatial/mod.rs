//! Geometry utilities and bounding regions.

pub mod bounds;
pub mod queries;

pub use bounds::BoundingRegion;
pub use queries::{bearing, haversine_distance, lerp, lerp_coordinate, normalize_degrees};
