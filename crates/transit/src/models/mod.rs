//! Transit data models, colors, and types.

pub mod color;
pub mod types;

// Re-exports for convenience
pub use color::{FALLBACK_PALETTE_LEN, RouteColor, color_for_route, fallback_color};
pub use types::*;
