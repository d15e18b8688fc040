//! Smooth vehicle motion between telemetry polls.

pub mod driver;
pub mod interpolator;

pub use driver::AnimationDriver;
pub use interpolator::{PositionInterpolator, RenderedVehicle, TweenToken};

/// Monotonic time as seen by the tokio runtime.
///
/// Follows the runtime clock, so paused-time tests advance it with
/// `tokio::time::advance`.
pub fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}
