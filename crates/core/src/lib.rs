//! # ridewatch-core
//!
//! Live state behind a transit map: vehicles gliding between telemetry polls,
//! a planned trip that keeps itself fresh while a bus is tracked, and a camera
//! that only moves when something new appears.
//!
//! The host owns drawing. It creates a [`LiveSession`], forwards user input
//! to it and renders whatever arrives on the [`LiveEvent`] channel, plus the
//! frames of an [`AnimationDriver`].

pub mod animation;
pub mod config;
pub mod error;
pub mod network;
pub mod sync;
pub mod viewport;

pub use animation::{AnimationDriver, PositionInterpolator, RenderedVehicle};
pub use config::LiveConfig;
pub use error::{LiveError, Result};
pub use network::{HttpTransitApi, TransitApi};
pub use sync::{CycleKind, LiveEvent, LiveSession, RefreshStop};
pub use viewport::{CameraCommand, FitTarget, ViewportController, ViewportState};

// Re-export the data model
pub use ridewatch_transit as transit;
