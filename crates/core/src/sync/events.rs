use ridewatch_transit::{Coordinate, TripResponse};

use crate::animation::RenderedVehicle;
use crate::sync::cycle::CycleKind;
use crate::viewport::CameraCommand;

/// Why a trip stopped refreshing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshStop {
    /// The trip no longer tracks any live vehicle.
    LostRealtime,
    /// A refresh request failed; the last trip stays on screen.
    Failed(String),
}

/// Notifications published by a [`LiveSession`](crate::sync::LiveSession).
#[derive(Clone, Debug, PartialEq)]
pub enum LiveEvent {
    StopsReplaced { count: usize },
    VehiclesUpdated { rendered: Vec<RenderedVehicle> },
    /// A polled resource started or stopped failing.
    FeedHealthChanged { resource: CycleKind, degraded: bool },
    RoutePathsChanged { count: usize },
    /// The only notification about the trip; `None` once it is gone.
    TripChanged(Option<Box<TripResponse>>),
    PlanningFailed(String),
    TripRefreshStopped { reason: RefreshStop },
    Camera(CameraCommand),
    UserLocationChanged(Option<Coordinate>),
    UserLocationFailed(String),
}
