use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use ridewatch_transit::{
    BoundingRegion, Coordinate, RoutePath, Stop, SystemIdentifier, TripRequest, TripResponse,
    Vehicle,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::animation::PositionInterpolator;
use crate::config::LiveConfig;
use crate::network::TransitApi;
use crate::sync::cycle::Cycles;
use crate::sync::events::LiveEvent;
use crate::viewport::ViewportController;

/// Everything a session knows, guarded by one lock.
pub(crate) struct LiveState {
    pub system: Option<SystemIdentifier>,
    pub stops: Vec<Stop>,
    pub vehicles: Vec<Vehicle>,
    pub vehicle_error: bool,
    pub routes_visible: bool,
    pub route_paths: Vec<RoutePath>,
    pub route_error: bool,
    pub trip: Option<TripResponse>,
    /// Inputs of the pending or displayed trip, replayed on every refresh.
    pub trip_request: Option<TripRequest>,
    pub trip_updated_at: Option<DateTime<Utc>>,
    pub live_updating: bool,
    pub planning: bool,
    pub planning_error: Option<String>,
    pub user_location: Option<Coordinate>,
    pub location_error: Option<String>,
    pub viewport: ViewportController,
    pub cycles: Cycles,
}

impl LiveState {
    pub fn new(config: &LiveConfig) -> Self {
        Self {
            system: None,
            stops: Vec::new(),
            vehicles: Vec::new(),
            vehicle_error: false,
            routes_visible: config.show_routes,
            route_paths: Vec::new(),
            route_error: false,
            trip: None,
            trip_request: None,
            trip_updated_at: None,
            live_updating: false,
            planning: false,
            planning_error: None,
            user_location: None,
            location_error: None,
            viewport: ViewportController::new(config.fit_padding_px),
            cycles: Cycles::default(),
        }
    }

    pub fn trip_bounds(&self) -> Option<BoundingRegion> {
        self.trip.as_ref().and_then(BoundingRegion::from_trip)
    }
}

/// State shared between a session handle and its cycle tasks.
pub(crate) struct Shared {
    pub api: Arc<dyn TransitApi>,
    pub config: LiveConfig,
    pub state: Mutex<LiveState>,
    /// Locked after `state` whenever both are needed.
    pub interpolator: Arc<Mutex<PositionInterpolator>>,
    pub events: UnboundedSender<LiveEvent>,
}

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, LiveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock_interpolator(&self) -> MutexGuard<'_, PositionInterpolator> {
        self.interpolator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn emit(&self, event: LiveEvent) {
        trace!("event: {event:?}");
        // A host that dropped its receiver simply stops listening
        let _ = self.events.send(event);
    }
}
