use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use ridewatch_transit::{
    BoundingRegion, Coordinate, RouteLine, RoutePath, Stop, SystemIdentifier, TripLine,
    TripRequest, TripResponse, Vehicle, WalkingLeg, positioned_vehicles, project_trip,
    route_path_lines, walking_legs,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::animation::{self, AnimationDriver, PositionInterpolator, RenderedVehicle};
use crate::config::LiveConfig;
use crate::error::{LiveError, Result};
use crate::network::{HttpTransitApi, TransitApi};
use crate::sync::cycle::{CancelFlag, Cycle, CycleKind};
use crate::sync::events::{LiveEvent, RefreshStop};
use crate::sync::freshness::relative_label;
use crate::sync::state::{LiveState, Shared};
use crate::viewport::{CameraCommand, ViewportState};

/// Keeps a map's stops, vehicles, route shapes and planned trip in step with
/// the service.
///
/// Control methods take effect synchronously: by the time one returns, every
/// cycle it supersedes is stopped and none of its late responses will be
/// applied. Changes are announced on the event channel returned by
/// [`LiveSession::new`]. Dropping the session stops every cycle.
///
/// Control methods spawn tasks and must be called from within a tokio runtime.
pub struct LiveSession {
    shared: Arc<Shared>,
}

impl LiveSession {
    pub fn new(api: Arc<dyn TransitApi>, config: LiveConfig) -> (Self, UnboundedReceiver<LiveEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let interpolator = Arc::new(Mutex::new(PositionInterpolator::new(config.tween_duration())));

        let shared = Arc::new(Shared {
            api,
            state: Mutex::new(LiveState::new(&config)),
            config,
            interpolator,
            events,
        });

        (Self { shared }, receiver)
    }

    /// A session talking HTTP to `config.base_url`.
    pub fn connect(config: LiveConfig) -> Result<(Self, UnboundedReceiver<LiveEvent>)> {
        config.validate()?;
        let api = HttpTransitApi::new(&config.base_url, config.request_timeout())?;
        Ok(Self::new(Arc::new(api), config))
    }

    pub fn config(&self) -> &LiveConfig {
        &self.shared.config
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Switches the active system, or deselects with `None`.
    ///
    /// Re-selecting the current system does nothing. Otherwise stops,
    /// vehicles and route shapes are dropped and fetched afresh, and a trip
    /// planned in another system is cleared.
    pub fn set_system(&self, system: Option<SystemIdentifier>) {
        let shared = &self.shared;
        let mut state = shared.lock();
        if state.system == system {
            return;
        }

        match &system {
            Some(id) => info!("selected system {id}"),
            None => info!("deselected system"),
        }

        state.cycles.stops = None;
        state.cycles.vehicles = None;
        state.cycles.route_paths = None;

        if !state.stops.is_empty() {
            state.stops.clear();
            shared.emit(LiveEvent::StopsReplaced { count: 0 });
        }

        let had_vehicles = !state.vehicles.is_empty() || !shared.lock_interpolator().is_empty();
        state.vehicles.clear();
        shared.lock_interpolator().clear();
        if had_vehicles {
            shared.emit(LiveEvent::VehiclesUpdated { rendered: Vec::new() });
        }
        if state.vehicle_error {
            state.vehicle_error = false;
            shared.emit(LiveEvent::FeedHealthChanged {
                resource: CycleKind::Vehicles,
                degraded: false,
            });
        }

        clear_route_paths(shared, &mut state);

        state.system = system.clone();
        state.viewport.select_system(system.clone());

        let foreign_trip = state
            .trip_request
            .as_ref()
            .is_some_and(|request| Some(&request.system) != system.as_ref());
        if foreign_trip {
            state.cycles.trip = None;
            clear_trip(shared, &mut state);
        }

        if let Some(system) = system {
            start_stops(shared, &mut state, system.clone());
            start_vehicles(shared, &mut state, system.clone());
            if state.routes_visible {
                start_route_paths(shared, &mut state, system);
            }
        }
    }

    /// Fetches the current system's stops again. The camera is not refitted.
    pub fn reload_stops(&self) {
        let mut state = self.shared.lock();
        if let Some(system) = state.system.clone() {
            start_stops(&self.shared, &mut state, system);
        }
    }

    /// Shows or hides route shapes. Hiding drops them and cancels any fetch;
    /// showing fetches them again.
    pub fn set_routes_visible(&self, visible: bool) {
        let mut state = self.shared.lock();
        if state.routes_visible == visible {
            return;
        }

        debug!("route shapes {}", if visible { "shown" } else { "hidden" });
        state.routes_visible = visible;

        if visible {
            if let Some(system) = state.system.clone() {
                start_route_paths(&self.shared, &mut state, system);
            }
        } else {
            clear_route_paths(&self.shared, &mut state);
        }
    }

    /// Plans a trip in the active system.
    ///
    /// Any earlier planning request or refresh cycle is stopped at once; the
    /// trip on screen stays until this request resolves. Fails only when the
    /// request cannot be made at all.
    pub fn plan_trip(&self, origin: Coordinate, destination: Coordinate) -> Result<()> {
        let mut state = self.shared.lock();

        let system = state
            .system
            .clone()
            .ok_or_else(|| LiveError::Planning("Select a transit system before planning a trip.".to_string()))?;
        if !origin.is_finite() || !destination.is_finite() {
            return Err(LiveError::Planning("Trip endpoints must be valid coordinates.".to_string()));
        }

        let request = TripRequest {
            system,
            origin,
            destination,
        };
        info!("planning trip in system {}", request.system);

        state.cycles.trip = None;
        state.trip_request = Some(request.clone());
        state.planning = true;
        state.planning_error = None;
        state.live_updating = false;
        start_trip(&self.shared, &mut state, request, TripPhase::Plan);

        Ok(())
    }

    /// Installs a trip planned elsewhere, refreshing it like a planned one.
    pub fn adopt_trip(&self, request: TripRequest, trip: TripResponse) {
        let shared = &self.shared;
        let mut state = shared.lock();

        state.cycles.trip = None;
        state.planning = false;

        match checked_trip(trip) {
            Ok(trip) => {
                info!("adopted trip {}", trip.key());
                state.trip_request = Some(request.clone());
                install_trip(shared, &mut state, trip);
                if state.live_updating {
                    start_trip(shared, &mut state, request, TripPhase::Refresh);
                }
            }
            Err(e) => fail_planning(shared, &mut state, &e),
        }
    }

    /// Drops the trip and everything derived from it.
    pub fn cancel_trip(&self) {
        let mut state = self.shared.lock();
        state.cycles.trip = None;
        state.planning_error = None;
        if state.trip.is_some() || state.trip_request.is_some() {
            info!("trip canceled");
        }
        clear_trip(&self.shared, &mut state);
    }

    /// Returns whether the location actually changed.
    pub fn set_user_location(&self, location: Option<Coordinate>) -> bool {
        let mut state = self.shared.lock();
        state.location_error = None;
        if state.user_location == location {
            return false;
        }

        state.user_location = location;
        self.shared.emit(LiveEvent::UserLocationChanged(location));
        true
    }

    pub fn report_location_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("location unavailable: {message}");

        let mut state = self.shared.lock();
        state.location_error = Some(message.clone());
        self.shared.emit(LiveEvent::UserLocationFailed(message));
    }

    /// Frames the trip, else the system. Returns the command it emitted.
    pub fn recenter(&self) -> Option<CameraCommand> {
        let state = self.shared.lock();
        let command = state.viewport.recenter()?;
        self.shared.emit(LiveEvent::Camera(command.clone()));
        Some(command)
    }

    /// Starts publishing animation frames for this session's vehicles.
    pub fn spawn_animation(&self) -> AnimationDriver {
        AnimationDriver::spawn(self.shared.interpolator.clone(), self.shared.config.frame_interval())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn system(&self) -> Option<SystemIdentifier> {
        self.shared.lock().system.clone()
    }

    pub fn vehicle_error(&self) -> bool {
        self.shared.lock().vehicle_error
    }

    pub fn route_error(&self) -> bool {
        self.shared.lock().route_error
    }

    pub fn routes_visible(&self) -> bool {
        self.shared.lock().routes_visible
    }

    pub fn is_live_updating(&self) -> bool {
        self.shared.lock().live_updating
    }

    pub fn is_planning(&self) -> bool {
        self.shared.lock().planning
    }

    pub fn planning_error(&self) -> Option<String> {
        self.shared.lock().planning_error.clone()
    }

    pub fn user_location(&self) -> Option<Coordinate> {
        self.shared.lock().user_location
    }

    pub fn location_error(&self) -> Option<String> {
        self.shared.lock().location_error.clone()
    }

    pub fn stops(&self) -> Vec<Stop> {
        self.shared.lock().stops.clone()
    }

    /// The last polled vehicles that have a known position.
    pub fn vehicles(&self) -> Vec<Vehicle> {
        let state = self.shared.lock();
        positioned_vehicles(&state.vehicles)
            .map(|(vehicle, _)| vehicle.clone())
            .collect()
    }

    pub fn trip(&self) -> Option<TripResponse> {
        self.shared.lock().trip.clone()
    }

    pub fn route_paths(&self) -> Vec<RoutePath> {
        self.shared.lock().route_paths.clone()
    }

    pub fn trip_lines(&self) -> Vec<TripLine> {
        self.shared.lock().trip.as_ref().map(project_trip).unwrap_or_default()
    }

    pub fn walking_legs(&self) -> Vec<WalkingLeg> {
        let policy = self.shared.config.walk_policy;
        self.shared
            .lock()
            .trip
            .as_ref()
            .map(|trip| walking_legs(trip, &policy))
            .unwrap_or_default()
    }

    pub fn route_lines(&self) -> Vec<RouteLine> {
        route_path_lines(&self.shared.lock().route_paths)
    }

    pub fn system_bounds(&self) -> Option<BoundingRegion> {
        self.shared.lock().viewport.system_bounds()
    }

    pub fn trip_bounds(&self) -> Option<BoundingRegion> {
        self.shared.lock().trip_bounds()
    }

    pub fn viewport_state(&self) -> ViewportState {
        self.shared.lock().viewport.state().clone()
    }

    pub fn running_cycles(&self) -> Vec<CycleKind> {
        self.shared.lock().cycles.running()
    }

    /// How long ago the trip was last planned or refreshed.
    pub fn last_updated_label(&self, now: DateTime<Utc>) -> Option<String> {
        let state = self.shared.lock();
        state.trip.as_ref()?;
        state.trip_updated_at.map(|at| relative_label(at, now))
    }

    /// Vehicle markers as they should be drawn at `now`.
    pub fn frame(&self, now: Instant) -> Vec<RenderedVehicle> {
        self.shared.lock_interpolator().frame(now)
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        drop(std::mem::take(&mut state.cycles));
    }
}

// ============================================================================
// Cycles
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TripPhase {
    Plan,
    Refresh,
}

fn start_stops(shared: &Arc<Shared>, state: &mut LiveState, system: SystemIdentifier) {
    let shared = shared.clone();
    state.cycles.stops = Some(Cycle::spawn(CycleKind::Stops, move |flag| fetch_stops(shared, flag, system)));
}

fn start_vehicles(shared: &Arc<Shared>, state: &mut LiveState, system: SystemIdentifier) {
    let shared = shared.clone();
    state.cycles.vehicles = Some(Cycle::spawn(CycleKind::Vehicles, move |flag| {
        poll_vehicles(shared, flag, system)
    }));
}

fn start_route_paths(shared: &Arc<Shared>, state: &mut LiveState, system: SystemIdentifier) {
    let shared = shared.clone();
    state.cycles.route_paths = Some(Cycle::spawn(CycleKind::RoutePaths, move |flag| {
        fetch_route_paths(shared, flag, system)
    }));
}

fn start_trip(shared: &Arc<Shared>, state: &mut LiveState, request: TripRequest, phase: TripPhase) {
    let shared = shared.clone();
    state.cycles.trip = Some(Cycle::spawn(CycleKind::Trip, move |flag| {
        run_trip(shared, flag, request, phase)
    }));
}

async fn fetch_stops(shared: Arc<Shared>, flag: CancelFlag, system: SystemIdentifier) {
    let result = shared.api.stops(&system).await;

    let mut state = shared.lock();
    if flag.is_canceled() {
        return;
    }

    match result {
        Ok(stops) => {
            info!("loaded {} stops for system {system}", stops.len());
            let bounds = BoundingRegion::from_stops(&stops);
            let count = stops.len();
            state.stops = stops;

            shared.emit(LiveEvent::StopsReplaced { count });
            if let Some(command) = state.viewport.on_system_bounds(bounds) {
                shared.emit(LiveEvent::Camera(command));
            }
        }
        Err(e) => warn!("failed to load stops for system {system}, keeping previous: {e}"),
    }
}

async fn poll_vehicles(shared: Arc<Shared>, flag: CancelFlag, system: SystemIdentifier) {
    let mut ticker = tokio::time::interval(shared.config.vehicle_poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let result = shared.api.vehicles(&system).await;

        let mut state = shared.lock();
        if flag.is_canceled() {
            return;
        }

        match result {
            Ok(vehicles) => {
                let now = animation::now();
                let rendered = {
                    let mut interpolator = shared.lock_interpolator();
                    interpolator.sync_fleet(&vehicles, now);
                    interpolator.frame(now)
                };
                debug!(
                    "polled {} vehicles ({} positioned) for system {system}",
                    vehicles.len(),
                    rendered.len()
                );
                state.vehicles = vehicles;

                if state.vehicle_error {
                    info!("vehicle feed recovered for system {system}");
                    state.vehicle_error = false;
                    shared.emit(LiveEvent::FeedHealthChanged {
                        resource: CycleKind::Vehicles,
                        degraded: false,
                    });
                }
                shared.emit(LiveEvent::VehiclesUpdated { rendered });
            }
            Err(e) => {
                warn!("vehicle poll failed for system {system}, keeping last positions: {e}");
                if !state.vehicle_error {
                    state.vehicle_error = true;
                    shared.emit(LiveEvent::FeedHealthChanged {
                        resource: CycleKind::Vehicles,
                        degraded: true,
                    });
                }
            }
        }
    }
}

async fn fetch_route_paths(shared: Arc<Shared>, flag: CancelFlag, system: SystemIdentifier) {
    let result = shared.api.route_paths(&system).await;

    let mut state = shared.lock();
    if flag.is_canceled() {
        return;
    }

    match result {
        Ok(paths) => {
            info!("loaded {} route shapes for system {system}", paths.len());
            let count = paths.len();
            state.route_paths = paths;
            set_route_error(&shared, &mut state, false);
            shared.emit(LiveEvent::RoutePathsChanged { count });
        }
        Err(e) => {
            warn!("failed to load route shapes for system {system}: {e}");
            set_route_error(&shared, &mut state, true);
        }
    }
}

/// Plans (unless starting from an adopted trip), then refreshes while the
/// trip tracks a live vehicle. The first failed refresh ends the cycle.
async fn run_trip(shared: Arc<Shared>, flag: CancelFlag, request: TripRequest, phase: TripPhase) {
    if phase == TripPhase::Plan {
        let result = shared.api.plan_trip(&request).await.and_then(checked_trip);

        let mut state = shared.lock();
        if flag.is_canceled() {
            return;
        }
        state.planning = false;

        match result {
            Ok(trip) => {
                info!("planned trip {} with {} segments", trip.key(), trip.segments.len());
                install_trip(&shared, &mut state, trip);
                if !state.live_updating {
                    return;
                }
            }
            Err(e) => {
                fail_planning(&shared, &mut state, &e);
                return;
            }
        }
    }

    let period = shared.config.trip_refresh_interval();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let result = shared.api.plan_trip(&request).await.and_then(checked_trip);

        let mut state = shared.lock();
        if flag.is_canceled() {
            return;
        }

        match result {
            Ok(trip) => {
                debug!("refreshed trip {}", trip.key());
                install_trip(&shared, &mut state, trip);
                if !state.live_updating {
                    info!("trip no longer tracks a live vehicle, refresh stopped");
                    shared.emit(LiveEvent::TripRefreshStopped {
                        reason: RefreshStop::LostRealtime,
                    });
                    return;
                }
            }
            Err(e) => {
                warn!("trip refresh failed, keeping last trip: {e}");
                state.live_updating = false;
                shared.emit(LiveEvent::TripRefreshStopped {
                    reason: RefreshStop::Failed(e.to_string()),
                });
                return;
            }
        }
    }
}

// ============================================================================
// State transitions
// ============================================================================

/// A successful response can still carry an `error` explaining why no trip
/// exists.
fn checked_trip(trip: TripResponse) -> Result<TripResponse> {
    if let Some(message) = trip.error.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        return Err(LiveError::Planning(message.to_string()));
    }
    Ok(trip)
}

fn install_trip(shared: &Shared, state: &mut LiveState, trip: TripResponse) {
    let key = trip.key();
    let bounds = BoundingRegion::from_trip(&trip);

    state.live_updating = trip.has_realtime();
    state.trip_updated_at = Some(Utc::now());
    state.planning_error = None;
    state.trip = Some(trip.clone());

    shared.emit(LiveEvent::TripChanged(Some(Box::new(trip))));
    if let Some(command) = state.viewport.on_trip(Some((key, bounds))) {
        shared.emit(LiveEvent::Camera(command));
    }
}

fn fail_planning(shared: &Shared, state: &mut LiveState, error: &LiveError) {
    let message = error.user_message();
    warn!("trip planning failed: {error}");

    clear_trip(shared, state);
    state.planning_error = Some(message.clone());
    shared.emit(LiveEvent::PlanningFailed(message));
}

/// Clears trip state. The caller owns stopping the trip cycle.
fn clear_trip(shared: &Shared, state: &mut LiveState) {
    state.trip_request = None;
    state.trip_updated_at = None;
    state.live_updating = false;
    state.planning = false;
    state.viewport.on_trip(None);

    if state.trip.take().is_some() {
        shared.emit(LiveEvent::TripChanged(None));
    }
}

fn clear_route_paths(shared: &Shared, state: &mut LiveState) {
    state.cycles.route_paths = None;
    set_route_error(shared, state, false);
    if !state.route_paths.is_empty() {
        state.route_paths.clear();
        shared.emit(LiveEvent::RoutePathsChanged { count: 0 });
    }
}

fn set_route_error(shared: &Shared, state: &mut LiveState, degraded: bool) {
    if state.route_error != degraded {
        state.route_error = degraded;
        shared.emit(LiveEvent::FeedHealthChanged {
            resource: CycleKind::RoutePaths,
            degraded,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeDelta;
    use ridewatch_transit::{LineSource, RouteIdentifier, RoutePathPoint, WalkDirection, fallback_color};

    use super::*;
    use crate::sync::testing::*;
    use crate::viewport::FitTarget;

    const ORIGIN: Coordinate = Coordinate::new(42.0001, -71.0001);
    const DESTINATION: Coordinate = Coordinate::new(42.035, -71.02);

    fn session(api: &Arc<ScriptedApi>) -> (LiveSession, UnboundedReceiver<LiveEvent>) {
        LiveSession::new(api.clone(), LiveConfig::default())
    }

    /// Lets spawned cycles run without crossing any poll interval.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn drain(rx: &mut UnboundedReceiver<LiveEvent>) -> Vec<LiveEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn fits(events: &[LiveEvent]) -> Vec<FitTarget> {
        events
            .iter()
            .filter_map(|event| match event {
                LiveEvent::Camera(CameraCommand::FitBounds { target, .. }) => Some(*target),
                _ => None,
            })
            .collect()
    }

    fn count(events: &[LiveEvent], predicate: impl Fn(&LiveEvent) -> bool) -> usize {
        events.iter().filter(|event| predicate(event)).count()
    }

    fn system() -> Option<SystemIdentifier> {
        Some(SystemIdentifier::new("831"))
    }

    /// Two stops; every other endpoint answers 503 until scripted.
    fn scripted() -> Arc<ScriptedApi> {
        let api = Arc::new(ScriptedApi::default());
        api.stops
            .push(Ok(vec![stop("1", 42.37, -71.12), stop("2", 42.38, -71.11)]));
        api
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_selection_fits_once() {
        let api = scripted();
        api.vehicles.push(Ok(Vec::new()));
        let (session, mut rx) = session(&api);

        session.set_system(None);
        session.set_system(system());
        settle().await;

        assert_eq!(api.stops.calls(), 1);
        assert_eq!(session.stops().len(), 2);
        assert_eq!(
            session.system_bounds().unwrap().south_west(),
            Coordinate::new(42.37, -71.12)
        );
        assert_eq!(session.viewport_state(), ViewportState::SystemFramed);

        // Same system again: no restart. Reload: a second identical response.
        session.set_system(system());
        session.reload_stops();
        settle().await;
        assert_eq!(api.stops.calls(), 2);

        let events = drain(&mut rx);
        assert_eq!(count(&events, |e| matches!(e, LiveEvent::StopsReplaced { count: 2 })), 2);
        assert_eq!(fits(&events), vec![FitTarget::System]);

        assert_eq!(api.vehicles.calls(), 1);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(api.vehicles.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vehicle_failure_keeps_last_positions() {
        let api = scripted();
        api.vehicles
            .push(Ok(vec![vehicle("v1", 42.0, -71.0), unpositioned("v2")]))
            .push(Err((502, None)))
            .push(Ok(vec![vehicle("v1", 42.001, -71.0)]));
        let (session, mut rx) = session(&api);

        session.set_system(system());
        settle().await;
        assert_eq!(session.vehicles().len(), 1);
        assert!(!session.vehicle_error());

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(session.vehicle_error());
        assert_eq!(session.vehicles()[0].lat, Some(42.0));

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(!session.vehicle_error());
        assert_eq!(session.vehicles()[0].lat, Some(42.001));

        let events = drain(&mut rx);
        let health: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                LiveEvent::FeedHealthChanged { resource, degraded } => Some((*resource, *degraded)),
                _ => None,
            })
            .collect();
        assert_eq!(health, vec![(CycleKind::Vehicles, true), (CycleKind::Vehicles, false)]);

        // The unpositioned vehicle never reached the renderer
        let first = events.iter().find_map(|e| match e {
            LiveEvent::VehiclesUpdated { rendered } => Some(rendered.clone()),
            _ => None,
        });
        assert_eq!(first.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polled_positions_advance_without_driver() {
        let api = scripted();
        api.vehicles
            .push(Ok(vec![vehicle("v1", 0.0, 0.0)]))
            .push(Ok(vec![vehicle("v1", 0.0, 1.0)]))
            .push(Ok(vec![vehicle("v1", 0.0, 2.0)]))
            .push(Ok(vec![vehicle("v1", 0.0, 3.0)]));
        let (session, mut rx) = session(&api);

        session.set_system(system());
        settle().await;
        tokio::time::sleep(Duration::from_millis(9000)).await;
        assert_eq!(api.vehicles.calls(), 4);

        // Each poll publishes where the marker starts its next tween
        let starts: Vec<f64> = drain(&mut rx)
            .iter()
            .filter_map(|e| match e {
                LiveEvent::VehiclesUpdated { rendered } => Some(rendered[0].position.lng),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![0.0, 0.0, 1.0, 2.0]);

        tokio::time::sleep(Duration::from_millis(590)).await;
        let midway = session.frame(animation::now());
        approx::assert_relative_eq!(midway[0].position.lng, 2.5, epsilon = 1e-6);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(session.frame(animation::now())[0].position, Coordinate::new(0.0, 3.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_switch_discards_in_flight_responses() {
        let api = scripted();
        api.vehicles
            .push_after(Duration::from_secs(2), Ok(vec![vehicle("old", 42.0, -71.0)]))
            .push(Ok(vec![vehicle("new", 40.7, -74.0)]));
        let (session, mut rx) = session(&api);

        session.set_system(system());
        settle().await;
        session.set_system(Some(SystemIdentifier::new("4")));
        tokio::time::sleep(Duration::from_secs(5)).await;

        let ids: Vec<_> = session.vehicles().iter().map(|v| v.id.to_string()).collect();
        assert_eq!(ids, vec!["new"]);

        let events = drain(&mut rx);
        let saw_old = events.iter().any(|e| match e {
            LiveEvent::VehiclesUpdated { rendered } => rendered.iter().any(|v| v.id.as_str() == "old"),
            _ => false,
        });
        assert!(!saw_old);
        assert_eq!(fits(&events), vec![FitTarget::System, FitTarget::System]);
        assert_eq!(session.running_cycles(), vec![CycleKind::Vehicles]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_stops_when_realtime_is_lost() {
        let api = scripted();
        api.trips
            .push(Ok(trip("a", "e", true)))
            .push(Ok(trip("a", "e", true)))
            .push(Ok(trip("a", "e", false)));
        let (session, mut rx) = session(&api);
        session.set_system(system());
        settle().await;

        session.plan_trip(ORIGIN, DESTINATION).unwrap();
        assert!(session.is_planning());
        settle().await;
        assert!(!session.is_planning());
        assert!(session.is_live_updating());
        assert_eq!(api.trips.calls(), 1);

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(api.trips.calls(), 2);
        assert!(session.is_live_updating());

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(api.trips.calls(), 3);
        assert!(!session.is_live_updating());
        assert!(session.trip().is_some());

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(api.trips.calls(), 3);

        let events = drain(&mut rx);
        assert_eq!(count(&events, |e| matches!(e, LiveEvent::TripChanged(Some(_)))), 3);
        assert_eq!(
            count(&events, |e| *e == LiveEvent::TripRefreshStopped { reason: RefreshStop::LostRealtime }),
            1
        );
        // Refreshes of the same trip never move the camera
        assert_eq!(fits(&events), vec![FitTarget::System, FitTarget::Trip]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_is_fail_stop() {
        let api = scripted();
        api.trips
            .push(Ok(trip("a", "e", true)))
            .push(Err((500, None)));
        let (session, mut rx) = session(&api);
        session.set_system(system());
        session.plan_trip(ORIGIN, DESTINATION).unwrap();
        settle().await;

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(api.trips.calls(), 2);
        assert!(!session.is_live_updating());
        assert!(session.trip().is_some());
        assert_eq!(session.planning_error(), None);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.trips.calls(), 2);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            LiveEvent::TripRefreshStopped { reason: RefreshStop::Failed(_) }
        )));
        assert_eq!(count(&events, |e| matches!(e, LiveEvent::PlanningFailed(_))), 0);
        assert_eq!(count(&events, |e| matches!(e, LiveEvent::TripChanged(None))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_planning_failure_clears_trip() {
        let api = scripted();
        let mut refused = trip("a", "e", false);
        refused.error = Some("Origin is outside the service area".into());
        api.trips
            .push(Ok(trip("a", "e", false)))
            .push(Err((404, Some("No path found between these stops".into()))))
            .push(Ok(refused));
        let (session, mut rx) = session(&api);
        session.set_system(system());

        session.plan_trip(ORIGIN, DESTINATION).unwrap();
        settle().await;
        assert!(session.trip().is_some());
        assert!(!session.is_live_updating());

        // Without a live vehicle nothing is refreshed
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(api.trips.calls(), 1);

        session.plan_trip(ORIGIN, DESTINATION).unwrap();
        // The old trip stays on screen while the new request is pending
        assert!(session.trip().is_some());
        settle().await;
        assert!(session.trip().is_none());
        assert_eq!(session.planning_error().as_deref(), Some("No path found between these stops"));
        assert!(session.trip_lines().is_empty());

        session.plan_trip(ORIGIN, DESTINATION).unwrap();
        settle().await;
        assert_eq!(session.planning_error().as_deref(), Some("Origin is outside the service area"));

        let events = drain(&mut rx);
        let failures: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                LiveEvent::PlanningFailed(message) => Some(message.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            failures,
            vec!["No path found between these stops", "Origin is outside the service area"]
        );
        assert_eq!(count(&events, |e| matches!(e, LiveEvent::TripChanged(None))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_plan_supersedes_pending_one() {
        let api = scripted();
        api.trips
            .push_after(Duration::from_secs(5), Ok(trip("a", "e", false)))
            .push(Ok(trip("x", "y", false)));
        let (session, mut rx) = session(&api);
        session.set_system(system());

        session.plan_trip(ORIGIN, DESTINATION).unwrap();
        settle().await;
        session.plan_trip(Coordinate::new(42.1, -71.1), DESTINATION).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(session.trip().unwrap().key().to_string(), "831:x->y");
        let events = drain(&mut rx);
        assert_eq!(count(&events, |e| matches!(e, LiveEvent::TripChanged(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trip_projection_through_session() {
        let api = scripted();
        api.trips.push(Ok(trip("a", "e", true)));
        let (session, _rx) = session(&api);
        session.set_system(system());
        session.plan_trip(ORIGIN, DESTINATION).unwrap();
        settle().await;

        let lines = session.trip_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].source, LineSource::Shape);
        assert_eq!(lines[0].coordinates.len(), 3);
        assert_eq!(lines[0].color.to_string(), "#ff0000");
        assert_eq!(lines[1].source, LineSource::Stops);
        assert_eq!(lines[1].coordinates.len(), 4);
        assert_eq!(lines[1].color, fallback_color(1));

        let legs = session.walking_legs();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].direction, WalkDirection::FromAlightingStop);

        let bounds = session.trip_bounds().unwrap();
        assert_eq!(bounds.south_west(), Coordinate::new(42.0, -71.02));
        assert_eq!(bounds.north_east(), Coordinate::new(42.03, -71.0));
        assert_eq!(session.last_updated_label(Utc::now()).as_deref(), Some("just now"));
        assert_eq!(
            session
                .last_updated_label(Utc::now() + TimeDelta::seconds(90))
                .as_deref(),
            Some("1 min ago")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_trip_stops_refresh() {
        let api = scripted();
        api.trips.push(Ok(trip("a", "e", true)));
        let (session, mut rx) = session(&api);
        session.set_system(system());
        session.plan_trip(ORIGIN, DESTINATION).unwrap();
        settle().await;
        assert!(session.is_live_updating());

        session.cancel_trip();
        assert!(session.trip().is_none());
        assert!(!session.is_live_updating());
        assert_eq!(session.last_updated_label(Utc::now()), None);
        assert_eq!(session.viewport_state(), ViewportState::SystemFramed);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.trips.calls(), 1);
        assert_eq!(count(&drain(&mut rx), |e| matches!(e, LiveEvent::TripChanged(None))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_system_clears_foreign_trip() {
        let api = scripted();
        api.trips.push(Ok(trip("a", "e", true)));
        let (session, _rx) = session(&api);
        session.set_system(system());
        session.plan_trip(ORIGIN, DESTINATION).unwrap();
        settle().await;
        assert!(session.trip().is_some());

        session.set_system(Some(SystemIdentifier::new("4")));
        assert!(session.trip().is_none());
        assert!(session.stops().is_empty());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.trips.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adopted_trip_refreshes() {
        let api = scripted();
        api.trips.push(Ok(trip("a", "e", false)));
        let (session, mut rx) = session(&api);
        session.set_system(system());

        let request = TripRequest {
            system: SystemIdentifier::new("831"),
            origin: ORIGIN,
            destination: DESTINATION,
        };
        session.adopt_trip(request, trip("a", "e", true));
        assert!(session.is_live_updating());
        assert_eq!(api.trips.calls(), 0);

        tokio::time::sleep(Duration::from_secs(8) + Duration::from_millis(10)).await;
        assert_eq!(api.trips.calls(), 1);
        assert!(!session.is_live_updating());
        assert!(drain(&mut rx).contains(&LiveEvent::TripRefreshStopped {
            reason: RefreshStop::LostRealtime
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_visibility_toggle() {
        let api = scripted();
        let path = |id: &str| RoutePath {
            route_id: RouteIdentifier::new(id),
            route_name: Some(format!("Route {id}")),
            short_name: None,
            color: None,
            path: vec![RoutePathPoint {
                lat: 42.0,
                lng: -71.0,
                stop_id: None,
                stop_name: None,
            }],
        };
        api.route_paths
            .push(Ok(vec![path("r1"), path("r2")]))
            .push(Err((500, None)));
        let (session, mut rx) = session(&api);
        session.set_system(system());
        settle().await;
        assert_eq!(api.route_paths.calls(), 0);

        session.set_routes_visible(true);
        settle().await;
        assert_eq!(session.route_lines().len(), 2);

        session.set_routes_visible(false);
        assert!(session.route_paths().is_empty());

        session.set_routes_visible(true);
        settle().await;
        assert_eq!(api.route_paths.calls(), 2);
        assert!(session.route_error());

        let events = drain(&mut rx);
        let changes: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                LiveEvent::RoutePathsChanged { count } => Some(*count),
                _ => None,
            })
            .collect();
        assert_eq!(changes, vec![2, 0]);
        assert!(events.contains(&LiveEvent::FeedHealthChanged {
            resource: CycleKind::RoutePaths,
            degraded: true
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_location_notifies_on_change() {
        let api = scripted();
        let (session, mut rx) = session(&api);
        let here = Some(Coordinate::new(42.37, -71.12));

        assert!(session.set_user_location(here));
        assert!(!session.set_user_location(here));
        session.report_location_error("Location permission denied");
        assert_eq!(session.location_error().as_deref(), Some("Location permission denied"));

        assert_eq!(
            drain(&mut rx),
            vec![
                LiveEvent::UserLocationChanged(here),
                LiveEvent::UserLocationFailed("Location permission denied".into())
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_requires_system() {
        let api = scripted();
        let (session, _rx) = session(&api);

        assert!(matches!(
            session.plan_trip(ORIGIN, DESTINATION),
            Err(LiveError::Planning(_))
        ));
        assert_eq!(api.trips.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recenter_and_animation_follow_session() {
        let api = scripted();
        api.vehicles
            .push(Ok(vec![vehicle("v1", 42.0, -71.0)]))
            .push(Ok(vec![vehicle("v1", 42.0, -70.99)]));
        let (session, mut rx) = session(&api);
        assert_eq!(session.recenter(), None);

        session.set_system(system());
        settle().await;
        drain(&mut rx);

        assert!(session.recenter().is_some());
        assert_eq!(fits(&drain(&mut rx)), vec![FitTarget::System]);

        let driver = session.spawn_animation();
        tokio::time::sleep(Duration::from_millis(3000)).await;
        let lng = driver.latest()[0].position.lng;
        assert!(lng > -71.0 && lng < -70.99, "mid-tween lng was {lng}");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(driver.latest()[0].position, Coordinate::new(42.0, -70.99));
        assert_eq!(session.frame(animation::now())[0].heading.round(), 90.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_every_cycle() {
        let api = scripted();
        api.trips.push(Ok(trip("a", "e", true)));
        let (session, _rx) = session(&api);
        session.set_system(system());
        session.set_routes_visible(true);
        session.plan_trip(ORIGIN, DESTINATION).unwrap();
        settle().await;

        let vehicle_calls = api.vehicles.calls();
        let trip_calls = api.trips.calls();
        drop(session);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.vehicles.calls(), vehicle_calls);
        assert_eq!(api.trips.calls(), trip_calls);
    }
}
