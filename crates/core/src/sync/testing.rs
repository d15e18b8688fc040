//! A scripted in-memory service for exercising session timing.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ridewatch_transit::*;

use crate::error::LiveError;
use crate::network::{ApiFuture, TransitApi};

/// `Err` carries an HTTP status and optional server detail.
pub type Reply<T> = std::result::Result<T, (u16, Option<String>)>;

/// Replies are served in order; the last one repeats forever.
pub struct Script<T> {
    replies: Mutex<VecDeque<(Duration, Reply<T>)>>,
    calls: AtomicUsize,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl<T: Clone + Send + 'static> Script<T> {
    pub fn push(&self, reply: Reply<T>) -> &Self {
        self.push_after(Duration::ZERO, reply)
    }

    pub fn push_after(&self, delay: Duration, reply: Reply<T>) -> &Self {
        self.replies.lock().unwrap().push_back((delay, reply));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn respond<'a>(&self) -> ApiFuture<'a, T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };

        Box::pin(async move {
            let Some((delay, reply)) = next else {
                return Err(LiveError::Status {
                    status: 503,
                    detail: None,
                });
            };
            tokio::time::sleep(delay).await;
            reply.map_err(|(status, detail)| LiveError::Status { status, detail })
        })
    }
}

#[derive(Default)]
pub struct ScriptedApi {
    pub stops: Script<Vec<Stop>>,
    pub vehicles: Script<Vec<Vehicle>>,
    pub route_paths: Script<Vec<RoutePath>>,
    pub trips: Script<TripResponse>,
    pub systems: Script<Vec<TransitSystem>>,
}

impl TransitApi for ScriptedApi {
    fn stops<'a>(&'a self, _system: &'a SystemIdentifier) -> ApiFuture<'a, Vec<Stop>> {
        self.stops.respond()
    }

    fn vehicles<'a>(&'a self, _system: &'a SystemIdentifier) -> ApiFuture<'a, Vec<Vehicle>> {
        self.vehicles.respond()
    }

    fn route_paths<'a>(&'a self, _system: &'a SystemIdentifier) -> ApiFuture<'a, Vec<RoutePath>> {
        self.route_paths.respond()
    }

    fn plan_trip<'a>(&'a self, _request: &'a TripRequest) -> ApiFuture<'a, TripResponse> {
        self.trips.respond()
    }

    fn systems<'a>(&'a self) -> ApiFuture<'a, Vec<TransitSystem>> {
        self.systems.respond()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn stop(id: &str, lat: f64, lng: f64) -> Stop {
    Stop {
        id: StopIdentifier::new(id),
        name: format!("Stop {id}"),
        lat,
        lng,
    }
}

pub fn vehicle(id: &str, lat: f64, lng: f64) -> Vehicle {
    Vehicle {
        id: VehicleIdentifier::new(id),
        route_id: Some(RouteIdentifier::new("red")),
        route_name: Some("Red Line".into()),
        lat: Some(lat),
        lng: Some(lng),
        heading: None,
        color: None,
    }
}

pub fn unpositioned(id: &str) -> Vehicle {
    Vehicle {
        lat: None,
        ..vehicle(id, 0.0, 0.0)
    }
}

/// Two segments: a shaped red one, then an uncolored one drawn through four
/// stops. With `realtime` the first segment tracks vehicle `v1`.
pub fn trip(origin_stop: &str, destination_stop: &str, realtime: bool) -> TripResponse {
    let shaped = TripSegment {
        route_id: RouteIdentifier::new("red"),
        route_name: Some("Red Line".into()),
        short_name: None,
        color: Some("#ff0000".into()),
        start_stop: stop(origin_stop, 42.0, -71.0),
        end_stop: stop("b", 42.0, -71.02),
        stops: vec![stop(origin_stop, 42.0, -71.0), stop("b", 42.0, -71.02)],
        shape: Some(vec![
            Coordinate::new(42.0, -71.0),
            Coordinate::new(42.001, -71.01),
            Coordinate::new(42.0, -71.02),
        ]),
        next_bus: realtime.then(|| NextBusInfo {
            vehicle_id: VehicleIdentifier::new("v1"),
            lat: 41.99,
            lng: -70.99,
            distance_to_origin_stop: Some(1200.0),
            eta_to_origin_stop: Some(180.0),
            wait_eta_s: Some(180.0),
            ride_eta_s: Some(300.0),
            segment_eta_s: None,
        }),
    };
    let plain = TripSegment {
        route_id: RouteIdentifier::new("shuttle"),
        route_name: None,
        short_name: Some("S".into()),
        color: None,
        start_stop: stop("b", 42.0, -71.02),
        end_stop: stop(destination_stop, 42.03, -71.02),
        stops: vec![
            stop("b", 42.0, -71.02),
            stop("c", 42.01, -71.02),
            stop("d", 42.02, -71.02),
            stop(destination_stop, 42.03, -71.02),
        ],
        shape: None,
        next_bus: None,
    };

    TripResponse {
        origin: TripEndpoint {
            location: Coordinate::new(42.0001, -71.0001),
            nearest_stop: stop(origin_stop, 42.0, -71.0),
            distance_m: 14.0,
        },
        destination: TripEndpoint {
            location: Coordinate::new(42.035, -71.02),
            nearest_stop: stop(destination_stop, 42.03, -71.02),
            distance_m: 550.0,
        },
        system_id: SystemIdentifier::new("831"),
        segments: vec![shaped, plain],
        error: None,
    }
}
