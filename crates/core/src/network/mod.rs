//! Access to the planning/telemetry service.
//!
//! Sessions talk to the service through [`TransitApi`] so hosts and tests can
//! swap the transport; [`HttpTransitApi`] is the real thing.

pub mod http;

use std::future::Future;
use std::pin::Pin;

use ridewatch_transit::{
    RoutePath, Stop, SystemIdentifier, TransitSystem, TripRequest, TripResponse, Vehicle,
};

use crate::error::Result;

pub use http::HttpTransitApi;

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Read-only endpoints of the service.
pub trait TransitApi: Send + Sync {
    /// `GET /stops?system_id=`
    fn stops<'a>(&'a self, system: &'a SystemIdentifier) -> ApiFuture<'a, Vec<Stop>>;

    /// `GET /vehicles?system_id=`
    fn vehicles<'a>(&'a self, system: &'a SystemIdentifier) -> ApiFuture<'a, Vec<Vehicle>>;

    /// `GET /route_paths?system_id=`
    fn route_paths<'a>(&'a self, system: &'a SystemIdentifier) -> ApiFuture<'a, Vec<RoutePath>>;

    /// `GET /trip?lat&lng&lat2&lng2&system_id`
    fn plan_trip<'a>(&'a self, request: &'a TripRequest) -> ApiFuture<'a, TripResponse>;

    /// `GET /systems`
    fn systems<'a>(&'a self) -> ApiFuture<'a, Vec<TransitSystem>>;
}
