//! Decides when the map camera is moved automatically.
//!
//! The camera is fitted to a system's stops once per system selection, and to
//! a trip once per distinct trip. Refreshes of the same trip and repeated stop
//! responses never move the camera again, so a user who panned away is left
//! alone until something genuinely new appears.

use ridewatch_transit::{BoundingRegion, SystemIdentifier, TripKey};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitTarget {
    System,
    Trip,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CameraCommand {
    FitBounds {
        region: BoundingRegion,
        /// Screen padding in pixels.
        padding: u32,
        target: FitTarget,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ViewportState {
    #[default]
    Uninitialized,
    SystemFramed,
    TripFramed(TripKey),
}

#[derive(Debug)]
pub struct ViewportController {
    padding: u32,
    state: ViewportState,
    system: Option<SystemIdentifier>,
    system_bounds: Option<BoundingRegion>,
    /// Set once the current system has had its one automatic fit.
    system_fitted: bool,
    trip_bounds: Option<BoundingRegion>,
    framed_trip: Option<TripKey>,
}

impl ViewportController {
    pub fn new(padding: u32) -> Self {
        Self {
            padding,
            state: ViewportState::Uninitialized,
            system: None,
            system_bounds: None,
            system_fitted: false,
            trip_bounds: None,
            framed_trip: None,
        }
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn system_bounds(&self) -> Option<BoundingRegion> {
        self.system_bounds
    }

    pub fn trip_bounds(&self) -> Option<BoundingRegion> {
        self.trip_bounds
    }

    /// Records the active system. Only an actual change re-arms the system fit.
    pub fn select_system(&mut self, system: Option<SystemIdentifier>) {
        if self.system == system {
            return;
        }

        debug!("viewport: system changed to {:?}", system.as_ref().map(|s| s.as_str()));
        self.system = system;
        self.system_bounds = None;
        self.system_fitted = false;
        if self.state == ViewportState::SystemFramed {
            self.state = ViewportState::Uninitialized;
        }
    }

    /// Feeds freshly computed System Bounds.
    ///
    /// The first non-empty bounds after a system selection fit the camera,
    /// unless a trip is already framed.
    pub fn on_system_bounds(&mut self, bounds: Option<BoundingRegion>) -> Option<CameraCommand> {
        self.system_bounds = bounds;
        let region = bounds?;

        if self.system_fitted {
            return None;
        }
        self.system_fitted = true;

        if matches!(self.state, ViewportState::TripFramed(_)) {
            return None;
        }

        self.state = ViewportState::SystemFramed;
        Some(self.fit(region, FitTarget::System))
    }

    /// Feeds the active trip (`None` when there is none).
    ///
    /// Fits when the trip has bounds and its key differs from the trip last
    /// framed. Clearing the trip clears that memory, so planning the same trip
    /// again frames it again.
    pub fn on_trip(&mut self, trip: Option<(TripKey, Option<BoundingRegion>)>) -> Option<CameraCommand> {
        let Some((key, bounds)) = trip else {
            self.trip_bounds = None;
            self.framed_trip = None;
            if matches!(self.state, ViewportState::TripFramed(_)) {
                self.state = if self.system_fitted {
                    ViewportState::SystemFramed
                } else {
                    ViewportState::Uninitialized
                };
            }
            return None;
        };

        self.trip_bounds = bounds;
        let region = bounds?;

        if self.framed_trip.as_ref() == Some(&key) {
            return None;
        }

        debug!("viewport: framing trip {key}");
        self.framed_trip = Some(key.clone());
        self.state = ViewportState::TripFramed(key);
        Some(self.fit(region, FitTarget::Trip))
    }

    /// Fits the trip if there is one, else the system. Does not change state.
    pub fn recenter(&self) -> Option<CameraCommand> {
        self.trip_bounds
            .map(|region| self.fit(region, FitTarget::Trip))
            .or_else(|| self.system_bounds.map(|region| self.fit(region, FitTarget::System)))
    }

    fn fit(&self, region: BoundingRegion, target: FitTarget) -> CameraCommand {
        CameraCommand::FitBounds {
            region,
            padding: self.padding,
            target,
        }
    }
}
