//! Per-vehicle position tweening.
//!
//! Every tracked vehicle owns one track: where it was last drawn, where
//! it is heading, and when the current tween started. A new observation
//! starts from wherever the marker is at that instant, so an interrupted
//! tween is picked up mid-flight and a finished one counts as arrived,
//! whether or not a frame was drawn in between.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::{Duration, Instant};

use ridewatch_transit::{
    Coordinate, RouteColor, RouteIdentifier, Vehicle, VehicleIdentifier, bearing, lerp_coordinate,
};

/// Identifies one tween of one vehicle; superseded tweens keep stale tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TweenToken(u64);

#[derive(Clone, Debug)]
struct Track {
    from: Coordinate,
    to: Coordinate,
    rendered: Coordinate,
    started_at: Instant,
    heading: f64,
    token: TweenToken,
    color: RouteColor,
    route_id: Option<RouteIdentifier>,
    route_name: Option<String>,
}

/// A marker as it should be drawn on this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedVehicle {
    pub id: VehicleIdentifier,
    pub position: Coordinate,
    /// Degrees clockwise from north.
    pub heading: f64,
    pub color: RouteColor,
    pub route_id: Option<RouteIdentifier>,
    pub route_name: Option<String>,
}

#[derive(Debug)]
pub struct PositionInterpolator {
    duration: Duration,
    tracks: HashMap<VehicleIdentifier, Track>,
    next_token: u64,
}

impl PositionInterpolator {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            tracks: HashMap::new(),
            next_token: 0,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Starts a tween toward the vehicle's reported position.
    ///
    /// Returns `None` (and changes nothing) when the position is unknown.
    pub fn observe(&mut self, vehicle: &Vehicle, now: Instant) -> Option<TweenToken> {
        let target = vehicle.position()?;
        let token = self.issue_token();
        let duration = self.duration;

        match self.tracks.entry(vehicle.id.clone()) {
            Entry::Occupied(mut entry) => {
                let track = entry.get_mut();
                track.advance(now, duration);
                let start = track.rendered;

                track.heading = match vehicle.heading {
                    Some(reported) => reported,
                    None if start == target => track.heading,
                    None => bearing(start, target),
                };
                track.from = start;
                track.to = target;
                track.started_at = now;
                track.token = token;
                track.color = vehicle.display_color();
                track.route_id = vehicle.route_id.clone();
                track.route_name = vehicle.route_name.clone();
            }
            Entry::Vacant(entry) => {
                entry.insert(Track {
                    from: target,
                    to: target,
                    rendered: target,
                    started_at: now,
                    heading: vehicle.heading.unwrap_or(0.0),
                    token,
                    color: vehicle.display_color(),
                    route_id: vehicle.route_id.clone(),
                    route_name: vehicle.route_name.clone(),
                });
            }
        }

        Some(token)
    }

    /// Applies a whole poll result: observes every positioned vehicle and
    /// forgets every vehicle that is missing or lost its position.
    pub fn sync_fleet(&mut self, vehicles: &[Vehicle], now: Instant) -> usize {
        for vehicle in vehicles {
            self.observe(vehicle, now);
        }

        let before = self.tracks.len();
        self.tracks.retain(|id, _| {
            vehicles
                .iter()
                .any(|v| &v.id == id && v.position().is_some())
        });

        before - self.tracks.len()
    }

    /// Advances every tween to `now` and returns the markers, ordered by id.
    pub fn frame(&mut self, now: Instant) -> Vec<RenderedVehicle> {
        let duration = self.duration;

        let mut rendered: Vec<RenderedVehicle> = self
            .tracks
            .iter_mut()
            .map(|(id, track)| {
                track.advance(now, duration);
                RenderedVehicle {
                    id: id.clone(),
                    position: track.rendered,
                    heading: track.heading,
                    color: track.color,
                    route_id: track.route_id.clone(),
                    route_name: track.route_name.clone(),
                }
            })
            .collect();

        rendered.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        rendered
    }

    /// Whether any tween still has time left at `now`.
    pub fn is_animating(&self, now: Instant) -> bool {
        self.tracks
            .values()
            .any(|track| progress(track.started_at, now, self.duration) < 1.0)
    }

    /// The point last drawn for a vehicle.
    pub fn rendered(&self, id: &VehicleIdentifier) -> Option<Coordinate> {
        self.tracks.get(id).map(|track| track.rendered)
    }

    pub fn heading(&self, id: &VehicleIdentifier) -> Option<f64> {
        self.tracks.get(id).map(|track| track.heading)
    }

    pub fn is_current(&self, id: &VehicleIdentifier, token: TweenToken) -> bool {
        self.tracks.get(id).is_some_and(|track| track.token == token)
    }

    pub fn remove(&mut self, id: &VehicleIdentifier) -> bool {
        self.tracks.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    fn issue_token(&mut self) -> TweenToken {
        self.next_token += 1;
        TweenToken(self.next_token)
    }
}

impl Track {
    fn advance(&mut self, now: Instant, duration: Duration) {
        self.rendered = lerp_coordinate(self.from, self.to, progress(self.started_at, now, duration));
    }
}

fn progress(started_at: Instant, now: Instant, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }

    let elapsed = now.saturating_duration_since(started_at);
    (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
}
