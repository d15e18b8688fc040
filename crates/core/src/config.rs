use std::time::Duration;

use ridewatch_transit::WalkPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{LiveError, Result};

/// Tunables for one live map session.
///
/// Every field has a default, so a host can deserialize a partial document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Root of the planning/telemetry service, e.g. `http://localhost:8000`.
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub vehicle_poll_ms: u64,
    pub trip_refresh_ms: u64,
    /// How long a marker takes to glide to a newly reported position.
    pub tween_ms: u64,
    pub frame_ms: u64,
    /// Screen padding, in pixels, around any fitted region.
    pub fit_padding_px: u32,
    pub show_routes: bool,
    pub walk_policy: WalkPolicy,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 10_000,
            vehicle_poll_ms: 3_000,
            trip_refresh_ms: 8_000,
            tween_ms: 1_200,
            frame_ms: 16,
            fit_padding_px: 48,
            show_routes: false,
            walk_policy: WalkPolicy::default(),
        }
    }
}

impl LiveConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would spin or stall the cycles.
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("vehicle_poll_ms", self.vehicle_poll_ms),
            ("trip_refresh_ms", self.trip_refresh_ms),
            ("frame_ms", self.frame_ms),
            ("request_timeout_ms", self.request_timeout_ms),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, ms)| *ms == 0) {
            return Err(LiveError::InvalidConfig(format!("{name} must be greater than zero")));
        }

        let walk = &self.walk_policy;
        if !(walk.min_m >= 0.0 && walk.min_m <= walk.max_m) {
            return Err(LiveError::InvalidConfig(format!(
                "walk policy needs 0 <= min_m <= max_m, got {}..{}",
                walk.min_m, walk.max_m
            )));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn vehicle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.vehicle_poll_ms)
    }

    pub fn trip_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.trip_refresh_ms)
    }

    pub fn tween_duration(&self) -> Duration {
        Duration::from_millis(self.tween_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}
