//! Tracking configuration: constants of the simulation and routing strategy.
//!
//! Every field has a default matching the production app, so a JSON file only
//! needs to name what it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{Coordinate, InvalidCoordinate};
use crate::routing::backoff::RetryPolicy;
use crate::routing::fallback::FallbackParams;
use crate::routing::RouteProviderKind;
use crate::speed::{TrafficRanges, DEFAULT_SPEED_KMH};

/// Fallback customer location when neither the order nor the device provides
/// one (Lahore city centre, where the service launched).
const DEFAULT_FALLBACK_LAT: f64 = 31.5204;
const DEFAULT_FALLBACK_LNG: f64 = 74.3587;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid fallback customer location: {0}")]
    FallbackLocation(#[from] InvalidCoordinate),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingParams {
    /// Constant travel speed of the simulated vehicle.
    pub speed_kmh: f64,
    /// Period of the position-advance timer.
    pub tick_interval_ms: u64,
    /// Period of the ETA label refresh timer.
    pub eta_refresh_interval_ms: u64,
    /// Period of the marker animation timer.
    pub marker_frame_interval_ms: u64,
    /// Remaining distance at which the vehicle counts as arrived.
    pub arrival_threshold_km: f64,
    /// Bound on a single device position fetch.
    pub location_timeout_ms: u64,
    pub route_request_timeout_ms: u64,
    pub route_cache_capacity: usize,
    pub retry: RetryPolicy,
    pub fallback: FallbackParams,
    pub traffic: TrafficRanges,
    pub fallback_customer_location: Coordinate,
    pub route_provider: RouteProviderKind,
    /// RNG seed for traffic multipliers and synthetic jitter.
    pub seed: Option<u64>,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            tick_interval_ms: 5_000,
            eta_refresh_interval_ms: 15_000,
            marker_frame_interval_ms: 1_000,
            arrival_threshold_km: 0.05,
            location_timeout_ms: 15_000,
            route_request_timeout_ms: 10_000,
            route_cache_capacity: 256,
            retry: RetryPolicy::default(),
            fallback: FallbackParams::default(),
            traffic: TrafficRanges::default(),
            fallback_customer_location: Coordinate::new_unchecked(
                DEFAULT_FALLBACK_LAT,
                DEFAULT_FALLBACK_LNG,
            ),
            route_provider: RouteProviderKind::default(),
            seed: None,
        }
    }
}

impl TrackingParams {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        self.fallback_customer_location.validate()?;
        if !(self.speed_kmh.is_finite() && self.speed_kmh > 0.0) {
            return Err(ConfigError::Invalid {
                field: "speed_kmh",
                reason: format!("must be positive, got {}", self.speed_kmh),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.eta_refresh_interval_ms == 0 || self.marker_frame_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "timer interval",
                reason: "must be non-zero".to_string(),
            });
        }
        if !(self.arrival_threshold_km.is_finite() && self.arrival_threshold_km >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "arrival_threshold_km",
                reason: format!("must be non-negative, got {}", self.arrival_threshold_km),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_speed_kmh(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = speed_kmh;
        self
    }

    pub fn with_tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    pub fn with_route_provider(mut self, kind: RouteProviderKind) -> Self {
        self.route_provider = kind;
        self
    }

    pub fn with_fallback_customer_location(mut self, location: Coordinate) -> Self {
        self.fallback_customer_location = location;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tracking_constants() {
        let params = TrackingParams::default();
        assert_eq!(params.speed_kmh, 40.0);
        assert_eq!(params.tick_interval_ms, 5_000);
        assert_eq!(params.arrival_threshold_km, 0.05);
        assert_eq!(params.retry.max_attempts, 3);
        assert_eq!(params.retry.base_delay_ms, 2_000);
        assert_eq!(params.fallback.intermediate_points, 8);
        assert_eq!(params.route_provider, RouteProviderKind::Synthetic);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let params = TrackingParams::from_json_str(r#"{"speed_kmh": 30.0, "seed": 5}"#)
            .expect("params");
        assert_eq!(params.speed_kmh, 30.0);
        assert_eq!(params.seed, Some(5));
        assert_eq!(params.tick_interval_ms, 5_000);
    }

    #[test]
    fn rejects_invalid_fallback_location() {
        let err = TrackingParams::from_json_str(
            r#"{"fallback_customer_location": {"latitude": 91.0, "longitude": 0.0}}"#,
        )
        .expect_err("latitude out of range");
        assert!(matches!(err, ConfigError::FallbackLocation(_)));
    }

    #[test]
    fn rejects_zero_speed_and_zero_tick() {
        assert!(matches!(
            TrackingParams::from_json_str(r#"{"speed_kmh": 0.0}"#),
            Err(ConfigError::Invalid { field: "speed_kmh", .. })
        ));
        assert!(matches!(
            TrackingParams::from_json_str(r#"{"tick_interval_ms": 0}"#),
            Err(ConfigError::Invalid { field: "tick_interval_ms", .. })
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            TrackingParams::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
    }
}
