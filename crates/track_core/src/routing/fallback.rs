//! Synthetic route generation for when no routing endpoint answers.
//!
//! The path follows the straight line between origin and destination with a
//! sine-weighted sideways wobble (zero at both ends, peaking at the midpoint)
//! so the marker does not glide along a ruler-straight line. The reported
//! distance inflates the great-circle distance by a fixed detour factor.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, Coordinate};
use crate::speed::TrafficModel;

use super::RoutePath;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackParams {
    /// When false, exhausting every endpoint is a hard routing failure.
    pub enabled: bool,
    pub intermediate_points: usize,
    /// Maximum sideways offset in degrees, reached at the path midpoint.
    pub max_offset_deg: f64,
    /// Road-network detour relative to the great-circle distance.
    pub detour_factor: f64,
}

impl Default for FallbackParams {
    fn default() -> Self {
        Self {
            enabled: true,
            intermediate_points: 8,
            max_offset_deg: 0.0015,
            detour_factor: 1.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRoute {
    pub path: RoutePath,
    pub distance_km: f64,
}

/// Build a synthetic path from `origin` to `destination`.
pub fn synthetic_route(
    origin: Coordinate,
    destination: Coordinate,
    params: &FallbackParams,
    traffic: &mut TrafficModel,
) -> SyntheticRoute {
    let d_lat = destination.latitude() - origin.latitude();
    let d_lng = destination.longitude() - origin.longitude();
    let norm = (d_lat * d_lat + d_lng * d_lng).sqrt();
    // Unit normal to the travel direction; coincident endpoints get no wobble.
    let (n_lat, n_lng) = if norm > 0.0 {
        (-d_lng / norm, d_lat / norm)
    } else {
        (0.0, 0.0)
    };

    let segments = params.intermediate_points + 1;
    let mut points = Vec::with_capacity(params.intermediate_points + 2);
    points.push(origin);
    for i in 1..=params.intermediate_points {
        let t = i as f64 / segments as f64;
        let base = origin.lerp(destination, t);
        let offset = (PI * t).sin() * params.max_offset_deg * traffic.sample_signed_unit();
        points.push(base.offset_clamped(n_lat * offset, n_lng * offset));
    }
    points.push(destination);

    SyntheticRoute {
        path: RoutePath::from_valid_points(points),
        distance_km: haversine_km(origin, destination) * params.detour_factor,
    }
}

/// Perpendicular distance (in degrees) from `point` to the line through `a` and `b`.
pub fn lateral_deviation_deg(point: Coordinate, a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = b.latitude() - a.latitude();
    let d_lng = b.longitude() - a.longitude();
    let norm = (d_lat * d_lat + d_lng * d_lng).sqrt();
    let p_lat = point.latitude() - a.latitude();
    let p_lng = point.longitude() - a.longitude();
    if norm == 0.0 {
        return (p_lat * p_lat + p_lng * p_lng).sqrt();
    }
    (p_lat * d_lng - p_lng * d_lat).abs() / norm
}
