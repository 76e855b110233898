use thiserror::Error;

use crate::geo::InvalidCoordinate;

use super::polyline::PolylineError;

/// A single endpoint attempt failed. Always recoverable: the provider retries,
/// switches endpoint or falls back to a synthetic path.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[cfg(feature = "http")]
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("routing endpoint returned status {0}")]
    Status(u16),
    #[error("malformed routing response: {0}")]
    Malformed(String),
    #[error("routing response contained no route")]
    NoRoute,
    #[error("invalid encoded polyline: {0}")]
    Polyline(#[from] PolylineError),
    #[error("routing response contained an invalid point: {0}")]
    InvalidPoint(#[from] InvalidCoordinate),
}

/// Hard failures of [`super::RouteProvider::fetch_route`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error(transparent)]
    InvalidCoordinate(#[from] InvalidCoordinate),
    #[error("no route after {attempts} endpoint attempts and synthetic fallback disabled")]
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutePathError {
    #[error("a route path needs at least 2 points, got {len}")]
    TooShort { len: usize },
    #[error(transparent)]
    InvalidPoint(#[from] InvalidCoordinate),
}
