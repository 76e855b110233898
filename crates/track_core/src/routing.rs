//! Route acquisition: trait abstraction over routing backends.
//!
//! Three providers, selectable via [`RouteProviderKind`]:
//!
//! - **`SyntheticRouteProvider`**: straight-line path with a sine-weighted wobble.
//!   Zero network; also the last resort of the resilient provider.
//! - **`ResilientRouteProvider`**: primary endpoint with exponential backoff, one
//!   alternate endpoint attempt, then the synthetic path.
//! - **`CachedRouteProvider`**: LRU wrapper keyed by the H3 cells of origin and
//!   destination.
//!
//! Endpoint failures never reach the caller. The only errors are invalid input
//! coordinates and, when the synthetic fallback is disabled, exhaustion.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use h3o::{CellIndex, LatLng, Resolution};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::geo::{path_length_km, Coordinate};
use crate::params::TrackingParams;
use crate::speed::{travel_minutes, MultiplierRange, TrafficModel, TrafficRanges};

pub mod backoff;
pub mod error;
pub mod fallback;
#[cfg(feature = "http")]
pub mod http;
pub mod polyline;
pub mod response;


use backoff::{RetryPolicy, Sleeper, ThreadSleeper};
use error::{EndpointError, RoutePathError, RoutingError};
use fallback::{synthetic_route, FallbackParams};
use response::{DecodedRoute, RouteResponse};

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Ordered travel path from origin to destination; at least two points.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePath {
    points: Vec<Coordinate>,
}

impl RoutePath {
    pub fn new(points: Vec<Coordinate>) -> Result<Self, RoutePathError> {
        if points.len() < 2 {
            return Err(RoutePathError::TooShort { len: points.len() });
        }
        for point in &points {
            point.validate()?;
        }
        Ok(Self { points })
    }

    /// Callers guarantee `points.len() >= 2` and valid coordinates.
    pub(crate) fn from_valid_points(points: Vec<Coordinate>) -> Self {
        debug_assert!(points.len() >= 2, "route path needs two points");
        Self { points }
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Coordinate {
        self.points[0]
    }

    pub fn last(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    pub fn length_km(&self) -> f64 {
        path_length_km(&self.points)
    }
}

/// Where a fetched route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteSource {
    Primary,
    Alternate,
    Synthetic,
    Cached,
}

/// A resolved route with its distance and duration estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRoute {
    pub path: RoutePath,
    pub distance_km: f64,
    pub duration_minutes: f64,
    /// Traffic multiplier applied to `duration_minutes` (1.0 for synthetic paths).
    pub traffic_multiplier: f64,
    pub source: RouteSource,
}

/// Which routing backend to use.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum RouteProviderKind {
    /// Synthetic paths only, no network.
    #[default]
    Synthetic,
    /// Directions API: GeoJSON primary endpoint plus an optional encoded-polyline
    /// alternate.
    #[cfg(feature = "http")]
    Http {
        primary_url: String,
        alternate_url: Option<String>,
        api_key: String,
    },
}

/// Trait for routing backends. `Send + Sync` so a provider can be shared by
/// every tracking session through the application context.
pub trait RouteProvider: Send + Sync {
    fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<FetchedRoute, RoutingError>;
}

/// One routing endpoint variant. A returned error is one failed attempt.
pub trait RouteEndpoint: Send + Sync {
    fn name(&self) -> &str;

    fn request(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteResponse, EndpointError>;
}

fn lock_traffic(traffic: &Mutex<TrafficModel>) -> MutexGuard<'_, TrafficModel> {
    // The model holds no invariant a panic could break.
    traffic.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn synthetic_fetched(
    origin: Coordinate,
    destination: Coordinate,
    fallback: &FallbackParams,
    speed_kmh: f64,
    traffic: &Mutex<TrafficModel>,
) -> FetchedRoute {
    let route = synthetic_route(origin, destination, fallback, &mut lock_traffic(traffic));
    FetchedRoute {
        duration_minutes: travel_minutes(route.distance_km, speed_kmh, 1.0),
        distance_km: route.distance_km,
        path: route.path,
        traffic_multiplier: 1.0,
        source: RouteSource::Synthetic,
    }
}

// ---------------------------------------------------------------------------
// Synthetic provider (always available)
// ---------------------------------------------------------------------------

pub struct SyntheticRouteProvider {
    fallback: FallbackParams,
    speed_kmh: f64,
    traffic: Mutex<TrafficModel>,
}

impl SyntheticRouteProvider {
    pub fn new(params: &TrackingParams) -> Self {
        Self {
            fallback: params.fallback,
            speed_kmh: params.speed_kmh,
            traffic: Mutex::new(TrafficModel::new(params.seed)),
        }
    }
}

impl RouteProvider for SyntheticRouteProvider {
    fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<FetchedRoute, RoutingError> {
        let origin = origin.validate()?;
        let destination = destination.validate()?;
        Ok(synthetic_fetched(
            origin,
            destination,
            &self.fallback,
            self.speed_kmh,
            &self.traffic,
        ))
    }
}

// ---------------------------------------------------------------------------
// Resilient provider: retry, alternate, synthetic
// ---------------------------------------------------------------------------

pub struct ResilientRouteProvider {
    primary: Box<dyn RouteEndpoint>,
    alternate: Option<Box<dyn RouteEndpoint>>,
    retry: RetryPolicy,
    fallback: FallbackParams,
    traffic_ranges: TrafficRanges,
    speed_kmh: f64,
    sleeper: Box<dyn Sleeper>,
    traffic: Mutex<TrafficModel>,
}

impl ResilientRouteProvider {
    pub fn new(primary: Box<dyn RouteEndpoint>, params: &TrackingParams) -> Self {
        Self {
            primary,
            alternate: None,
            retry: params.retry,
            fallback: params.fallback,
            traffic_ranges: params.traffic,
            speed_kmh: params.speed_kmh,
            sleeper: Box::new(ThreadSleeper),
            traffic: Mutex::new(TrafficModel::new(params.seed)),
        }
    }

    pub fn with_alternate(mut self, alternate: Box<dyn RouteEndpoint>) -> Self {
        self.alternate = Some(alternate);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn attempt(
        endpoint: &dyn RouteEndpoint,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<DecodedRoute, EndpointError> {
        endpoint.request(origin, destination)?.decode()
    }

    fn finish(
        &self,
        decoded: DecodedRoute,
        source: RouteSource,
        range: MultiplierRange,
    ) -> FetchedRoute {
        let distance_km = decoded
            .distance_km
            .unwrap_or_else(|| decoded.path.length_km());
        let traffic_multiplier = lock_traffic(&self.traffic).sample_multiplier(range);
        FetchedRoute {
            duration_minutes: travel_minutes(distance_km, self.speed_kmh, traffic_multiplier),
            distance_km,
            path: decoded.path,
            traffic_multiplier,
            source,
        }
    }
}

impl RouteProvider for ResilientRouteProvider {
    fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<FetchedRoute, RoutingError> {
        let origin = origin.validate()?;
        let destination = destination.validate()?;
        let mut attempts = 0u32;

        for attempt in 1..=self.retry.max_attempts {
            attempts += 1;
            match Self::attempt(self.primary.as_ref(), origin, destination) {
                Ok(decoded) => {
                    info!(endpoint = self.primary.name(), attempt, "route acquired");
                    return Ok(self.finish(
                        decoded,
                        RouteSource::Primary,
                        self.traffic_ranges.primary,
                    ));
                }
                Err(err) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        endpoint = self.primary.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "routing attempt failed"
                    );
                    self.sleeper.sleep(delay);
                }
            }
        }

        if let Some(alternate) = &self.alternate {
            attempts += 1;
            match Self::attempt(alternate.as_ref(), origin, destination) {
                Ok(decoded) => {
                    info!(endpoint = alternate.name(), "route acquired from alternate endpoint");
                    return Ok(self.finish(
                        decoded,
                        RouteSource::Alternate,
                        self.traffic_ranges.alternate,
                    ));
                }
                Err(err) => {
                    warn!(
                        endpoint = alternate.name(),
                        error = %err,
                        "alternate routing endpoint failed"
                    );
                }
            }
        }

        if !self.fallback.enabled {
            return Err(RoutingError::Exhausted { attempts });
        }

        warn!(attempts, "routing endpoints exhausted, using synthetic path");
        Ok(synthetic_fetched(
            origin,
            destination,
            &self.fallback,
            self.speed_kmh,
            &self.traffic,
        ))
    }
}

// ---------------------------------------------------------------------------
// Caching wrapper
// ---------------------------------------------------------------------------

/// Cell resolution for cache keys (~9 m edge length).
const CACHE_KEY_RESOLUTION: Resolution = Resolution::Twelve;

fn cache_cell(point: Coordinate) -> Option<CellIndex> {
    LatLng::new(point.latitude(), point.longitude())
        .ok()
        .map(|ll| ll.to_cell(CACHE_KEY_RESOLUTION))
}

/// LRU-cached wrapper around any [`RouteProvider`].
///
/// Key is `(origin_cell, destination_cell)` (directional). Only endpoint routes
/// are cached; synthetic paths are not, so the next fetch tries the network again.
pub struct CachedRouteProvider {
    inner: Box<dyn RouteProvider>,
    cache: Mutex<LruCache<(CellIndex, CellIndex), FetchedRoute>>,
}

impl CachedRouteProvider {
    pub fn new(inner: Box<dyn RouteProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteProvider for CachedRouteProvider {
    fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<FetchedRoute, RoutingError> {
        let origin = origin.validate()?;
        let destination = destination.validate()?;
        let key = cache_cell(origin).zip(cache_cell(destination));

        if let Some(key) = key {
            if let Ok(mut cache) = self.cache.lock() {
                if let Some(hit) = cache.get(&key) {
                    debug!("route cache hit");
                    let mut route = hit.clone();
                    route.source = RouteSource::Cached;
                    return Ok(route);
                }
            }
        }

        let route = self.inner.fetch_route(origin, destination)?;

        if let Some(key) = key {
            let cacheable = matches!(route.source, RouteSource::Primary | RouteSource::Alternate);
            if cacheable {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.put(key, route.clone());
                }
            }
        }

        Ok(route)
    }
}

// ---------------------------------------------------------------------------
// Factory: build a provider from RouteProviderKind
// ---------------------------------------------------------------------------

/// Construct a boxed [`RouteProvider`] from `params.route_provider`.
///
/// HTTP providers are wrapped in a [`CachedRouteProvider`]. If the HTTP client
/// cannot be built, the synthetic provider is returned instead.
pub fn build_route_provider(params: &TrackingParams) -> Box<dyn RouteProvider> {
    match &params.route_provider {
        RouteProviderKind::Synthetic => Box::new(SyntheticRouteProvider::new(params)),

        #[cfg(feature = "http")]
        RouteProviderKind::Http {
            primary_url,
            alternate_url,
            api_key,
        } => match build_http_provider(params, primary_url, alternate_url.as_deref(), api_key) {
            Ok(provider) => Box::new(CachedRouteProvider::new(
                Box::new(provider),
                params.route_cache_capacity,
            )),
            Err(err) => {
                warn!(error = %err, "failed to build HTTP routing client, using synthetic routes");
                Box::new(SyntheticRouteProvider::new(params))
            }
        },
    }
}

#[cfg(feature = "http")]
fn build_http_provider(
    params: &TrackingParams,
    primary_url: &str,
    alternate_url: Option<&str>,
    api_key: &str,
) -> Result<ResilientRouteProvider, EndpointError> {
    use self::http::{HttpRouteEndpoint, ResponseFormat};
    use std::time::Duration;

    let timeout = Duration::from_millis(params.route_request_timeout_ms);
    let primary = HttpRouteEndpoint::with_timeout(
        "primary",
        primary_url,
        api_key,
        ResponseFormat::GeoJson,
        timeout,
    )?;
    let mut provider = ResilientRouteProvider::new(Box::new(primary), params);
    if let Some(url) = alternate_url {
        let alternate = HttpRouteEndpoint::with_timeout(
            "alternate",
            url,
            api_key,
            ResponseFormat::EncodedPolyline,
            timeout,
        )?;
        provider = provider.with_alternate(Box::new(alternate));
    }
    Ok(provider)
}
