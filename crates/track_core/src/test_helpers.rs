//! Test helpers shared by unit tests, integration tests and benches.
//!
//! Scripted routing endpoints, a sleeper that records instead of blocking, and
//! fake device services with configurable permission outcomes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::{
    Address, BackendError, LocationService, Notifier, Order, Permission, ServiceLine,
    ServiceProvider,
};
use crate::geo::Coordinate;
use crate::routing::backoff::Sleeper;
use crate::routing::error::{EndpointError, RoutingError};
use crate::routing::response::{
    EncodedPolylineRoute, EncodedRoute, GeoJsonFeature, GeoJsonGeometry, GeoJsonProperties,
    GeoJsonRoute, RouteResponse, RouteSummary,
};
use crate::routing::{FetchedRoute, RouteEndpoint, RoutePath, RouteProvider, RouteSource};

/// Provider location used across tests (Lahore, Gulberg).
pub const PROVIDER_LAT: f64 = 31.5127;
pub const PROVIDER_LNG: f64 = 74.3516;
/// Customer location used across tests, about 1.4 km from the provider.
pub const CUSTOMER_LAT: f64 = 31.5227;
pub const CUSTOMER_LNG: f64 = 74.3616;

/// # Panics
///
/// Panics if the constant is out of range (should never happen).
pub fn provider_location() -> Coordinate {
    Coordinate::new(PROVIDER_LAT, PROVIDER_LNG).expect("provider location is valid")
}

/// # Panics
///
/// Panics if the constant is out of range (should never happen).
pub fn customer_location() -> Coordinate {
    Coordinate::new(CUSTOMER_LAT, CUSTOMER_LNG).expect("customer location is valid")
}

/// An order with two service lines and an optional delivery coordinate.
pub fn sample_order(id: &str, status: &str, delivery: Option<Coordinate>) -> Order {
    Order {
        id: id.to_string(),
        status: status.to_string(),
        services: vec![
            ServiceLine {
                kind: "Wash & Fold".to_string(),
                quantity: 4,
                price: 120.0,
            },
            ServiceLine {
                kind: "Ironing".to_string(),
                quantity: 6,
                price: 40.0,
            },
        ],
        total_price: None,
        address: Some(Address {
            label: "House 12, Gulberg III".to_string(),
            coordinate: delivery,
        }),
        pickup_at: Some(1_700_000_000_000),
        dropoff_at: None,
        created_at: Some(1_699_990_000_000),
    }
}

pub fn sample_provider(id: &str, location: Coordinate) -> ServiceProvider {
    ServiceProvider {
        id: id.to_string(),
        name: "Sparkle Laundry".to_string(),
        rating: Some(4.7),
        location,
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// GeoJSON response from `(lat, lng)` pairs, with an optional summary distance
/// in metres.
pub fn geojson_response(points: &[(f64, f64)], distance_m: Option<f64>) -> RouteResponse {
    RouteResponse::GeoJson(GeoJsonRoute {
        features: vec![GeoJsonFeature {
            geometry: GeoJsonGeometry {
                coordinates: points.iter().map(|(lat, lng)| vec![*lng, *lat]).collect(),
            },
            properties: GeoJsonProperties {
                summary: RouteSummary {
                    distance: distance_m,
                    duration: None,
                },
            },
        }],
    })
}

pub fn polyline_response(geometry: &str, distance_m: Option<f64>) -> RouteResponse {
    RouteResponse::EncodedPolyline(EncodedPolylineRoute {
        routes: vec![EncodedRoute {
            geometry: geometry.to_string(),
            summary: RouteSummary {
                distance: distance_m,
                duration: None,
            },
        }],
    })
}

/// Endpoint that replays a fixed script of results, then answers 503.
pub struct ScriptedEndpoint {
    name: String,
    script: Mutex<VecDeque<Result<RouteResponse, EndpointError>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEndpoint {
    pub fn new(name: &str, script: Vec<Result<RouteResponse, EndpointError>>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Endpoint that fails every request.
    pub fn failing(name: &str) -> Self {
        Self::new(name, Vec::new())
    }

    /// Shared request counter, readable after the endpoint is boxed.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl RouteEndpoint for ScriptedEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn request(
        &self,
        _origin: Coordinate,
        _destination: Coordinate,
    ) -> Result<RouteResponse, EndpointError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(Err(EndpointError::Status(503)))
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Arc<Mutex<Vec<Duration>>> {
        Arc::clone(&self.delays)
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().expect("delays lock").push(duration);
    }
}

/// Route provider returning a straight two-point path with a fixed distance.
pub struct FixedRouteProvider {
    distance_km: f64,
    speed_kmh: f64,
    calls: Arc<AtomicUsize>,
}

impl FixedRouteProvider {
    pub fn new(distance_km: f64, speed_kmh: f64) -> Self {
        Self {
            distance_km,
            speed_kmh,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl RouteProvider for FixedRouteProvider {
    fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<FetchedRoute, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let origin = origin.validate()?;
        let destination = destination.validate()?;
        Ok(FetchedRoute {
            path: RoutePath::new(vec![origin, destination]).expect("two valid points"),
            distance_km: self.distance_km,
            duration_minutes: self.distance_km / self.speed_kmh * 60.0,
            traffic_multiplier: 1.0,
            source: RouteSource::Primary,
        })
    }
}

/// Route provider that always reports exhaustion.
#[derive(Default)]
pub struct ExhaustedRouteProvider;

impl RouteProvider for ExhaustedRouteProvider {
    fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<FetchedRoute, RoutingError> {
        origin.validate()?;
        destination.validate()?;
        Err(RoutingError::Exhausted { attempts: 4 })
    }
}

// ---------------------------------------------------------------------------
// Device services
// ---------------------------------------------------------------------------

pub struct FakeLocationService {
    permission: Permission,
    position: Result<Coordinate, BackendError>,
    label: Option<String>,
    position_requests: AtomicUsize,
}

impl FakeLocationService {
    pub fn granted(position: Coordinate) -> Self {
        Self {
            permission: Permission::Granted,
            position: Ok(position),
            label: None,
            position_requests: AtomicUsize::new(0),
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: Permission::Denied,
            position: Err(BackendError::PermissionDenied("location".to_string())),
            label: None,
            position_requests: AtomicUsize::new(0),
        }
    }

    /// Permission granted, but the position fetch never completes in time.
    pub fn timing_out() -> Self {
        Self {
            permission: Permission::Granted,
            position: Err(BackendError::Timeout(Duration::from_secs(15))),
            label: None,
            position_requests: AtomicUsize::new(0),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn position_requests(&self) -> usize {
        self.position_requests.load(Ordering::SeqCst)
    }
}

impl LocationService for FakeLocationService {
    fn request_foreground_permission(&self) -> Permission {
        self.permission
    }

    fn current_position(&self, _timeout: Duration) -> Result<Coordinate, BackendError> {
        self.position_requests.fetch_add(1, Ordering::SeqCst);
        self.position.clone()
    }

    fn reverse_geocode(&self, _coordinate: Coordinate) -> Result<Option<String>, BackendError> {
        Ok(self.label.clone())
    }
}

/// Notifier that records every notification it is asked to show.
pub struct RecordingNotifier {
    permission: Permission,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn granted() -> Self {
        Self {
            permission: Permission::Granted,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: Permission::Denied,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// `(title, body)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn request_permission(&self) -> Permission {
        self.permission
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), BackendError> {
        if !self.permission.is_granted() {
            return Err(BackendError::PermissionDenied("notifications".to_string()));
        }
        self.sent
            .lock()
            .expect("sent lock")
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}
