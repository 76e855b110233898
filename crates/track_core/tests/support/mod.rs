#![allow(dead_code)]

use std::sync::Arc;

use track_core::backend::memory::MemoryBackend;
use track_core::context::AppContext;
use track_core::geo::Coordinate;
use track_core::params::TrackingParams;
use track_core::routing::RouteProvider;
use track_core::test_helpers::{
    customer_location, provider_location, sample_order, sample_provider, FakeLocationService,
    FixedRouteProvider, RecordingNotifier,
};

pub const ORDER_ID: &str = "order-1";
pub const PROVIDER_ID: &str = "provider-1";

/// Shared handles a test keeps after building the context.
pub struct Harness {
    pub backend: MemoryBackend,
    pub location: Arc<FakeLocationService>,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: AppContext,
}

/// Builder for a tracking context backed by in-memory collaborators.
///
/// Defaults: a pending order without a delivery coordinate, a provider in
/// Lahore, granted permissions with the device at the customer location, and a
/// fixed 1.5 km route.
pub struct HarnessBuilder {
    status: String,
    delivery: Option<Coordinate>,
    provider_location: Coordinate,
    location: FakeLocationService,
    notifier: RecordingNotifier,
    routes: Option<Arc<dyn RouteProvider>>,
    params: TrackingParams,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            status: "Order Placed".to_string(),
            delivery: None,
            provider_location: provider_location(),
            location: FakeLocationService::granted(customer_location()),
            notifier: RecordingNotifier::granted(),
            routes: Some(Arc::new(FixedRouteProvider::new(1.5, 40.0))),
            params: TrackingParams::default().with_seed(7),
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn with_delivery(mut self, delivery: Coordinate) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn with_provider_location(mut self, location: Coordinate) -> Self {
        self.provider_location = location;
        self
    }

    pub fn with_location(mut self, location: FakeLocationService) -> Self {
        self.location = location;
        self
    }

    pub fn with_notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_routes(mut self, routes: Arc<dyn RouteProvider>) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Use the provider built from `params.route_provider`.
    pub fn with_configured_routes(mut self) -> Self {
        self.routes = None;
        self
    }

    pub fn with_params(mut self, params: TrackingParams) -> Self {
        self.params = params;
        self
    }

    pub fn build(self) -> Harness {
        let backend = MemoryBackend::new()
            .with_order(sample_order(ORDER_ID, &self.status, self.delivery))
            .with_provider(sample_provider(PROVIDER_ID, self.provider_location));
        let location = Arc::new(self.location);
        let notifier = Arc::new(self.notifier);
        let mut ctx = AppContext::with_memory_backend(
            backend.clone(),
            location.clone(),
            notifier.clone(),
            self.params,
        );
        if let Some(routes) = self.routes {
            ctx = ctx.with_routes(routes);
        }
        Harness {
            backend,
            location,
            notifier,
            ctx,
        }
    }
}

/// A coordinate that skipped validation, as a malformed document would carry.
pub fn unchecked_coordinate(latitude: f64, longitude: f64) -> Coordinate {
    serde_json::from_value(serde_json::json!({
        "latitude": latitude,
        "longitude": longitude,
    }))
    .expect("coordinate json")
}
