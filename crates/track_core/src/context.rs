//! Explicitly constructed bundle of collaborators shared by tracking sessions.

use std::sync::Arc;

use crate::backend::memory::MemoryBackend;
use crate::backend::{LocationService, Notifier, OrderFeed, OrderStore, ProviderDirectory};
use crate::params::TrackingParams;
use crate::routing::{build_route_provider, RouteProvider};

#[derive(Clone)]
pub struct AppContext {
    pub orders: Arc<dyn OrderStore>,
    pub providers: Arc<dyn ProviderDirectory>,
    pub feed: Arc<dyn OrderFeed>,
    pub location: Arc<dyn LocationService>,
    pub notifier: Arc<dyn Notifier>,
    pub routes: Arc<dyn RouteProvider>,
    pub params: TrackingParams,
}

impl AppContext {
    /// Wire every store-side collaborator to one in-memory backend and build
    /// the route provider from `params.route_provider`.
    pub fn with_memory_backend(
        backend: MemoryBackend,
        location: Arc<dyn LocationService>,
        notifier: Arc<dyn Notifier>,
        params: TrackingParams,
    ) -> Self {
        let backend = Arc::new(backend);
        Self {
            orders: backend.clone(),
            providers: backend.clone(),
            feed: backend,
            location,
            notifier,
            routes: Arc::from(build_route_provider(&params)),
            params,
        }
    }

    pub fn with_routes(mut self, routes: Arc<dyn RouteProvider>) -> Self {
        self.routes = routes;
        self
    }
}
