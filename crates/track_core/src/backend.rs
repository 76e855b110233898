//! External collaborators of a tracking session.
//!
//! The document store, the provider directory, the live order feed, device
//! location and notifications are all traits here, so a session only ever sees
//! what the [`crate::context::AppContext`] hands it. [`memory::MemoryBackend`]
//! implements the store-side traits in process.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::Coordinate;

pub mod memory;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{collection} document {id} not found")]
    NotFound { collection: &'static str, id: String },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub kind: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub label: String,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

/// Order document as stored by the backend. Timestamps are epoch millis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub services: Vec<ServiceLine>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub pickup_at: Option<u64>,
    #[serde(default)]
    pub dropoff_at: Option<u64>,
    #[serde(default)]
    pub created_at: Option<u64>,
}

impl Order {
    /// Sum of `quantity * price` over the service lines.
    pub fn computed_total(&self) -> f64 {
        self.services
            .iter()
            .map(|line| f64::from(line.quantity) * line.price)
            .sum()
    }

    /// Stored total, or the computed one when the document has none.
    pub fn display_total(&self) -> f64 {
        self.total_price.unwrap_or_else(|| self.computed_total())
    }

    /// Delivery coordinate from the address, if present and valid.
    pub fn address_coordinate(&self) -> Option<Coordinate> {
        self.address
            .as_ref()
            .and_then(|address| address.coordinate)
            .and_then(|coordinate| coordinate.validate().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceProvider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rating: Option<f64>,
    /// Unvalidated; documents can carry garbage.
    pub location: Coordinate,
}

pub trait OrderStore: Send + Sync {
    fn get_order(&self, order_id: &str) -> Result<Order, BackendError>;

    fn update_status(&self, order_id: &str, status: &str) -> Result<(), BackendError>;
}

pub trait ProviderDirectory: Send + Sync {
    fn get_provider(&self, provider_id: &str) -> Result<ServiceProvider, BackendError>;
}

/// Callback invoked with the full order document on every change.
pub type StatusHandler = Box<dyn FnMut(Order) + Send>;

/// Live subscription to order changes.
pub trait OrderFeed: Send + Sync {
    fn on_update(
        &self,
        order_id: &str,
        handler: StatusHandler,
    ) -> Result<Unsubscribe, BackendError>;
}

/// Handle returned by [`OrderFeed::on_update`]. Calling [`Unsubscribe::unsubscribe`]
/// more than once is a no-op; dropping the handle unsubscribes too.
pub struct Unsubscribe {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Unsubscribe {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

impl Permission {
    pub fn is_granted(self) -> bool {
        self == Permission::Granted
    }
}

pub trait LocationService: Send + Sync {
    fn request_foreground_permission(&self) -> Permission;

    fn current_position(&self, timeout: Duration) -> Result<Coordinate, BackendError>;

    /// Human-readable label for a coordinate, if the geocoder knows one.
    fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Option<String>, BackendError>;
}

pub trait Notifier: Send + Sync {
    fn request_permission(&self) -> Permission;

    fn notify(&self, title: &str, body: &str) -> Result<(), BackendError>;
}
