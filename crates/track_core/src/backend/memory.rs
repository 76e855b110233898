//! In-process backend: order store, provider directory and live feed.
//!
//! Subscribers receive the current document as soon as they subscribe and then
//! every time `update_status` or `put_order` changes it. Handlers run on the
//! writer's thread while the backend lock is held, so they must not call back
//! into the backend (the session's handler only enqueues).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::{
    BackendError, Order, OrderFeed, OrderStore, ProviderDirectory, ServiceProvider, StatusHandler,
    Unsubscribe,
};

struct Subscriber {
    order_id: String,
    handler: StatusHandler,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<String, Order>,
    providers: HashMap<String, ServiceProvider>,
    subscribers: HashMap<u64, Subscriber>,
    next_subscriber: u64,
    read_failure: Option<BackendError>,
    write_failure: Option<BackendError>,
}

impl Inner {
    fn notify(&mut self, order_id: &str) {
        let Some(order) = self.orders.get(order_id) else {
            return;
        };
        for subscriber in self.subscribers.values_mut() {
            if subscriber.order_id == order_id {
                (subscriber.handler)(order.clone());
            }
        }
    }
}

/// Cloning shares the same underlying data.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an order and notify its subscribers.
    pub fn put_order(&self, order: Order) {
        let mut inner = lock(&self.inner);
        let id = order.id.clone();
        inner.orders.insert(id.clone(), order);
        inner.notify(&id);
    }

    pub fn put_provider(&self, provider: ServiceProvider) {
        lock(&self.inner)
            .providers
            .insert(provider.id.clone(), provider);
    }

    pub fn with_order(self, order: Order) -> Self {
        self.put_order(order);
        self
    }

    pub fn with_provider(self, provider: ServiceProvider) -> Self {
        self.put_provider(provider);
        self
    }

    /// Make every subsequent read fail with `error` (`None` clears it).
    pub fn set_read_failure(&self, error: Option<BackendError>) {
        lock(&self.inner).read_failure = error;
    }

    /// Make every subsequent write fail with `error` (`None` clears it).
    pub fn set_write_failure(&self, error: Option<BackendError>) {
        lock(&self.inner).write_failure = error;
    }

    /// Live subscriptions for `order_id`.
    pub fn subscriber_count(&self, order_id: &str) -> usize {
        lock(&self.inner)
            .subscribers
            .values()
            .filter(|subscriber| subscriber.order_id == order_id)
            .count()
    }

    pub fn order(&self, order_id: &str) -> Option<Order> {
        lock(&self.inner).orders.get(order_id).cloned()
    }
}

impl OrderStore for MemoryBackend {
    fn get_order(&self, order_id: &str) -> Result<Order, BackendError> {
        let inner = lock(&self.inner);
        if let Some(err) = &inner.read_failure {
            return Err(err.clone());
        }
        inner
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                collection: "orders",
                id: order_id.to_string(),
            })
    }

    fn update_status(&self, order_id: &str, status: &str) -> Result<(), BackendError> {
        let mut inner = lock(&self.inner);
        if let Some(err) = &inner.write_failure {
            return Err(err.clone());
        }
        let order = inner
            .orders
            .get_mut(order_id)
            .ok_or_else(|| BackendError::NotFound {
                collection: "orders",
                id: order_id.to_string(),
            })?;
        order.status = status.to_string();
        debug!(order_id, status, "order status written");
        inner.notify(order_id);
        Ok(())
    }
}

impl ProviderDirectory for MemoryBackend {
    fn get_provider(&self, provider_id: &str) -> Result<ServiceProvider, BackendError> {
        let inner = lock(&self.inner);
        if let Some(err) = &inner.read_failure {
            return Err(err.clone());
        }
        inner
            .providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                collection: "providers",
                id: provider_id.to_string(),
            })
    }
}

impl OrderFeed for MemoryBackend {
    fn on_update(
        &self,
        order_id: &str,
        handler: StatusHandler,
    ) -> Result<Unsubscribe, BackendError> {
        let id = {
            let mut inner = lock(&self.inner);
            if let Some(err) = &inner.read_failure {
                return Err(err.clone());
            }
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.insert(
                id,
                Subscriber {
                    order_id: order_id.to_string(),
                    handler,
                },
            );
            // Initial snapshot, like a document listener.
            if let Some(order) = inner.orders.get(order_id).cloned() {
                if let Some(subscriber) = inner.subscribers.get_mut(&id) {
                    (subscriber.handler)(order);
                }
            }
            id
        };
        debug!(order_id, subscriber = id, "order feed subscribed");

        let inner = Arc::clone(&self.inner);
        Ok(Unsubscribe::new(move || {
            lock(&inner).subscribers.remove(&id);
            debug!(subscriber = id, "order feed unsubscribed");
        }))
    }
}
