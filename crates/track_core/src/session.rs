//! Tracking screen controller.
//!
//! Mounting resolves everything the screen needs (notification permission,
//! order, provider, customer coordinate, route), starts the position simulator
//! and subscribes to the order feed. After that, all work happens inside
//! [`TrackingSession::run_until`], which fires due timers and applies feed
//! updates one at a time on the session clock.
//!
//! Teardown is the invariant that matters most: after [`TrackingSession::unmount`]
//! (or drop) the clock has no live timers and the feed has no subscriber for
//! this session.

use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{Order, ServiceProvider, Unsubscribe};
use crate::clock::{Fired, TimerId, TimerKind, TrackingClock};
use crate::context::AppContext;
use crate::error::{TrackingError, UserAlert};
use crate::geo::Coordinate;
use crate::routing::FetchedRoute;
use crate::simulator::{Arrival, PositionSimulator, SimulationState, SimulatorPhase};
use crate::status::{OrderStatus, OrderStatusMachine, TimelineView};

pub const ARRIVAL_TITLE: &str = "Order Arrived";
pub const ARRIVAL_BODY: &str = "Your laundry has arrived at your doorstep.";

/// Where the customer coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationSource {
    Device,
    OrderAddress,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerLocation {
    pub coordinate: Coordinate,
    pub source: LocationSource,
    pub label: Option<String>,
}

/// Linear marker movement from the previous simulated position to the current
/// one, spread over one tick interval.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MarkerAnimation {
    from: Coordinate,
    to: Coordinate,
    started_ms: u64,
    duration_ms: u64,
}

impl MarkerAnimation {
    fn still(position: Coordinate, now_ms: u64) -> Self {
        Self {
            from: position,
            to: position,
            started_ms: now_ms,
            duration_ms: 0,
        }
    }

    fn at(&self, now_ms: u64) -> Coordinate {
        if self.duration_ms == 0 || self.is_done(now_ms) {
            return self.to;
        }
        let t = now_ms.saturating_sub(self.started_ms) as f64 / self.duration_ms as f64;
        self.from.lerp(self.to, t)
    }

    fn is_done(&self, now_ms: u64) -> bool {
        now_ms >= self.started_ms + self.duration_ms
    }
}

/// ETA label as shown on screen.
pub fn format_eta(minutes: f64) -> String {
    let minutes = if minutes.is_finite() {
        minutes.max(0.0).ceil() as u64
    } else {
        0
    };
    match minutes {
        0 => "Arrived".to_string(),
        1 => "1 min".to_string(),
        n => format!("{n} mins"),
    }
}

/// Everything the tracking screen renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingView {
    pub order_id: String,
    pub provider_name: String,
    pub customer: CustomerLocation,
    pub simulation: Option<SimulationState>,
    /// Animated marker; trails `simulation.position` by up to one tick.
    pub marker: Coordinate,
    pub eta_label: String,
    pub route_distance_km: f64,
    pub route_duration_minutes: f64,
    pub order_status: String,
    pub timeline: TimelineView,
    pub order_total: f64,
    pub cancel_pending: bool,
    pub alerts: Vec<UserAlert>,
}

pub struct TrackingSession {
    ctx: AppContext,
    order_id: String,
    clock: TrackingClock,
    simulator: PositionSimulator,
    status: OrderStatusMachine,
    order: Order,
    provider: ServiceProvider,
    route: FetchedRoute,
    customer: CustomerLocation,
    marker: Coordinate,
    animation: MarkerAnimation,
    eta_label: String,
    eta_timer: Option<TimerId>,
    marker_timer: Option<TimerId>,
    updates: Receiver<Order>,
    subscription: Option<Unsubscribe>,
    notifications_allowed: bool,
    arrived_at: Option<u64>,
    arrival_notified: bool,
    cancel_pending: bool,
    alerts: Vec<UserAlert>,
    mounted: bool,
}

impl TrackingSession {
    /// Mount a session for `order_id`, delivered by `provider_id`.
    ///
    /// Errors map to a [`UserAlert`] through [`TrackingError::alert`]; nothing
    /// stays scheduled or subscribed when mounting fails.
    pub fn mount(
        ctx: AppContext,
        order_id: &str,
        provider_id: &str,
    ) -> Result<Self, TrackingError> {
        let notifications_allowed = ctx.notifier.request_permission().is_granted();
        if !notifications_allowed {
            warn!(order_id, "notification permission denied, arrival alert suppressed");
        }

        let order = ctx.orders.get_order(order_id)?;
        let provider = ctx.providers.get_provider(provider_id)?;
        let provider_location = provider
            .location
            .validate()
            .map_err(TrackingError::InvalidProviderLocation)?;
        let customer = resolve_customer_location(&ctx, &order);

        let route = ctx.routes.fetch_route(provider_location, customer.coordinate)?;
        info!(
            order_id,
            source = ?route.source,
            distance_km = route.distance_km,
            duration_minutes = route.duration_minutes,
            customer_source = ?customer.source,
            "route resolved"
        );

        let mut clock = TrackingClock::new();
        let mut simulator =
            PositionSimulator::new(ctx.params.tick_interval_ms, ctx.params.arrival_threshold_km);
        let initial = simulator.start(
            &mut clock,
            route.path.clone(),
            route.distance_km,
            ctx.params.speed_kmh,
        );
        let eta_timer =
            clock.schedule_repeating(TimerKind::EtaRefresh, ctx.params.eta_refresh_interval_ms);
        let marker_timer = clock.schedule_repeating(
            TimerKind::MarkerFrame,
            ctx.params.marker_frame_interval_ms,
        );

        let (tx, updates) = mpsc::channel();
        let feed = ctx.feed.clone();
        let now = clock.now();
        let mut session = Self {
            order_id: order_id.to_string(),
            status: OrderStatusMachine::new(&order.status),
            marker: initial.position,
            animation: MarkerAnimation::still(initial.position, now),
            eta_label: format_eta(initial.eta_minutes),
            eta_timer: Some(eta_timer),
            marker_timer: Some(marker_timer),
            ctx,
            clock,
            simulator,
            order,
            provider,
            route,
            customer,
            updates,
            subscription: None,
            notifications_allowed,
            arrived_at: None,
            arrival_notified: false,
            cancel_pending: false,
            alerts: Vec::new(),
            mounted: true,
        };

        if session.status.status() == Some(OrderStatus::Cancelled) {
            info!(order_id, "order already cancelled, position simulation not started");
            session.stop_timers();
        }

        // On failure the session drops here and its timers go with it.
        let subscription = feed.on_update(
            order_id,
            Box::new(move |order: Order| {
                // A closed channel means the session is gone.
                let _ = tx.send(order);
            }),
        )?;
        session.subscription = Some(subscription);
        info!(order_id, eta = %session.eta_label, "tracking session mounted");
        Ok(session)
    }

    /// Fire every timer due up to `deadline_ms` and apply pending feed updates,
    /// then move the clock to `deadline_ms`. Returns the number of events handled.
    pub fn run_until(&mut self, deadline_ms: u64) -> usize {
        if !self.mounted {
            return 0;
        }
        let mut handled = self.drain_updates();
        while let Some(fired) = self.clock.pop_due(deadline_ms) {
            self.handle_timer(fired);
            handled += 1 + self.drain_updates();
        }
        self.clock.advance_to(deadline_ms);
        handled
    }

    fn handle_timer(&mut self, fired: Fired) {
        match fired.kind {
            TimerKind::PositionTick => {
                let arrival = self.simulator.on_tick(&mut self.clock, fired.timestamp);
                if let Some(state) = self.simulator.state() {
                    self.animation = MarkerAnimation {
                        from: self.marker,
                        to: state.position,
                        started_ms: fired.timestamp,
                        duration_ms: self.ctx.params.tick_interval_ms,
                    };
                }
                if let Some(arrival) = arrival {
                    self.on_arrival(arrival);
                }
            }
            TimerKind::EtaRefresh => {
                if let Some(state) = self.simulator.state() {
                    self.eta_label = format_eta(state.eta_minutes);
                }
            }
            TimerKind::MarkerFrame => {
                self.marker = self.animation.at(fired.timestamp);
                if self.arrived_at.is_some() && self.animation.is_done(fired.timestamp) {
                    // Marker is at the destination; nothing left to animate.
                    if let Some(timer) = self.marker_timer.take() {
                        self.clock.cancel(timer);
                    }
                }
            }
        }
    }

    fn on_arrival(&mut self, arrival: Arrival) {
        self.arrived_at = Some(arrival.timestamp);
        self.eta_label = format_eta(0.0);
        if let Some(timer) = self.eta_timer.take() {
            self.clock.cancel(timer);
        }
        if self.arrival_notified {
            return;
        }
        self.arrival_notified = true;
        if !self.notifications_allowed {
            debug!(order_id = %self.order_id, "arrival notification suppressed");
            return;
        }
        if let Err(err) = self.ctx.notifier.notify(ARRIVAL_TITLE, ARRIVAL_BODY) {
            warn!(order_id = %self.order_id, error = %err, "arrival notification failed");
        }
    }

    fn drain_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(order) = self.updates.try_recv() {
            self.apply_order(order);
            applied += 1;
        }
        applied
    }

    fn apply_order(&mut self, order: Order) {
        if self.status.apply(&order.status) {
            info!(order_id = %self.order_id, status = %order.status, "order status updated");
            if self.status.status() == Some(OrderStatus::Cancelled) {
                if self.cancel_pending {
                    self.cancel_pending = false;
                    info!(order_id = %self.order_id, "order cancellation confirmed");
                }
                self.stop_timers();
            }
        }
        self.order = order;
    }

    /// Cancel the order. Only allowed while it is still pending; the timeline
    /// changes once the feed delivers the new status.
    pub fn cancel_order(&mut self) -> Result<(), TrackingError> {
        if !self.mounted {
            return Err(TrackingError::NotMounted);
        }
        self.drain_updates();
        if !self.status.can_cancel() {
            let err = TrackingError::CancelNotAllowed {
                status: self.status.raw().to_string(),
            };
            return Err(self.record(err));
        }
        match self
            .ctx
            .orders
            .update_status(&self.order_id, OrderStatus::Cancelled.label())
        {
            Ok(()) => {
                self.cancel_pending = true;
                info!(order_id = %self.order_id, "order cancellation requested");
                Ok(())
            }
            Err(err) => {
                warn!(order_id = %self.order_id, error = %err, "order cancellation failed");
                Err(self.record(err.into()))
            }
        }
    }

    fn record(&mut self, err: TrackingError) -> TrackingError {
        self.alerts.push(err.alert());
        err
    }

    fn stop_timers(&mut self) {
        self.simulator.stop(&mut self.clock);
        for timer in [self.eta_timer.take(), self.marker_timer.take()]
            .into_iter()
            .flatten()
        {
            self.clock.cancel(timer);
        }
    }

    /// Cancel all timers and unsubscribe from the feed. Idempotent.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.stop_timers();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        info!(order_id = %self.order_id, "tracking session unmounted");
    }

    pub fn view(&self) -> TrackingView {
        TrackingView {
            order_id: self.order_id.clone(),
            provider_name: self.provider.name.clone(),
            customer: self.customer.clone(),
            simulation: self.simulator.state().copied(),
            marker: self.marker,
            eta_label: self.eta_label.clone(),
            route_distance_km: self.route.distance_km,
            route_duration_minutes: self.route.duration_minutes,
            order_status: self.status.raw().to_string(),
            timeline: self.status.view().clone(),
            order_total: self.order.display_total(),
            cancel_pending: self.cancel_pending,
            alerts: self.alerts.clone(),
        }
    }

    /// Remove and return alerts once the screen has shown them.
    pub fn take_alerts(&mut self) -> Vec<UserAlert> {
        std::mem::take(&mut self.alerts)
    }

    pub fn clock(&self) -> &TrackingClock {
        &self.clock
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn route(&self) -> &FetchedRoute {
        &self.route
    }

    pub fn phase(&self) -> SimulatorPhase {
        self.simulator.phase()
    }

    pub fn arrived_at(&self) -> Option<u64> {
        self.arrived_at
    }

    pub fn status(&self) -> &OrderStatusMachine {
        &self.status
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Device GPS first, then the order's delivery address, then the configured
/// fallback coordinate.
fn resolve_customer_location(ctx: &AppContext, order: &Order) -> CustomerLocation {
    let address_label = order
        .address
        .as_ref()
        .map(|address| address.label.clone())
        .filter(|label| !label.is_empty());

    let (coordinate, source) = match device_position(ctx) {
        Some(position) => (position, LocationSource::Device),
        None => match order.address_coordinate() {
            Some(coordinate) => (coordinate, LocationSource::OrderAddress),
            None => {
                warn!(order_id = %order.id, "no customer coordinate, using fallback location");
                (ctx.params.fallback_customer_location, LocationSource::Fallback)
            }
        },
    };

    let label = match source {
        LocationSource::OrderAddress => address_label,
        LocationSource::Device | LocationSource::Fallback => {
            match ctx.location.reverse_geocode(coordinate) {
                Ok(label) => label.or(address_label),
                Err(err) => {
                    warn!(error = %err, "reverse geocoding failed");
                    address_label
                }
            }
        }
    };

    CustomerLocation {
        coordinate,
        source,
        label,
    }
}

fn device_position(ctx: &AppContext) -> Option<Coordinate> {
    if !ctx.location.request_foreground_permission().is_granted() {
        warn!("location permission denied");
        return None;
    }
    let timeout = Duration::from_millis(ctx.params.location_timeout_ms);
    match ctx.location.current_position(timeout) {
        Ok(position) => match position.validate() {
            Ok(position) => Some(position),
            Err(err) => {
                warn!(error = %err, "device reported an invalid position");
                None
            }
        },
        Err(err) => {
            warn!(error = %err, "device position unavailable");
            None
        }
    }
}
