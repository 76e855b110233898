//! Position simulation: a vehicle advancing along a route at constant speed.
//!
//! The core is the pure [`tick`] function over [`SimulationState`]; the
//! [`PositionSimulator`] wraps it with the Idle/Running/Arrived lifecycle and
//! owns the repeating `PositionTick` timer on the session clock.
//!
//! Distance is tracked in two ways that must agree at the end: the remaining
//! road distance (from the resolved route distance) and a fractional index into
//! the path points. Each kilometre travelled moves the index by
//! `(len - 1) / total_distance_km`, so both reach their end together.

use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{TimerId, TimerKind, TrackingClock};
use crate::geo::Coordinate;
use crate::routing::RoutePath;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Immutable inputs of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPlan {
    path: RoutePath,
    total_distance_km: f64,
    speed_kmh: f64,
    arrival_threshold_km: f64,
}

impl SimulationPlan {
    pub fn new(
        path: RoutePath,
        total_distance_km: f64,
        speed_kmh: f64,
        arrival_threshold_km: f64,
    ) -> Self {
        let sane = |value: f64| if value.is_finite() { value.max(0.0) } else { 0.0 };
        Self {
            path,
            total_distance_km: sane(total_distance_km),
            speed_kmh: if speed_kmh.is_finite() { speed_kmh.max(1.0) } else { 1.0 },
            arrival_threshold_km: sane(arrival_threshold_km),
        }
    }

    pub fn path(&self) -> &RoutePath {
        &self.path
    }

    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_km
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }

    fn last_index(&self) -> f64 {
        (self.path.len() - 1) as f64
    }

    fn position_at(&self, fractional_index: f64) -> Coordinate {
        let points = self.path.points();
        if fractional_index >= self.last_index() {
            return self.path.last();
        }
        let lower = fractional_index.max(0.0).floor() as usize;
        let t = fractional_index - lower as f64;
        points[lower].lerp(points[lower + 1], t)
    }

    /// Initial state: at the first path point with the full distance ahead.
    pub fn initial_state(&self) -> SimulationState {
        SimulationState {
            position: self.path.first(),
            remaining_distance_km: self.total_distance_km,
            eta_minutes: eta_minutes(self.total_distance_km, self.speed_kmh),
            fractional_index: 0.0,
            has_arrived: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationState {
    pub position: Coordinate,
    pub remaining_distance_km: f64,
    pub eta_minutes: f64,
    pub fractional_index: f64,
    pub has_arrived: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub state: SimulationState,
    /// True only on the tick that transitions into the arrived state.
    pub arrived_now: bool,
}

/// Whole minutes to cover `remaining_km`, rounded up.
pub fn eta_minutes(remaining_km: f64, speed_kmh: f64) -> f64 {
    if remaining_km <= 0.0 {
        return 0.0;
    }
    (remaining_km / speed_kmh.max(1.0) * 60.0).ceil()
}

/// Advance `state` by `elapsed_ms` of travel. Arrived states are returned unchanged.
pub fn tick(state: &SimulationState, plan: &SimulationPlan, elapsed_ms: u64) -> TickOutcome {
    if state.has_arrived {
        return TickOutcome {
            state: *state,
            arrived_now: false,
        };
    }

    let last_index = plan.last_index();
    let delta_km = plan.speed_kmh * elapsed_ms as f64 / MS_PER_HOUR;
    let remaining_distance_km = (state.remaining_distance_km - delta_km).max(0.0);

    let km_per_segment = plan.total_distance_km / last_index;
    let fractional_index = if km_per_segment > 0.0 {
        (state.fractional_index + delta_km / km_per_segment).min(last_index)
    } else {
        last_index
    };

    if fractional_index >= last_index || remaining_distance_km <= plan.arrival_threshold_km {
        return TickOutcome {
            state: SimulationState {
                position: plan.path.last(),
                remaining_distance_km: 0.0,
                eta_minutes: 0.0,
                fractional_index: last_index,
                has_arrived: true,
            },
            arrived_now: true,
        };
    }

    TickOutcome {
        state: SimulationState {
            position: plan.position_at(fractional_index),
            remaining_distance_km,
            eta_minutes: eta_minutes(remaining_distance_km, plan.speed_kmh),
            fractional_index,
            has_arrived: false,
        },
        arrived_now: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorPhase {
    Idle,
    Running,
    Arrived,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrival {
    pub timestamp: u64,
    pub position: Coordinate,
}

/// Timer adapter around [`tick`].
#[derive(Debug)]
pub struct PositionSimulator {
    phase: SimulatorPhase,
    plan: Option<SimulationPlan>,
    state: Option<SimulationState>,
    timer: Option<TimerId>,
    last_tick_ms: u64,
    tick_interval_ms: u64,
    arrival_threshold_km: f64,
}

impl PositionSimulator {
    pub fn new(tick_interval_ms: u64, arrival_threshold_km: f64) -> Self {
        Self {
            phase: SimulatorPhase::Idle,
            plan: None,
            state: None,
            timer: None,
            last_tick_ms: 0,
            tick_interval_ms,
            arrival_threshold_km,
        }
    }

    pub fn phase(&self) -> SimulatorPhase {
        self.phase
    }

    pub fn state(&self) -> Option<&SimulationState> {
        self.state.as_ref()
    }

    pub fn plan(&self) -> Option<&SimulationPlan> {
        self.plan.as_ref()
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// Begin a run and arm the repeating tick timer. Restarting cancels the
    /// previous timer first.
    pub fn start(
        &mut self,
        clock: &mut TrackingClock,
        path: RoutePath,
        total_distance_km: f64,
        speed_kmh: f64,
    ) -> SimulationState {
        if let Some(previous) = self.timer.take() {
            clock.cancel(previous);
        }
        let plan = SimulationPlan::new(
            path,
            total_distance_km,
            speed_kmh,
            self.arrival_threshold_km,
        );
        let state = plan.initial_state();
        info!(
            distance_km = plan.total_distance_km(),
            speed_kmh = plan.speed_kmh(),
            eta_minutes = state.eta_minutes,
            points = plan.path().len(),
            "position simulation started"
        );
        self.plan = Some(plan);
        self.state = Some(state);
        self.last_tick_ms = clock.now();
        self.timer = Some(clock.schedule_repeating(TimerKind::PositionTick, self.tick_interval_ms));
        self.phase = SimulatorPhase::Running;
        state
    }

    /// Handle a `PositionTick` fired at `now_ms`. Elapsed time is measured from
    /// the previous tick, so a late tick still covers the right distance.
    pub fn on_tick(&mut self, clock: &mut TrackingClock, now_ms: u64) -> Option<Arrival> {
        if self.phase != SimulatorPhase::Running {
            return None;
        }
        let (plan, state) = match (&self.plan, &self.state) {
            (Some(plan), Some(state)) => (plan, state),
            _ => return None,
        };

        let elapsed_ms = now_ms.saturating_sub(self.last_tick_ms);
        self.last_tick_ms = self.last_tick_ms.max(now_ms);
        let outcome = tick(state, plan, elapsed_ms);
        self.state = Some(outcome.state);
        debug!(
            elapsed_ms,
            remaining_km = outcome.state.remaining_distance_km,
            eta_minutes = outcome.state.eta_minutes,
            "position tick"
        );

        if !outcome.arrived_now {
            return None;
        }

        self.phase = SimulatorPhase::Arrived;
        if let Some(timer) = self.timer.take() {
            clock.cancel(timer);
        }
        info!(timestamp = now_ms, "vehicle arrived");
        Some(Arrival {
            timestamp: now_ms,
            position: outcome.state.position,
        })
    }

    /// Cancel the tick timer and return to Idle. Safe to call repeatedly; the
    /// last state snapshot is kept for display.
    pub fn stop(&mut self, clock: &mut TrackingClock) {
        if let Some(timer) = self.timer.take() {
            clock.cancel(timer);
        }
        if self.phase != SimulatorPhase::Idle {
            debug!(phase = ?self.phase, "position simulation stopped");
        }
        self.phase = SimulatorPhase::Idle;
    }
}
