//! Order status timeline.
//!
//! The backend stores the status as a display string. The five linear stages
//! render as a step timeline where index comparison decides completed vs
//! upcoming; "Cancelled" is a terminal side state rendered on its own.
//!
//! Unrecognized strings degrade to "no progress" but are logged and exposed on
//! the view, so status drift between backend and client shows up instead of
//! silently rendering an empty timeline.

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    PickedUp,
    Processing,
    Dispatched,
    Delivered,
    Cancelled,
}

/// The linear stages, in timeline order.
pub const TIMELINE: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::PickedUp,
    OrderStatus::Processing,
    OrderStatus::Dispatched,
    OrderStatus::Delivered,
];

impl OrderStatus {
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Order Placed",
            OrderStatus::PickedUp => "Picked Up",
            OrderStatus::Processing => "Order Processing",
            OrderStatus::Dispatched => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Order Placed" => Some(OrderStatus::Pending),
            "Picked Up" => Some(OrderStatus::PickedUp),
            "Order Processing" => Some(OrderStatus::Processing),
            "Out for Delivery" => Some(OrderStatus::Dispatched),
            "Delivered" => Some(OrderStatus::Delivered),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Position in [`TIMELINE`]; `None` for `Cancelled`.
    pub fn timeline_index(self) -> Option<usize> {
        TIMELINE.iter().position(|stage| *stage == self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Forward moves along the timeline, plus `Pending -> Cancelled`.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match (self, next) {
            (OrderStatus::Pending, OrderStatus::Cancelled) => true,
            (_, OrderStatus::Cancelled) | (OrderStatus::Cancelled, _) => false,
            (from, to) => match (from.timeline_index(), to.timeline_index()) {
                (Some(a), Some(b)) => b > a,
                _ => false,
            },
        }
    }
}

/// Timeline index of a raw status string; `None` when cancelled or unknown.
pub fn status_index(raw: &str) -> Option<usize> {
    OrderStatus::from_label(raw).and_then(OrderStatus::timeline_index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepState {
    Completed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelineStep {
    pub status: OrderStatus,
    pub state: StepState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TimelineView {
    Cancelled,
    Steps {
        current: Option<usize>,
        steps: Vec<TimelineStep>,
        /// Raw value that matched no known status.
        unrecognized: Option<String>,
    },
}

impl TimelineView {
    pub fn for_status(raw: &str) -> Self {
        let parsed = OrderStatus::from_label(raw);
        if parsed == Some(OrderStatus::Cancelled) {
            return TimelineView::Cancelled;
        }
        let current = parsed.and_then(OrderStatus::timeline_index);
        // A delivered order has nothing left in progress.
        let finished = parsed.is_some_and(OrderStatus::is_terminal);
        let steps = TIMELINE
            .iter()
            .enumerate()
            .map(|(idx, status)| TimelineStep {
                status: *status,
                state: match current {
                    Some(cur) if idx < cur || (idx == cur && finished) => StepState::Completed,
                    Some(cur) if idx == cur => StepState::Current,
                    _ => StepState::Upcoming,
                },
            })
            .collect();
        TimelineView::Steps {
            current,
            steps,
            unrecognized: parsed.is_none().then(|| raw.to_string()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TimelineView::Cancelled)
    }

    pub fn current_index(&self) -> Option<usize> {
        match self {
            TimelineView::Steps { current, .. } => *current,
            TimelineView::Cancelled => None,
        }
    }
}

/// Projection of the latest status pushed by the order feed.
#[derive(Debug, Clone)]
pub struct OrderStatusMachine {
    raw: String,
    status: Option<OrderStatus>,
    view: TimelineView,
    updates: u64,
    unrecognized_updates: u64,
}

impl OrderStatusMachine {
    pub fn new(initial: &str) -> Self {
        let mut machine = Self {
            raw: String::new(),
            status: None,
            view: TimelineView::for_status(""),
            updates: 0,
            unrecognized_updates: 0,
        };
        machine.project(initial);
        machine
    }

    fn project(&mut self, raw: &str) {
        self.raw = raw.to_string();
        self.status = OrderStatus::from_label(raw);
        self.view = TimelineView::for_status(raw);
        if self.status.is_none() {
            self.unrecognized_updates += 1;
            warn!(status = raw, "unrecognized order status, rendering no progress");
        }
    }

    /// Apply a pushed status value. Returns true when the view changed.
    pub fn apply(&mut self, raw: &str) -> bool {
        self.updates += 1;
        if raw == self.raw {
            return false;
        }
        if let (Some(from), Some(to)) = (self.status, OrderStatus::from_label(raw)) {
            if !from.can_transition_to(to) {
                // The backend is authoritative; just record the oddity.
                warn!(from = from.label(), to = to.label(), "unexpected order status transition");
            }
        }
        self.project(raw);
        true
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn status(&self) -> Option<OrderStatus> {
        self.status
    }

    pub fn view(&self) -> &TimelineView {
        &self.view
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn unrecognized_updates(&self) -> u64 {
        self.unrecognized_updates
    }

    pub fn can_cancel(&self) -> bool {
        self.status
            .is_some_and(|status| status.can_transition_to(OrderStatus::Cancelled))
    }
}
