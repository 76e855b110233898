//! Single-threaded virtual-time event loop for one tracking session.
//!
//! Timers are entries in a min-heap ordered by fire time, then by scheduling
//! order. Cancelling a timer removes it from the registry; stale heap entries
//! are skipped lazily when popped. Repeating timers are re-armed on pop, one
//! period after their scheduled (not observed) fire time.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

pub const ONE_SEC_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Advance the simulated vehicle along its path.
    PositionTick,
    /// Refresh the displayed ETA label.
    EtaRefresh,
    /// Ease the displayed marker towards the simulated position.
    MarkerFrame,
}

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub timestamp: u64,
    pub timer: TimerId,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scheduled {
    timestamp: u64,
    seq: u64,
    timer: TimerId,
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by timestamp, then seq.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy)]
struct TimerConfig {
    kind: TimerKind,
    period_ms: Option<u64>,
}

#[derive(Debug, Default)]
pub struct TrackingClock {
    now: u64,
    next_id: u64,
    next_seq: u64,
    queue: BinaryHeap<Scheduled>,
    timers: HashMap<TimerId, TimerConfig>,
}

impl TrackingClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at an arbitrary epoch (e.g. wall-clock milliseconds).
    pub fn starting_at(now: u64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    fn push(&mut self, timestamp: u64, timer: TimerId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled {
            timestamp,
            seq,
            timer,
        });
    }

    fn register(&mut self, kind: TimerKind, period_ms: Option<u64>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.insert(id, TimerConfig { kind, period_ms });
        id
    }

    /// Fire once, `delay_ms` from now.
    pub fn schedule_once(&mut self, kind: TimerKind, delay_ms: u64) -> TimerId {
        let id = self.register(kind, None);
        self.push(self.now + delay_ms, id);
        id
    }

    /// Fire every `period_ms`, first one period from now. A zero period is
    /// bumped to one millisecond so the loop always makes progress.
    pub fn schedule_repeating(&mut self, kind: TimerKind, period_ms: u64) -> TimerId {
        let period_ms = period_ms.max(1);
        let id = self.register(kind, Some(period_ms));
        self.push(self.now + period_ms, id);
        id
    }

    /// Cancel a timer. Returns false if it was already cancelled or spent.
    pub fn cancel(&mut self, timer: TimerId) -> bool {
        self.timers.remove(&timer).is_some()
    }

    pub fn is_active(&self, timer: TimerId) -> bool {
        self.timers.contains_key(&timer)
    }

    /// Number of timers that can still fire.
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    fn discard_cancelled(&mut self) {
        while let Some(head) = self.queue.peek() {
            if self.timers.contains_key(&head.timer) {
                break;
            }
            self.queue.pop();
        }
    }

    /// Fire time of the next live timer.
    pub fn peek_next(&mut self) -> Option<u64> {
        self.discard_cancelled();
        self.queue.peek().map(|entry| entry.timestamp)
    }

    /// Pop the next live timer and move `now` to its fire time.
    pub fn pop_next(&mut self) -> Option<Fired> {
        self.discard_cancelled();
        let entry = self.queue.pop()?;
        let config = *self.timers.get(&entry.timer)?;
        self.now = self.now.max(entry.timestamp);
        match config.period_ms {
            Some(period) => self.push(entry.timestamp + period, entry.timer),
            None => {
                self.timers.remove(&entry.timer);
            }
        }
        Some(Fired {
            timestamp: entry.timestamp,
            timer: entry.timer,
            kind: config.kind,
        })
    }

    /// Pop the next live timer if it is due at or before `deadline`.
    pub fn pop_due(&mut self, deadline: u64) -> Option<Fired> {
        match self.peek_next() {
            Some(at) if at <= deadline => self.pop_next(),
            _ => None,
        }
    }

    /// Move time forward without firing anything. Never moves backwards.
    pub fn advance_to(&mut self, timestamp: u64) {
        self.now = self.now.max(timestamp);
    }

    pub fn is_empty(&mut self) -> bool {
        self.peek_next().is_none()
    }
}
