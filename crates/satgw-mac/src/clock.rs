//! Event-scheduling abstraction and a virtual clock implementing it.
//!
//! The MAC never sleeps or spawns; it only asks a [`TickScheduler`] to call
//! it back after a delay. [`VirtualClock`] is the discrete-event
//! implementation used by the simulator and the tests: time jumps straight to
//! the next due timer.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

/// Handle of a pending timer, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// A fired timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub handle: TimerHandle,
    pub at: Duration,
    pub carrier_id: u32,
}

/// "Run this again after `delay`": the only scheduling primitive the MAC uses.
pub trait TickScheduler {
    /// Current simulation time.
    fn now(&self) -> Duration;
    /// Arms a timer for `carrier_id` that fires `delay` from now.
    fn schedule(&mut self, delay: Duration, carrier_id: u32) -> TimerHandle;
    /// Disarms a pending timer. Returns `false` if it already fired or was cancelled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    at: Duration,
    handle: TimerHandle,
    carrier_id: u32,
}

// Min-heap on (at, handle); handles are issued in arming order.
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.handle.cmp(&self.handle))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Discrete-event clock with a timer queue.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Duration,
    next_handle: u64,
    queue: BinaryHeap<Pending>,
    cancelled: HashSet<TimerHandle>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of armed, not yet cancelled timers.
    pub fn pending(&self) -> usize {
        self.queue.len() - self.cancelled.len()
    }

    /// Pops the earliest armed timer and advances time to its due instant.
    pub fn next_event(&mut self) -> Option<TimerEvent> {
        while let Some(p) = self.queue.pop() {
            if self.cancelled.remove(&p.handle) {
                continue;
            }
            self.now = self.now.max(p.at);
            return Some(TimerEvent {
                handle: p.handle,
                at: self.now,
                carrier_id: p.carrier_id,
            });
        }
        None
    }

    /// Like [`next_event`](Self::next_event) but leaves timers due after
    /// `deadline` armed. Time then stops at `deadline`.
    pub fn next_event_until(&mut self, deadline: Duration) -> Option<TimerEvent> {
        loop {
            let head = *self.queue.peek()?;
            if self.cancelled.remove(&head.handle) {
                self.queue.pop();
                continue;
            }
            if head.at > deadline {
                self.now = self.now.max(deadline);
                return None;
            }
            return self.next_event();
        }
    }
}

impl TickScheduler for VirtualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule(&mut self, delay: Duration, carrier_id: u32) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.queue.push(Pending {
            at: self.now + delay,
            handle,
            carrier_id,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let armed = self.queue.iter().any(|p| p.handle == handle);
        armed && self.cancelled.insert(handle)
    }
}
