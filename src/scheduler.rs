//! Virtual-clock event queue.
//!
//! Periodic ticks, arp sub-steps, gate-offs, and voice disposal are all
//! `(time, action)` entries in one queue, drained in time order by a single
//! loop. Live playback drains it up to the host's current time; offline
//! export drains it as fast as possible. Both see the same ordering.

use std::collections::VecDeque;

struct Scheduled<A> {
    at: f64,
    action: A,
}

/// Time-ordered queue of pending actions. Entries with equal times fire in
/// insertion order.
pub struct Scheduler<A> {
    events: VecDeque<Scheduled<A>>,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Scheduler {
            events: VecDeque::new(),
        }
    }

    /// Queue `action` to fire at `at` seconds.
    pub fn schedule(&mut self, at: f64, action: A) {
        let index = self.events.partition_point(|e| e.at <= at);
        self.events.insert(index, Scheduled { at, action });
    }

    /// Remove and return the earliest action due at or before `until`.
    pub fn pop_due(&mut self, until: f64) -> Option<(f64, A)> {
        if self.events.front()?.at > until {
            return None;
        }
        self.events.pop_front().map(|e| (e.at, e.action))
    }

    /// Time of the earliest pending action.
    pub fn next_time(&self) -> Option<f64> {
        self.events.front().map(|e| e.at)
    }

    /// Drop every pending action matching `pred`, returning how many went.
    pub fn cancel(&mut self, mut pred: impl FnMut(&A) -> bool) -> usize {
        let before = self.events.len();
        self.events.retain(|e| !pred(&e.action));
        before - self.events.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
