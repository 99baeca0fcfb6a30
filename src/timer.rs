// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! The timeout queue driving `add_timeout`/`repeat_timeout`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// A timeout callback.
///
/// Runs on the event-loop thread. It receives the queue so it can re-arm
/// itself with [`TimerQueue::repeat`] or schedule and remove other
/// timeouts, plus the `data` word it was registered with.
pub type TimerHandler = fn(&mut TimerQueue, usize);

/// One pending timeout.
///
/// Identity for `has`/`remove` is the `(handler, data)` pair; several
/// entries with the same identity may be pending at once and are removed
/// together.
struct Timer {
    deadline: Instant,
    handler: TimerHandler,
    data: usize,
    // insertion order, for FIFO firing among equal deadlines
    order: u64,
}

impl Ord for Timer {
    /// Ordering is reversed so that the earliest deadline is the greatest,
    /// and BinaryHeap acts as a min-heap.
    fn cmp(&self, other: &Timer) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.order.cmp(&other.order))
            .reverse()
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Timer) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for Timer {}

impl PartialEq for Timer {
    fn eq(&self, other: &Timer) -> bool {
        self.deadline == other.deadline && self.order == other.order
    }
}

/// A queue of pending timeouts, ordered by deadline.
///
/// The event loop asks for [`next_deadline`](TimerQueue::next_deadline) to
/// clip its poll timeout and calls
/// [`fire_expired`](TimerQueue::fire_expired) after waking up.
#[derive(Default)]
pub struct TimerQueue {
    timers: BinaryHeap<Timer>,
    next_order: u64,
    /// Nominal deadline of the entry currently being fired; the base for
    /// `repeat` so periodic timeouts do not drift by callback latency.
    firing_deadline: Option<Instant>,
}

impl TimerQueue {
    pub fn new() -> TimerQueue {
        TimerQueue::default()
    }

    /// Schedules `handler` to run once `delay` after `now`.
    pub fn add(&mut self, now: Instant, delay: Duration, handler: TimerHandler, data: usize) {
        self.schedule(now + delay, handler, data);
    }

    /// Schedules `handler` to run at an absolute deadline.
    pub fn schedule(&mut self, deadline: Instant, handler: TimerHandler, data: usize) {
        let order = self.next_order;
        self.next_order += 1;
        self.timers.push(Timer {
            deadline,
            handler,
            data,
            order,
        });
    }

    /// Re-arms a periodic timeout from within its own callback.
    ///
    /// The new deadline is `delay` after the *nominal* deadline of the
    /// timeout currently firing, not after the moment the callback ran, so
    /// a periodic timeout keeps its cadence regardless of dispatch
    /// latency. Outside a callback this behaves like [`add`](Self::add)
    /// from the current time.
    pub fn repeat(&mut self, delay: Duration, handler: TimerHandler, data: usize) {
        let base = self.firing_deadline.unwrap_or_else(Instant::now);
        self.schedule(base + delay, handler, data);
    }

    /// Is a timeout with this `(handler, data)` identity pending?
    pub fn has(&self, handler: TimerHandler, data: usize) -> bool {
        self.timers
            .iter()
            .any(|t| t.handler == handler && t.data == data)
    }

    /// Removes every pending timeout with this `(handler, data)` identity.
    /// Removing an identity that is not pending is a no-op.
    pub fn remove(&mut self, handler: TimerHandler, data: usize) {
        self.timers
            .retain(|t| !(t.handler == handler && t.data == data));
    }

    /// The earliest pending deadline, for clipping the poll timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.peek().map(|t| t.deadline)
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Runs every timeout whose deadline is at or before `now`, earliest
    /// first, returning how many fired. Timeouts scheduled by a callback
    /// fire in the same pass if already expired.
    pub fn fire_expired(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some(timer) = self.timers.peek() {
            if timer.deadline > now {
                break;
            }
            // Pop before calling: the callback may freely mutate the queue.
            let timer = self.timers.pop().unwrap();
            self.firing_deadline = Some(timer.deadline);
            (timer.handler)(self, timer.data);
            fired += 1;
        }
        self.firing_deadline = None;
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        static LOG: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
    }

    fn log(_q: &mut TimerQueue, data: usize) {
        LOG.with(|l| l.borrow_mut().push(data));
    }

    fn other(_q: &mut TimerQueue, data: usize) {
        LOG.with(|l| l.borrow_mut().push(data + 1000));
    }

    fn rearm_5ms(q: &mut TimerQueue, data: usize) {
        LOG.with(|l| l.borrow_mut().push(data));
        q.repeat(Duration::from_millis(5), rearm_5ms, data);
    }

    fn take_log() -> Vec<usize> {
        LOG.with(|l| std::mem::take(&mut *l.borrow_mut()))
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fires_in_deadline_order_and_only_when_expired() {
        let now = Instant::now();
        let mut q = TimerQueue::new();
        q.add(now, ms(10), log, 10);
        q.add(now, ms(5), log, 5);
        q.add(now, ms(20), log, 20);

        assert_eq!(q.next_deadline(), Some(now + ms(5)));
        assert_eq!(q.fire_expired(now + ms(6)), 1);
        assert_eq!(take_log(), vec![5]);

        assert_eq!(q.fire_expired(now + ms(25)), 2);
        assert_eq!(take_log(), vec![10, 20]);
        assert!(q.is_empty());
    }

    #[test]
    fn identity_is_the_handler_data_pair() {
        let now = Instant::now();
        let mut q = TimerQueue::new();
        q.add(now, ms(5), log, 1);
        q.add(now, ms(5), log, 2);
        q.add(now, ms(5), other, 1);

        assert!(q.has(log, 1));
        assert!(q.has(other, 1));
        q.remove(log, 1);
        assert!(!q.has(log, 1));
        // same data under a different handler survives, and vice versa
        assert!(q.has(log, 2));
        assert!(q.has(other, 1));

        // removing something not pending is fine
        q.remove(log, 99);
        assert_eq!(q.fire_expired(now + ms(10)), 2);
        assert_eq!(take_log(), vec![2, 1001]);
    }

    #[test]
    fn remove_drops_every_matching_entry() {
        let now = Instant::now();
        let mut q = TimerQueue::new();
        q.add(now, ms(1), log, 7);
        q.add(now, ms(2), log, 7);
        q.remove(log, 7);
        assert!(q.is_empty());
    }

    #[test]
    fn repeat_measures_from_the_nominal_deadline() {
        let now = Instant::now();
        let mut q = TimerQueue::new();
        q.add(now, ms(5), rearm_5ms, 0);

        // The loop is late: we only get around to firing at +9ms. The
        // re-armed timeout is still due at +10ms, not +14ms.
        assert_eq!(q.fire_expired(now + ms(9)), 1);
        assert_eq!(q.next_deadline(), Some(now + ms(10)));

        // Late again at +13ms: the cadence holds at +15ms.
        assert_eq!(q.fire_expired(now + ms(13)), 1);
        assert_eq!(q.next_deadline(), Some(now + ms(15)));
        take_log();
    }

    #[test]
    fn equal_deadlines_fire_in_insertion_order() {
        let now = Instant::now();
        let mut q = TimerQueue::new();
        for data in [3, 1, 2] {
            q.schedule(now + ms(5), log, data);
        }
        q.fire_expired(now + ms(5));
        assert_eq!(take_log(), vec![3, 1, 2]);
    }

    #[test]
    fn callback_may_schedule_and_cancel() {
        fn cancel_other(q: &mut TimerQueue, _data: usize) {
            q.remove(log, 42);
        }
        let now = Instant::now();
        let mut q = TimerQueue::new();
        q.add(now, ms(1), cancel_other, 0);
        q.add(now, ms(2), log, 42);
        assert_eq!(q.fire_expired(now + ms(5)), 1);
        assert!(take_log().is_empty());
    }
}
