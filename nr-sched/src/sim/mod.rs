/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Discrete-event time base.
//!
//! Every component in this crate reacts to time-stamped events and runs to
//! completion; nothing blocks and nothing runs concurrently inside one
//! simulation run.  [`EventQueue`] is the single source of simulated time:
//!
//! ```text
//!  schedule_at(t, e) ──►  BinaryHeap<(t, seq)>  ──pop()──►  (now = t, e)
//!                               ▲
//!                               └─ seq breaks ties: FIFO per instant
//! ```
//!
//! The FIFO-per-instant guarantee matters to the interference engine, which
//! requires simultaneous receptions to be announced at the same `now()`
//! before any later change is applied.

pub mod error_model;
pub mod scenario;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

// ── SimTime ───────────────────────────────────────────────────────────────────

/// A simulated instant, in nanoseconds since the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub fn from_nanos(ns: u64) -> Self {
        SimTime(ns)
    }

    pub fn from_micros(us: u64) -> Self {
        SimTime(us * 1_000)
    }

    pub fn as_nanos(self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`.  Zero if `earlier` is not in the past.
    pub fn saturating_since(self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0 + rhs.as_nanos() as u64)
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    /// Saturates at zero when `rhs` is later than `self`.
    fn sub(self, rhs: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}ms", self.0 as f64 / 1_000_000.0)
    }
}

// ── Scheduling primitive ──────────────────────────────────────────────────────

/// The time base as seen by event-processing components.
///
/// Components never own the queue; they borrow it for the duration of one
/// reaction, read `now()` and register follow-up events.
pub trait EventScheduler<E> {
    /// Current simulated instant.
    fn now(&self) -> SimTime;

    /// Register `event` to fire at `at`.
    ///
    /// # Panics
    /// If `at` lies before `now()`.
    fn schedule_at(&mut self, at: SimTime, event: E);

    /// Register `event` to fire `delay` after `now()`.
    fn schedule_in(&mut self, delay: Duration, event: E) {
        let at = self.now() + delay;
        self.schedule_at(at, event);
    }
}

/// Heap entry.  Ordered by `(at, seq)` only; the payload never takes part in
/// comparisons.
struct Scheduled<E> {
    at: SimTime,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    // Reversed: BinaryHeap is a max-heap, we want the earliest entry on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Single-threaded event queue with FIFO ordering per instant.
pub struct EventQueue<E> {
    heap: BinaryHeap<Scheduled<E>>,
    now: SimTime,
    next_seq: u64,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            now: SimTime::ZERO,
            next_seq: 0,
        }
    }

    /// Remove the next event and advance `now()` to its instant.
    pub fn pop(&mut self) -> Option<(SimTime, E)> {
        let entry = self.heap.pop()?;
        self.now = entry.at;
        Some((entry.at, entry.event))
    }

    /// Instant of the next pending event without consuming it.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<E> EventScheduler<E> for EventQueue<E> {
    fn now(&self) -> SimTime {
        self.now
    }

    fn schedule_at(&mut self, at: SimTime, event: E) {
        assert!(
            at >= self.now,
            "cannot schedule an event at {at} before now ({})",
            self.now
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled { at, seq, event });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_pop_in_time_order() {
        let mut q = EventQueue::new();
        q.schedule_at(SimTime::from_micros(30), "c");
        q.schedule_at(SimTime::from_micros(10), "a");
        q.schedule_at(SimTime::from_micros(20), "b");

        let order: Vec<_> = std::iter::from_fn(|| q.pop().map(|(_, e)| e)).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn same_instant_events_are_fifo() {
        let mut q = EventQueue::new();
        let t = SimTime::from_micros(5);
        for i in 0..10 {
            q.schedule_at(t, i);
        }
        let order: Vec<_> = std::iter::from_fn(|| q.pop().map(|(_, e)| e)).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn pop_advances_now() {
        let mut q = EventQueue::new();
        q.schedule_in(Duration::from_micros(125), ());
        assert_eq!(q.now(), SimTime::ZERO);
        q.pop().unwrap();
        assert_eq!(q.now(), SimTime::from_micros(125));

        // relative scheduling is now anchored at 125 µs
        q.schedule_in(Duration::from_micros(125), ());
        assert_eq!(q.peek_time(), Some(SimTime::from_micros(250)));
    }

    #[test]
    #[should_panic(expected = "before now")]
    fn scheduling_in_the_past_panics() {
        let mut q = EventQueue::new();
        q.schedule_at(SimTime::from_micros(10), ());
        q.pop();
        q.schedule_at(SimTime::from_micros(5), ());
    }

    #[test]
    fn time_arithmetic() {
        let a = SimTime::from_micros(100);
        let b = a + Duration::from_micros(50);
        assert_eq!(b - a, Duration::from_micros(50));
        assert_eq!(a.saturating_since(b), Duration::ZERO);
    }
}
