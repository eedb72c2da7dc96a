/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-receiver interference and SINR bookkeeping.
//!
//! [`InterferenceAccumulator`] keeps the running sum of every signal that is
//! currently on the air at one receiver, the signal being decoded and the
//! noise floor.  Whenever the composition changes and simulated time has
//! moved since the last change, the segment that just closed is evaluated:
//!
//! ```text
//! interference = all_signals − rx_signal + noise
//! sinr         = rx_signal / interference
//! ```
//!
//! and handed, together with the segment duration, to the registered SINR,
//! interference and received-power [`ChunkProcessor`]s.
//!
//! The desired signal reaches the aggregate like any other signal, through
//! [`add_signal`](InterferenceAccumulator::add_signal); [`start_rx`]
//! additionally marks it as the one being decoded.
//!
//! # Stale removals
//! `add_signal` schedules an [`InterfererExpiry`] carrying a sequence number.
//! [`reset_noise_floor`] rebuilds the aggregate from zero and records the
//! current sequence number as a watermark; expiries at or below the watermark
//! are ignored when they fire.  When the counter wraps onto the watermark the
//! watermark is pushed `0x1000_0000` ahead, so the signed distance test keeps
//! rejecting pre-reset ids.
//!
//! [`start_rx`]: InterferenceAccumulator::start_rx
//! [`reset_noise_floor`]: InterferenceAccumulator::reset_noise_floor

pub mod chunk;

pub use chunk::{AveragingChunkProcessor, ChunkProcessor};

use std::time::Duration;

use tracing::{debug, info, trace};

use crate::sim::{EventScheduler, SimTime};
use crate::spectrum::SpectrumValue;

/// Watermark jump applied when the signal counter wraps onto it.
const WATERMARK_JUMP: u32 = 0x1000_0000;

/// Identifies a receiving endpoint within a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReceiverId(pub u32);

/// Scheduled removal of a signal from a receiver's aggregate.
#[derive(Debug, Clone)]
pub struct InterfererExpiry {
    pub receiver: ReceiverId,
    signal_id: u32,
    psd: SpectrumValue,
}

impl InterfererExpiry {
    pub fn signal_id(&self) -> u32 {
        self.signal_id
    }
}

// ── InterferenceAccumulator ───────────────────────────────────────────────────

pub struct InterferenceAccumulator {
    receiver: ReceiverId,
    receiving: bool,
    rx_signal: SpectrumValue,
    all_signals: SpectrumValue,
    noise: SpectrumValue,
    last_change: SimTime,
    last_signal_id: u32,
    last_signal_id_before_reset: u32,

    sinr_processors: Vec<Box<dyn ChunkProcessor>>,
    interference_processors: Vec<Box<dyn ChunkProcessor>>,
    rx_power_processors: Vec<Box<dyn ChunkProcessor>>,
}

impl InterferenceAccumulator {
    /// New idle receiver with `noise` as its floor.
    pub fn new(receiver: ReceiverId, noise: SpectrumValue, now: SimTime) -> Self {
        let mut acc = Self {
            receiver,
            receiving: false,
            rx_signal: SpectrumValue::zeros(noise.model()),
            all_signals: SpectrumValue::zeros(noise.model()),
            noise: noise.clone(),
            last_change: now,
            last_signal_id: 0,
            last_signal_id_before_reset: 0,
            sinr_processors: Vec::new(),
            interference_processors: Vec::new(),
            rx_power_processors: Vec::new(),
        };
        acc.reset_noise_floor(noise, now);
        acc
    }

    pub fn receiver(&self) -> ReceiverId {
        self.receiver
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// Sum of every signal currently on the air at this receiver.
    pub fn aggregate(&self) -> &SpectrumValue {
        &self.all_signals
    }

    pub fn noise(&self) -> &SpectrumValue {
        &self.noise
    }

    pub fn last_change(&self) -> SimTime {
        self.last_change
    }

    pub fn add_sinr_processor(&mut self, p: Box<dyn ChunkProcessor>) {
        self.sinr_processors.push(p);
    }

    pub fn add_interference_processor(&mut self, p: Box<dyn ChunkProcessor>) {
        self.interference_processors.push(p);
    }

    pub fn add_rx_power_processor(&mut self, p: Box<dyn ChunkProcessor>) {
        self.rx_power_processors.push(p);
    }

    // ── Reception ─────────────────────────────────────────────────────────────

    /// Start decoding `psd`.
    ///
    /// A second call while already receiving adds a simultaneous signal.
    ///
    /// # Panics
    /// * If a simultaneous signal arrives at a different instant than the
    ///   first one.
    /// * If a simultaneous signal shares any band with the signals already
    ///   being decoded.
    pub fn start_rx(&mut self, psd: &SpectrumValue, now: SimTime) {
        if !self.receiving {
            debug!(receiver = self.receiver.0, %now, "first signal");
            self.rx_signal = psd.clone();
            self.last_change = now;
            self.receiving = true;
            self.for_each_processor(|p| p.start());
        } else {
            trace!(receiver = self.receiver.0, %now, "additional signal");
            assert_eq!(
                self.last_change, now,
                "simultaneous signals must start at the same instant"
            );
            let overlap = (psd * &self.rx_signal).sum();
            assert!(
                overlap == 0.0,
                "simultaneous signals must use disjoint bands (overlap {overlap})"
            );
            self.rx_signal += psd;
        }
    }

    /// Close the reception: evaluate the last segment and end every processor.
    ///
    /// Idempotent: a call while idle only logs.
    pub fn end_rx(&mut self, now: SimTime) {
        if !self.receiving {
            info!(
                receiver = self.receiver.0,
                "end_rx was already evaluated or the reception was aborted"
            );
            return;
        }
        self.conditionally_evaluate_chunk(now);
        self.receiving = false;
        self.for_each_processor(|p| p.end());
    }

    // ── Signal composition ────────────────────────────────────────────────────

    /// Add `psd` to the aggregate for `duration`.  The matching removal is
    /// scheduled on `sched` and must be fed back through
    /// [`on_interferer_expired`](Self::on_interferer_expired).
    pub fn add_signal<S, E>(&mut self, psd: &SpectrumValue, duration: Duration, sched: &mut S) -> u32
    where
        S: EventScheduler<E>,
        E: From<InterfererExpiry>,
    {
        self.conditionally_evaluate_chunk(sched.now());
        self.all_signals += psd;

        self.last_signal_id = self.last_signal_id.wrapping_add(1);
        let signal_id = self.last_signal_id;
        if signal_id == self.last_signal_id_before_reset {
            // Enough signals went by since the last reset that no pre-reset
            // removal can still be pending; move the boundary along.
            self.last_signal_id_before_reset =
                self.last_signal_id_before_reset.wrapping_add(WATERMARK_JUMP);
        }

        sched.schedule_in(
            duration,
            E::from(InterfererExpiry {
                receiver: self.receiver,
                signal_id,
                psd: psd.clone(),
            }),
        );
        signal_id
    }

    /// Remove an expired signal from the aggregate unless it was added before
    /// the last noise-floor reset.
    pub fn on_interferer_expired(&mut self, expiry: InterfererExpiry, now: SimTime) {
        debug_assert_eq!(expiry.receiver, self.receiver);
        self.conditionally_evaluate_chunk(now);

        let delta = expiry.signal_id.wrapping_sub(self.last_signal_id_before_reset) as i32;
        if delta > 0 {
            self.all_signals -= &expiry.psd;
        } else {
            info!(
                receiver = self.receiver.0,
                signal_id = expiry.signal_id,
                "ignoring signal scheduled for subtraction before last reset"
            );
        }
    }

    /// Replace the noise floor.  Rebuilds the aggregate on the noise grid,
    /// aborts any reception and invalidates every pending removal.
    pub fn reset_noise_floor(&mut self, noise: SpectrumValue, now: SimTime) {
        self.conditionally_evaluate_chunk(now);
        self.all_signals = SpectrumValue::zeros(noise.model());
        self.noise = noise;
        if self.receiving {
            debug!(receiver = self.receiver.0, "noise reset aborts reception");
            self.receiving = false;
        }
        self.last_signal_id_before_reset = self.last_signal_id;
    }

    // ── Evaluation ────────────────────────────────────────────────────────────

    fn conditionally_evaluate_chunk(&mut self, now: SimTime) {
        if !self.receiving || now <= self.last_change {
            return;
        }
        let interference = &(&self.all_signals - &self.rx_signal) + &self.noise;
        let sinr = &self.rx_signal / &interference;
        let duration = now - self.last_change;
        trace!(
            receiver = self.receiver.0,
            duration_ns = duration.as_nanos() as u64,
            "evaluating chunk"
        );

        for p in &mut self.sinr_processors {
            p.evaluate_chunk(&sinr, duration);
        }
        for p in &mut self.interference_processors {
            p.evaluate_chunk(&interference, duration);
        }
        for p in &mut self.rx_power_processors {
            p.evaluate_chunk(&self.rx_signal, duration);
        }
        self.last_change = now;
    }

    fn for_each_processor(&mut self, mut f: impl FnMut(&mut dyn ChunkProcessor)) {
        for p in self
            .rx_power_processors
            .iter_mut()
            .chain(self.interference_processors.iter_mut())
            .chain(self.sinr_processors.iter_mut())
        {
            f(p.as_mut());
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::EventQueue;
    use crate::spectrum::{SpectrumModel, SpectrumModelCache};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    // ── Test helpers ──────────────────────────────────────────────────────────

    #[derive(Debug)]
    enum Ev {
        Expire(InterfererExpiry),
    }

    impl From<InterfererExpiry> for Ev {
        fn from(e: InterfererExpiry) -> Self {
            Ev::Expire(e)
        }
    }

    type Samples = Rc<RefCell<Vec<(Vec<f64>, Duration)>>>;

    /// Records every raw chunk it sees.
    struct Recorder {
        samples: Samples,
        starts: Rc<RefCell<u32>>,
        ends: Rc<RefCell<u32>>,
    }

    impl ChunkProcessor for Recorder {
        fn start(&mut self) {
            *self.starts.borrow_mut() += 1;
        }
        fn evaluate_chunk(&mut self, values: &SpectrumValue, duration: Duration) {
            self.samples.borrow_mut().push((values.values().to_vec(), duration));
        }
        fn end(&mut self) {
            *self.ends.borrow_mut() += 1;
        }
    }

    struct Probe {
        samples: Samples,
        starts: Rc<RefCell<u32>>,
        ends: Rc<RefCell<u32>>,
    }

    fn attach_sinr_probe(acc: &mut InterferenceAccumulator) -> Probe {
        let probe = Probe {
            samples: Rc::default(),
            starts: Rc::default(),
            ends: Rc::default(),
        };
        acc.add_sinr_processor(Box::new(Recorder {
            samples: Rc::clone(&probe.samples),
            starts: Rc::clone(&probe.starts),
            ends: Rc::clone(&probe.ends),
        }));
        probe
    }

    fn grid(num_rbs: u32) -> Arc<SpectrumModel> {
        SpectrumModelCache::new().get(num_rbs, 3.5e9, 30_000.0).unwrap()
    }

    fn until(q: &mut EventQueue<Ev>, acc: &mut InterferenceAccumulator, t: SimTime) {
        while q.peek_time().is_some_and(|at| at <= t) {
            let (now, Ev::Expire(e)) = q.pop().unwrap();
            acc.on_interferer_expired(e, now);
        }
    }

    // ── SINR scenarios ────────────────────────────────────────────────────────

    #[test]
    fn signal_equal_to_noise_gives_unit_sinr() {
        let m = grid(1);
        let n = 1e-20;
        let mut q: EventQueue<Ev> = EventQueue::new();
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, n), q.now());
        let probe = attach_sinr_probe(&mut acc);

        let s = SpectrumValue::filled(&m, n);
        acc.add_signal(&s, Duration::from_micros(500), &mut q);
        acc.start_rx(&s, q.now());
        acc.end_rx(SimTime::from_micros(500));

        let samples = probe.samples.borrow();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].0, vec![1.0]);
        assert_eq!(samples[0].1, Duration::from_micros(500));
    }

    #[test]
    fn interferer_lowers_sinr_only_while_active() {
        let m = grid(2);
        let n = 1e-20;
        let mut q: EventQueue<Ev> = EventQueue::new();
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, n), q.now());
        let probe = attach_sinr_probe(&mut acc);

        let s = SpectrumValue::filled(&m, 4.0 * n);
        acc.add_signal(&s, Duration::from_micros(300), &mut q);
        acc.start_rx(&s, q.now());

        // interferer equal to noise on band 0 only, for the first 100 µs
        let i = SpectrumValue::from_values(&m, vec![n, 0.0]);
        acc.add_signal(&i, Duration::from_micros(100), &mut q);

        until(&mut q, &mut acc, SimTime::from_micros(100));
        acc.end_rx(SimTime::from_micros(300));

        let samples = probe.samples.borrow();
        assert_eq!(samples.len(), 2, "one chunk per composition segment");
        assert_eq!(samples[0].1, Duration::from_micros(100));
        assert!((samples[0].0[0] - 2.0).abs() < 1e-12);
        assert!((samples[0].0[1] - 4.0).abs() < 1e-12);
        assert_eq!(samples[1].1, Duration::from_micros(200));
        assert!((samples[1].0[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn chunk_durations_cover_the_reception() {
        let m = grid(1);
        let mut q: EventQueue<Ev> = EventQueue::new();
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, 1.0), q.now());
        let probe = attach_sinr_probe(&mut acc);

        let s = SpectrumValue::filled(&m, 1.0);
        acc.add_signal(&s, Duration::from_micros(1_000), &mut q);
        acc.start_rx(&s, q.now());
        for k in [70u64, 160, 410] {
            acc.add_signal(&s, Duration::from_micros(k), &mut q);
        }
        until(&mut q, &mut acc, SimTime::from_micros(999));
        acc.end_rx(SimTime::from_micros(1_000));

        let total: Duration = probe.samples.borrow().iter().map(|(_, d)| *d).sum();
        assert_eq!(total, Duration::from_micros(1_000));
    }

    // ── end_rx idempotence ────────────────────────────────────────────────────

    #[test]
    fn end_rx_twice_dispatches_once() {
        let m = grid(1);
        let mut q: EventQueue<Ev> = EventQueue::new();
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, 1.0), q.now());
        let probe = attach_sinr_probe(&mut acc);

        let s = SpectrumValue::filled(&m, 1.0);
        acc.add_signal(&s, Duration::from_micros(10), &mut q);
        acc.start_rx(&s, q.now());
        acc.end_rx(SimTime::from_micros(10));
        acc.end_rx(SimTime::from_micros(10));
        acc.end_rx(SimTime::from_micros(20));

        assert_eq!(probe.samples.borrow().len(), 1);
        assert_eq!(*probe.starts.borrow(), 1);
        assert_eq!(*probe.ends.borrow(), 1);
        assert!(!acc.is_receiving());
    }

    // ── Simultaneous signals ──────────────────────────────────────────────────

    #[test]
    fn disjoint_simultaneous_signals_are_merged() {
        let m = grid(2);
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, 1.0), SimTime::ZERO);
        acc.start_rx(&SpectrumValue::from_values(&m, vec![1.0, 0.0]), SimTime::ZERO);
        acc.start_rx(&SpectrumValue::from_values(&m, vec![0.0, 2.0]), SimTime::ZERO);
        assert_eq!(acc.rx_signal.values(), &[1.0, 2.0]);
    }

    #[test]
    #[should_panic(expected = "disjoint bands")]
    fn overlapping_simultaneous_signals_panic() {
        let m = grid(2);
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, 1.0), SimTime::ZERO);
        acc.start_rx(&SpectrumValue::from_values(&m, vec![1.0, 0.0]), SimTime::ZERO);
        acc.start_rx(&SpectrumValue::from_values(&m, vec![1.0, 1.0]), SimTime::ZERO);
    }

    #[test]
    #[should_panic(expected = "same instant")]
    fn late_simultaneous_signal_panics() {
        let m = grid(2);
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, 1.0), SimTime::ZERO);
        acc.start_rx(&SpectrumValue::from_values(&m, vec![1.0, 0.0]), SimTime::ZERO);
        acc.start_rx(&SpectrumValue::from_values(&m, vec![0.0, 1.0]), SimTime::from_micros(1));
    }

    // ── Noise reset & stale removals ──────────────────────────────────────────

    #[test]
    fn removals_scheduled_before_reset_are_ignored() {
        let m = grid(1);
        let mut q: EventQueue<Ev> = EventQueue::new();
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, 1.0), q.now());

        let stale = SpectrumValue::filled(&m, 5.0);
        acc.add_signal(&stale, Duration::from_micros(100), &mut q);
        acc.reset_noise_floor(SpectrumValue::filled(&m, 2.0), q.now());
        assert_eq!(acc.aggregate().sum(), 0.0);

        let fresh = SpectrumValue::filled(&m, 3.0);
        acc.add_signal(&fresh, Duration::from_micros(200), &mut q);

        until(&mut q, &mut acc, SimTime::from_micros(100));
        assert_eq!(acc.aggregate().sum(), 3.0, "stale removal must not subtract");

        until(&mut q, &mut acc, SimTime::from_micros(200));
        assert_eq!(acc.aggregate().sum(), 0.0);
    }

    #[test]
    fn reset_aborts_reception() {
        let m = grid(1);
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, 1.0), SimTime::ZERO);
        let probe = attach_sinr_probe(&mut acc);
        acc.start_rx(&SpectrumValue::filled(&m, 1.0), SimTime::ZERO);
        acc.reset_noise_floor(SpectrumValue::filled(&m, 1.0), SimTime::from_micros(50));
        assert!(!acc.is_receiving());

        // the aborted reception's segment was still evaluated once
        assert_eq!(probe.samples.borrow().len(), 1);
        acc.end_rx(SimTime::from_micros(60));
        assert_eq!(*probe.ends.borrow(), 0, "aborted reception is not ended");
    }

    #[test]
    fn reset_switches_grid() {
        let mut cache = SpectrumModelCache::new();
        let m1 = cache.get(1, 3.5e9, 30_000.0).unwrap();
        let m2 = cache.get(4, 3.5e9, 30_000.0).unwrap();
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m1, 1.0), SimTime::ZERO);
        acc.reset_noise_floor(SpectrumValue::filled(&m2, 1.0), SimTime::ZERO);
        assert_eq!(acc.aggregate().len(), 4);
    }

    #[test]
    fn watermark_jumps_when_counter_wraps_onto_it() {
        let m = grid(1);
        let mut q: EventQueue<Ev> = EventQueue::new();
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, 1.0), q.now());

        // pretend a reset happened at id 5 and the counter has since wrapped
        acc.last_signal_id_before_reset = 5;
        acc.last_signal_id = 4;
        let id = acc.add_signal(&SpectrumValue::filled(&m, 1.0), Duration::from_micros(1), &mut q);
        assert_eq!(id, 5);
        assert_eq!(acc.last_signal_id_before_reset, 5 + WATERMARK_JUMP);

        // the freshly added signal is behind the moved watermark and its
        // removal is ignored, like every id of the previous epoch
        until(&mut q, &mut acc, SimTime::from_micros(1));
        assert_eq!(acc.aggregate().sum(), 1.0);
    }

    #[test]
    fn wrapping_ids_after_reset_are_still_removed() {
        let m = grid(1);
        let mut q: EventQueue<Ev> = EventQueue::new();
        let mut acc = InterferenceAccumulator::new(ReceiverId(1), SpectrumValue::filled(&m, 1.0), q.now());

        acc.last_signal_id = u32::MAX - 1;
        acc.reset_noise_floor(SpectrumValue::filled(&m, 1.0), q.now());
        for _ in 0..3 {
            acc.add_signal(&SpectrumValue::filled(&m, 1.0), Duration::from_micros(1), &mut q);
        }
        until(&mut q, &mut acc, SimTime::from_micros(1));
        assert_eq!(acc.aggregate().sum(), 0.0, "ids past the wrap are newer than the watermark");
    }
}
