/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! User-ordering policies for RBG assignment.
//!
//! A [`SchedulingPolicy`] is chosen when the allocator is built.  It supplies
//! the comparator used to order a beam's users before every RBG grant and
//! keeps its own per-user fields in [`UeMetrics`].
//!
//! | Policy | Metric | Order |
//! |---|---|---|
//! | `RoundRobin` | RBG-symbols granted this slot | ascending |
//! | `ProportionalFair` | `potential^α / max(1e-9, avg)` | descending |
//! | `DelayPriority` | `β × slots waited` | descending |
//!
//! The throughput average is an exponential moving average over
//! `time_window` slots, updated for the winner and for every loser of each
//! grant so comparisons within a slot stay consistent.

use std::cmp::Ordering;

use tracing::trace;

use crate::amc::Amc;
use crate::ue::{Direction, LinkState, UeContext};

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulingPolicy {
    RoundRobin,
    ProportionalFair { alpha: f64, time_window: f64 },
    /// Orders by `beta × slots waited` only.  `alpha` is unused by the
    /// comparator; `time_window` still drives the throughput average.
    DelayPriority { alpha: f64, time_window: f64, beta: f64 },
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        SchedulingPolicy::ProportionalFair {
            alpha: 1.0,
            time_window: 99.0,
        }
    }
}

/// Throughput bookkeeping of the proportional-fair family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PfMetrics {
    pub avg_tput: f64,
    pub last_avg_tput: f64,
    pub curr_tput: f64,
    pub potential_tput: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UeMetrics {
    RoundRobin,
    ProportionalFair(PfMetrics),
    DelayPriority { pf: PfMetrics, wait_slots: u64 },
}

impl UeMetrics {
    fn pf(&self) -> Option<&PfMetrics> {
        match self {
            UeMetrics::RoundRobin => None,
            UeMetrics::ProportionalFair(pf) | UeMetrics::DelayPriority { pf, .. } => Some(pf),
        }
    }

    fn pf_mut(&mut self) -> Option<&mut PfMetrics> {
        match self {
            UeMetrics::RoundRobin => None,
            UeMetrics::ProportionalFair(pf) | UeMetrics::DelayPriority { pf, .. } => Some(pf),
        }
    }

    pub fn wait_slots(&self) -> u64 {
        match self {
            UeMetrics::DelayPriority { wait_slots, .. } => *wait_slots,
            _ => 0,
        }
    }
}

/// What one grant iteration of a beam can hand out.
#[derive(Debug, Clone, Copy)]
pub struct GrantUnit<'a> {
    pub amc: &'a Amc,
    pub rb_per_rbg: u32,
    /// Symbols of the beam; one grant is one RBG over all of them.
    pub beam_sym: u32,
}

impl SchedulingPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulingPolicy::RoundRobin => "round_robin",
            SchedulingPolicy::ProportionalFair { .. } => "proportional_fair",
            SchedulingPolicy::DelayPriority { .. } => "delay_priority",
        }
    }

    pub fn new_metrics(&self) -> UeMetrics {
        match self {
            SchedulingPolicy::RoundRobin => UeMetrics::RoundRobin,
            SchedulingPolicy::ProportionalFair { .. } => UeMetrics::ProportionalFair(PfMetrics::default()),
            SchedulingPolicy::DelayPriority { .. } => UeMetrics::DelayPriority {
                pf: PfMetrics::default(),
                wait_slots: 0,
            },
        }
    }

    /// `Less` means `a` is served before `b`.
    pub fn compare(&self, dir: Direction, a: &UeContext, b: &UeContext) -> Ordering {
        let (la, lb) = (a.link(dir), b.link(dir));
        match self {
            SchedulingPolicy::RoundRobin => la.rbg.cmp(&lb.rbg),
            SchedulingPolicy::ProportionalFair { alpha, .. } => {
                pf_metric(lb, *alpha).total_cmp(&pf_metric(la, *alpha))
            }
            SchedulingPolicy::DelayPriority { beta, .. } => {
                let ma = beta * la.metrics.wait_slots() as f64;
                let mb = beta * lb.metrics.wait_slots() as f64;
                mb.total_cmp(&ma)
            }
        }
    }

    /// Scheduling trigger for a direction, for every user of the cell.
    pub fn on_slot_trigger(&self, link: &mut LinkState) {
        if let UeMetrics::DelayPriority { wait_slots, .. } = &mut link.metrics {
            *wait_slots += 1;
        }
    }

    /// Before the first grant of a beam.
    pub fn before_schedule(&self, link: &mut LinkState, unit: &GrantUnit<'_>) {
        let potential = potential_tput(link, unit);
        if let Some(pf) = link.metrics.pf_mut() {
            pf.last_avg_tput = pf.avg_tput;
            pf.curr_tput = 0.0;
            pf.potential_tput = potential;
        }
    }

    pub fn on_assigned(&self, link: &mut LinkState, unit: &GrantUnit<'_>) {
        self.update_average(link, unit);
        if let UeMetrics::DelayPriority { wait_slots, .. } = &mut link.metrics {
            *wait_slots = 0;
        }
    }

    pub fn on_not_assigned(&self, link: &mut LinkState, unit: &GrantUnit<'_>) {
        self.update_average(link, unit);
    }

    fn update_average(&self, link: &mut LinkState, unit: &GrantUnit<'_>) {
        let time_window = match self {
            SchedulingPolicy::RoundRobin => return,
            SchedulingPolicy::ProportionalFair { time_window, .. }
            | SchedulingPolicy::DelayPriority { time_window, .. } => time_window.max(1.0),
        };
        let curr = if link.sym > 0 {
            f64::from(link.tb_size) / f64::from(link.sym)
        } else {
            0.0
        };
        let potential = potential_tput(link, unit);
        if let Some(pf) = link.metrics.pf_mut() {
            pf.curr_tput = curr;
            pf.avg_tput = (1.0 - 1.0 / time_window) * pf.last_avg_tput + curr / time_window;
            pf.potential_tput = potential;
            trace!(avg = pf.avg_tput, curr, potential, "pf metrics");
        }
    }
}

/// Bytes per symbol one more RBG would carry at the user's MCS.
fn potential_tput(link: &LinkState, unit: &GrantUnit<'_>) -> f64 {
    if unit.beam_sym == 0 {
        return 0.0;
    }
    let tb = unit.amc.tb_size(link.mcs, link.rank, unit.beam_sym * unit.rb_per_rbg);
    f64::from(tb) / f64::from(unit.beam_sym)
}

fn pf_metric(link: &LinkState, alpha: f64) -> f64 {
    match link.metrics.pf() {
        Some(pf) => pf.potential_tput.powf(alpha) / pf.avg_tput.max(1e-9),
        None => 0.0,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
