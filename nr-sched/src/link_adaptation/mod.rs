/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Closed-loop link adaptation.
//!
//! [`LinkAdaptation`] is the per-cell context that owns every attached user's
//! recent-error windows and outcome statistics.  It turns CQI reports into an
//! MCS and corrects that MCS with the observed block-error rate:
//!
//! ```text
//! e     = bler − target
//! delta = clamp(round(e × step_scale), −max_step, +max_step)
//! bler > target        → mcs = max(0, mcs − delta)
//! bler < low_threshold → mcs = min(upper, mcs − delta)
//! mcs  = clamp(mcs, 0, ceiling)
//! ```
//!
//! where `upper` is the smaller of the direction ceiling and the MCS the
//! reported CQI supports.
//!
//! # CQI lifecycle per direction
//!
//! | State | On report | On refresh |
//! |---|---|---|
//! | `Uninitialized` | seed MCS from CQI, → `Tracking` | force start MCS |
//! | `Tracking { n }` | correct MCS, restart timer | `n − 1`, or → `Fallback` at 0 |
//! | `Fallback` | seed MCS from CQI, → `Tracking` | force start MCS |

pub mod bler;

pub use bler::RecentErrorWindow;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::amc::{Amc, MAX_MCS};
use crate::channel::PrecodingMatrix;
use crate::ue::{CellId, CqiState, CqiType, Direction, Rnti, UeContext};

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct LinkAdaptationConfig {
    pub target_bler: f64,
    pub low_bler_threshold: f64,
    pub step_scale: f64,
    pub max_step: i32,
    pub window_capacity: usize,
    /// Slots a CQI report stays valid.
    pub cqi_validity_slots: u32,
    pub start_mcs_dl: u8,
    pub start_mcs_ul: u8,
    pub max_mcs_dl: u8,
    pub max_mcs_ul: u8,
}

impl Default for LinkAdaptationConfig {
    fn default() -> Self {
        Self {
            target_bler: 0.1,
            low_bler_threshold: 0.02,
            step_scale: 10.0,
            max_step: 2,
            window_capacity: bler::DEFAULT_WINDOW_CAPACITY,
            cqi_validity_slots: 1000,
            start_mcs_dl: 0,
            start_mcs_ul: 0,
            max_mcs_dl: MAX_MCS,
            max_mcs_ul: 27,
        }
    }
}

impl LinkAdaptationConfig {
    pub fn start_mcs(&self, dir: Direction) -> u8 {
        match dir {
            Direction::Downlink => self.start_mcs_dl,
            Direction::Uplink => self.start_mcs_ul,
        }
    }

    pub fn max_mcs(&self, dir: Direction) -> u8 {
        match dir {
            Direction::Downlink => self.max_mcs_dl,
            Direction::Uplink => self.max_mcs_ul,
        }
        .min(MAX_MCS)
    }
}

// ── Reports ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DlCqiKind {
    Wideband { cqi: u8 },
    /// Per-RB SINR (linear) measured over the last reception.
    Subband { sinr: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DlCqiReport {
    pub kind: DlCqiKind,
    pub rank: Option<u8>,
    pub precoding: Option<Arc<PrecodingMatrix>>,
}

impl DlCqiReport {
    pub fn wideband(cqi: u8) -> Self {
        Self {
            kind: DlCqiKind::Wideband { cqi },
            rank: None,
            precoding: None,
        }
    }

    pub fn subband(sinr: Vec<f64>) -> Self {
        Self {
            kind: DlCqiKind::Subband { sinr },
            rank: None,
            precoding: None,
        }
    }
}

/// Zero every RB of `sinr` that lies in an RBG the user was not granted.
pub fn mask_uplink_sinr(sinr: &[f64], rbg_bitmap: &[bool], rb_per_rbg: usize) -> Vec<f64> {
    sinr.iter()
        .enumerate()
        .map(|(rb, &s)| {
            let granted = rb_per_rbg > 0 && rbg_bitmap.get(rb / rb_per_rbg).copied().unwrap_or(false);
            if granted {
                s
            } else {
                0.0
            }
        })
        .collect()
}

// ── Statistics ────────────────────────────────────────────────────────────────

/// Transport-block outcome counters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlerStats {
    pub total_tb: u64,
    pub corrupted_tb: u64,
    pub mcs_sum: u64,
    pub tbler_sum: f64,
    pub rb_sum: u64,
}

impl BlerStats {
    pub fn record(&mut self, corrupted: bool, mcs: u8, tbler: f64, num_rb: u32) {
        self.total_tb += 1;
        if corrupted {
            self.corrupted_tb += 1;
        }
        self.mcs_sum += u64::from(mcs);
        self.tbler_sum += tbler;
        self.rb_sum += u64::from(num_rb);
    }

    pub fn bler(&self) -> f64 {
        ratio(self.corrupted_tb as f64, self.total_tb)
    }

    pub fn mean_mcs(&self) -> f64 {
        ratio(self.mcs_sum as f64, self.total_tb)
    }

    pub fn mean_tbler(&self) -> f64 {
        ratio(self.tbler_sum, self.total_tb)
    }

    pub fn mean_rb(&self) -> f64 {
        ratio(self.rb_sum as f64, self.total_tb)
    }

    pub fn merge(&mut self, other: &BlerStats) {
        self.total_tb += other.total_tb;
        self.corrupted_tb += other.corrupted_tb;
        self.mcs_sum += other.mcs_sum;
        self.tbler_sum += other.tbler_sum;
        self.rb_sum += other.rb_sum;
    }
}

fn ratio(num: f64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num / den as f64
    }
}

// ── LinkAdaptation ────────────────────────────────────────────────────────────

pub struct LinkAdaptation {
    cell_id: CellId,
    config: LinkAdaptationConfig,
    amc: Amc,
    windows: BTreeMap<(Rnti, Direction), RecentErrorWindow>,
    ue_stats: BTreeMap<(Rnti, Direction), BlerStats>,
    cell_stats: BTreeMap<Direction, BlerStats>,
}

impl LinkAdaptation {
    pub fn new(cell_id: CellId, config: LinkAdaptationConfig, amc: Amc) -> Self {
        Self {
            cell_id,
            config,
            amc,
            windows: BTreeMap::new(),
            ue_stats: BTreeMap::new(),
            cell_stats: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &LinkAdaptationConfig {
        &self.config
    }

    pub fn amc(&self) -> &Amc {
        &self.amc
    }

    // ── Attach / detach ───────────────────────────────────────────────────────

    pub fn attach(&mut self, rnti: Rnti) {
        let capacity = self.config.window_capacity;
        for dir in Direction::BOTH {
            self.windows
                .entry((rnti, dir))
                .or_insert_with(|| RecentErrorWindow::new(capacity));
            self.ue_stats.entry((rnti, dir)).or_default();
        }
        debug!(cell = self.cell_id, rnti, "link adaptation context attached");
    }

    pub fn detach(&mut self, rnti: Rnti) {
        for dir in Direction::BOTH {
            self.windows.remove(&(rnti, dir));
            self.ue_stats.remove(&(rnti, dir));
        }
        debug!(cell = self.cell_id, rnti, "link adaptation context detached");
    }

    pub fn is_attached(&self, rnti: Rnti) -> bool {
        self.windows.contains_key(&(rnti, Direction::Downlink))
    }

    // ── Outcomes ──────────────────────────────────────────────────────────────

    /// Feed one decoded transport block back into the loop.
    pub fn record_outcome(&mut self, rnti: Rnti, dir: Direction, corrupted: bool, mcs: u8, tbler: f64, num_rb: u32) {
        let Some(window) = self.windows.get_mut(&(rnti, dir)) else {
            warn!(cell = self.cell_id, rnti, %dir, "outcome for a detached user dropped");
            return;
        };
        window.push(corrupted);
        self.ue_stats
            .entry((rnti, dir))
            .or_default()
            .record(corrupted, mcs, tbler, num_rb);
        self.cell_stats
            .entry(dir)
            .or_default()
            .record(corrupted, mcs, tbler, num_rb);
    }

    /// Recent block-error rate, `None` if the user is not attached.
    pub fn error_rate(&self, rnti: Rnti, dir: Direction) -> Option<f64> {
        self.windows.get(&(rnti, dir)).map(RecentErrorWindow::error_rate)
    }

    pub fn ue_stats(&self, rnti: Rnti, dir: Direction) -> Option<&BlerStats> {
        self.ue_stats.get(&(rnti, dir))
    }

    pub fn cell_stats(&self, dir: Direction) -> BlerStats {
        self.cell_stats.get(&dir).copied().unwrap_or_default()
    }

    // ── CQI handling ──────────────────────────────────────────────────────────

    /// Once per slot and direction: age the stored CQI.
    pub fn refresh(&self, ue: &mut UeContext, dir: Direction) {
        let start_mcs = self.config.start_mcs(dir);
        let rnti = ue.rnti;
        let link = ue.link_mut(dir);
        match link.cqi.state {
            CqiState::Tracking { remaining } if remaining > 0 => {
                link.cqi.state = CqiState::Tracking {
                    remaining: remaining - 1,
                };
                return;
            }
            CqiState::Tracking { .. } => {
                info!(cell = self.cell_id, rnti, %dir, start_mcs, "CQI expired, falling back");
                link.cqi.state = CqiState::Fallback;
            }
            CqiState::Uninitialized | CqiState::Fallback => {}
        }
        // lowest level still worth a transmission attempt
        link.cqi.wb_cqi = 1;
        link.cqi.cqi_type = CqiType::Wideband;
        link.mcs = start_mcs;
    }

    /// # Panics
    /// If the report carries a precoder without a positive rank or a rank
    /// without a precoder.
    pub fn dl_cqi_reported(&self, ue: &mut UeContext, report: DlCqiReport) {
        let (cqi_type, cqi, cqi_mcs) = match &report.kind {
            DlCqiKind::Wideband { cqi } => (CqiType::Wideband, *cqi, self.amc.mcs_from_cqi(*cqi)),
            DlCqiKind::Subband { sinr } => {
                let (cqi, mcs) = self.amc.wideband_feedback(sinr);
                (CqiType::Subband, cqi, mcs)
            }
        };
        self.apply_report(ue, Direction::Downlink, cqi_type, cqi, cqi_mcs);

        match (report.precoding, report.rank) {
            (Some(pm), Some(rank)) => {
                assert!(rank > 0, "precoding matrix reported with rank 0");
                ue.dl.rank = rank;
                ue.dl.precoding = Some(pm);
            }
            (None, None) => {}
            (Some(_), None) => panic!("precoding matrix reported without a rank"),
            (None, Some(_)) => panic!("rank reported without a precoding matrix"),
        }
    }

    /// Uplink SINR measured by the cell over the RBs the user transmitted on.
    /// Callers mask it with [`mask_uplink_sinr`] first.
    pub fn ul_cqi_reported(&self, ue: &mut UeContext, sinr: &[f64]) {
        let (cqi, cqi_mcs) = self.amc.wideband_feedback(sinr);
        self.apply_report(ue, Direction::Uplink, CqiType::Subband, cqi, cqi_mcs);
    }

    fn apply_report(&self, ue: &mut UeContext, dir: Direction, cqi_type: CqiType, cqi: u8, cqi_mcs: u8) {
        let ceiling = self.config.max_mcs(dir);
        let upper = ceiling.min(cqi_mcs);
        let bler = match self.error_rate(ue.rnti, dir) {
            Some(b) => b,
            None => {
                warn!(cell = self.cell_id, rnti = ue.rnti, %dir, "no BLER history");
                0.0
            }
        };

        let validity = self.config.cqi_validity_slots;
        let rnti = ue.rnti;
        let link = ue.link_mut(dir);
        let previous = link.mcs;
        if !matches!(link.cqi.state, CqiState::Tracking { .. }) {
            link.mcs = upper;
        }
        link.mcs = self.corrected_mcs(link.mcs, bler, upper, ceiling);
        link.cqi.cqi_type = cqi_type;
        link.cqi.wb_cqi = cqi;
        link.cqi.state = CqiState::Tracking {
            remaining: validity,
        };

        debug!(
            cell = self.cell_id,
            rnti,
            %dir,
            cqi,
            bler,
            from = previous,
            to = link.mcs,
            "MCS updated"
        );
    }

    fn corrected_mcs(&self, mcs: u8, bler: f64, upper: u8, ceiling: u8) -> u8 {
        let cfg = &self.config;
        let e = bler - cfg.target_bler;
        let delta = ((e * cfg.step_scale).round() as i32).clamp(-cfg.max_step, cfg.max_step);

        let mut next = i32::from(mcs);
        if bler > cfg.target_bler {
            next = (next - delta).max(0);
        } else if bler < cfg.low_bler_threshold {
            next = (next - delta).min(i32::from(upper));
        }
        next.clamp(0, i32::from(ceiling)) as u8
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::policy::UeMetrics;
    use crate::ue::{BeamId, LinkState};
    use num_complex::Complex64;

    // ── Test helpers ──────────────────────────────────────────────────────────

    fn la() -> LinkAdaptation {
        let mut la = LinkAdaptation::new(1, LinkAdaptationConfig::default(), Amc::default());
        la.attach(7);
        la
    }

    fn ue() -> UeContext {
        UeContext::new(
            1,
            7,
            BeamId(0),
            LinkState::new(0, UeMetrics::RoundRobin),
            LinkState::new(0, UeMetrics::RoundRobin),
        )
    }

    fn feed(la: &mut LinkAdaptation, dir: Direction, pattern: &[bool]) {
        for &c in pattern {
            la.record_outcome(7, dir, c, 10, 0.0, 4);
        }
    }

    /// Saturate the window with `bad` corrupted blocks out of 50.
    fn feed_rate(la: &mut LinkAdaptation, dir: Direction, bad: usize) {
        la.windows.get_mut(&(7, dir)).unwrap().clear();
        for i in 0..50 {
            la.record_outcome(7, dir, i < bad, 10, 0.0, 4);
        }
    }

    // ── First report ──────────────────────────────────────────────────────────

    #[test]
    fn first_report_seeds_mcs_from_cqi() {
        let la = la();
        let mut ue = ue();
        la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(9));
        assert_eq!(ue.dl.mcs, la.amc().mcs_from_cqi(9));
        assert_eq!(ue.dl.cqi.wb_cqi, 9);
        assert_eq!(ue.dl.cqi.state, CqiState::Tracking { remaining: 1000 });
    }

    #[test]
    fn dl_subband_report_uses_weakest_band() {
        let la = la();
        let mut ue = ue();
        la.dl_cqi_reported(&mut ue, DlCqiReport::subband(vec![0.0, 100.0, 3.0, 100.0]));
        let (cqi, mcs) = la.amc().wideband_feedback(&[3.0]);
        assert_eq!(ue.dl.cqi.cqi_type, CqiType::Subband);
        assert_eq!(ue.dl.cqi.wb_cqi, cqi);
        assert_eq!(ue.dl.mcs, mcs);
    }

    // ── BLER correction ───────────────────────────────────────────────────────

    #[test]
    fn high_bler_steps_mcs_down_by_at_most_two() {
        let mut la = la();
        let mut ue = ue();
        la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(15));
        let start = ue.dl.mcs;

        feed(&mut la, Direction::Downlink, &[true; 50]);
        la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(15));
        assert_eq!(ue.dl.mcs, start - 2, "100% BLER → delta clamped to 2");
    }

    #[test]
    fn moderate_bler_holds_mcs() {
        let mut la = la();
        let mut ue = ue();
        la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(12));
        ue.dl.mcs = 10;
        feed_rate(&mut la, Direction::Downlink, 3); // 6%
        la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(12));
        assert_eq!(ue.dl.mcs, 10);
    }

    #[test]
    fn low_bler_steps_up_to_cqi_ceiling() {
        let mut la = la();
        let mut ue = ue();
        la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(10));
        let cqi_mcs = la.amc().mcs_from_cqi(10);
        ue.dl.mcs = cqi_mcs - 3;

        feed(&mut la, Direction::Downlink, &[false; 50]);
        for _ in 0..5 {
            la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(10));
        }
        assert_eq!(ue.dl.mcs, cqi_mcs, "climbs one step per report and stops at the CQI mcs");
    }

    #[test]
    fn mcs_response_is_non_increasing_in_error_rate() {
        let mut results = Vec::new();
        for bad in [0usize, 1, 3, 7, 10, 15, 25, 40, 50] {
            let mut la = la();
            let mut ue = ue();
            la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(12));
            ue.dl.mcs = 12;
            feed_rate(&mut la, Direction::Downlink, bad);
            la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(12));
            results.push(ue.dl.mcs);
        }
        assert!(results.windows(2).all(|w| w[1] <= w[0]), "{results:?}");
    }

    #[test]
    fn low_bler_never_lowers_mcs_below_ceiling() {
        let mut la = la();
        let mut ue = ue();
        la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(8));
        let cqi_mcs = la.amc().mcs_from_cqi(8);
        feed(&mut la, Direction::Downlink, &[false; 50]);
        for mcs in 0..=cqi_mcs {
            ue.dl.mcs = mcs;
            la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(8));
            assert!(ue.dl.mcs >= mcs);
        }
    }

    #[test]
    fn uplink_respects_direction_ceiling() {
        let la = la();
        let mut ue = ue();
        la.ul_cqi_reported(&mut ue, &[1e6, 1e6]);
        assert_eq!(ue.ul.mcs, 27);
    }

    // ── Refresh ───────────────────────────────────────────────────────────────

    #[test]
    fn expired_cqi_falls_back_to_start_mcs() {
        let cfg = LinkAdaptationConfig {
            cqi_validity_slots: 2,
            start_mcs_dl: 3,
            ..Default::default()
        };
        let mut la = LinkAdaptation::new(1, cfg, Amc::default());
        la.attach(7);
        let mut ue = ue();
        la.dl_cqi_reported(&mut ue, DlCqiReport::wideband(12));
        let tracked = ue.dl.mcs;

        la.refresh(&mut ue, Direction::Downlink);
        la.refresh(&mut ue, Direction::Downlink);
        assert_eq!(ue.dl.mcs, tracked, "still valid");
        assert_eq!(ue.dl.cqi.state, CqiState::Tracking { remaining: 0 });

        la.refresh(&mut ue, Direction::Downlink);
        assert_eq!(ue.dl.cqi.state, CqiState::Fallback);
        assert_eq!(ue.dl.cqi.wb_cqi, 1);
        assert_eq!(ue.dl.mcs, 3);
    }

    #[test]
    fn uninitialized_user_transmits_at_start_mcs() {
        let cfg = LinkAdaptationConfig {
            start_mcs_ul: 4,
            ..Default::default()
        };
        let la = LinkAdaptation::new(1, cfg, Amc::default());
        let mut ue = ue();
        ue.ul.mcs = 20;
        la.refresh(&mut ue, Direction::Uplink);
        assert_eq!(ue.ul.mcs, 4);
        assert_eq!(ue.ul.cqi.state, CqiState::Uninitialized);
    }

    // ── Rank / precoding ──────────────────────────────────────────────────────

    #[test]
    fn precoding_with_rank_is_taken_verbatim() {
        let la = la();
        let mut ue = ue();
        let pm = Arc::new(PrecodingMatrix::new(2, vec![Complex64::new(1.0, 0.0); 4]));
        let mut report = DlCqiReport::wideband(10);
        report.rank = Some(2);
        report.precoding = Some(Arc::clone(&pm));
        la.dl_cqi_reported(&mut ue, report);
        assert_eq!(ue.dl.rank, 2);
        assert_eq!(ue.dl.precoding.as_deref(), Some(pm.as_ref()));
    }

    #[test]
    #[should_panic(expected = "without a rank")]
    fn precoding_without_rank_panics() {
        let la = la();
        let mut ue = ue();
        let mut report = DlCqiReport::wideband(10);
        report.precoding = Some(Arc::new(PrecodingMatrix::new(1, vec![Complex64::new(1.0, 0.0)])));
        la.dl_cqi_reported(&mut ue, report);
    }

    #[test]
    #[should_panic(expected = "without a precoding matrix")]
    fn rank_without_precoding_panics() {
        let la = la();
        let mut ue = ue();
        let mut report = DlCqiReport::wideband(10);
        report.rank = Some(1);
        la.dl_cqi_reported(&mut ue, report);
    }

    // ── Windows & statistics ──────────────────────────────────────────────────

    #[test]
    fn detach_drops_history() {
        let mut la = la();
        feed(&mut la, Direction::Uplink, &[true, false]);
        assert_eq!(la.error_rate(7, Direction::Uplink), Some(0.5));
        la.detach(7);
        assert_eq!(la.error_rate(7, Direction::Uplink), None);
        la.record_outcome(7, Direction::Uplink, true, 1, 0.0, 1);
        assert!(!la.is_attached(7));
    }

    #[test]
    fn statistics_accumulate_per_user_and_cell() {
        let mut la = la();
        la.attach(8);
        la.record_outcome(7, Direction::Downlink, true, 10, 0.5, 4);
        la.record_outcome(7, Direction::Downlink, false, 12, 0.1, 8);
        la.record_outcome(8, Direction::Downlink, false, 20, 0.0, 2);

        let s7 = la.ue_stats(7, Direction::Downlink).unwrap();
        assert_eq!(s7.total_tb, 2);
        assert_eq!(s7.bler(), 0.5);
        assert_eq!(s7.mean_mcs(), 11.0);
        assert_eq!(s7.mean_rb(), 6.0);

        let cell = la.cell_stats(Direction::Downlink);
        assert_eq!(cell.total_tb, 3);
        assert_eq!(cell.corrupted_tb, 1);
        assert_eq!(la.cell_stats(Direction::Uplink).total_tb, 0);
    }

    #[test]
    fn uplink_mask_keeps_granted_rbgs_only() {
        let sinr = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let masked = mask_uplink_sinr(&sinr, &[false, true, false], 2);
        assert_eq!(masked, vec![0.0, 0.0, 3.0, 4.0, 0.0, 0.0]);
    }
}
