/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! OFDMA resource allocator.
//!
//! [`OfdmaScheduler`] turns the set of users with pending data into one
//! [`ResourceGrant`] per served user, independently per direction:
//!
//! 1. **Symbols per beam.**  The slot's symbols are split across beams in
//!    proportion to the beams' backlog; the remainder goes one symbol at a
//!    time to the backlogged beam holding the fewest.
//! 2. **RBGs within a beam.**  Repeatedly order the beam's users with the
//!    [`SchedulingPolicy`] comparator (stable sort) and give one RBG over all
//!    of the beam's symbols to the first user that is not yet satisfied and
//!    not capped by the fronthaul.  Stop when the RBGs run out or nobody is
//!    eligible.
//! 3. **Fronthaul.**  Optionally cap MCS, then revoke allocations that do
//!    not fit the link, in shuffled order.
//! 4. **Encoding.**  [`GrantEncoder`] builds each user's bitmap and
//!    transport block.
//!
//! All maps are `BTreeMap`s so a run is reproducible for a given seed.

pub mod error;
pub mod fronthaul;
pub mod grant;
pub mod policy;

pub use error::SchedulerError;
pub use fronthaul::{FhControlMethod, FronthaulCapacity, FronthaulControl};
pub use grant::{GrantEncoder, PointInFtPlane, ResourceGrant};
pub use policy::{SchedulingPolicy, UeMetrics};

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, trace};

use crate::amc::Amc;
use crate::ue::{BeamId, Direction, Rnti, UeContext};

use policy::GrantUnit;

/// Floor of the fronthaul RBG cap, in RBGs per user.
const MIN_FH_RBGS_PER_UE: u32 = 5;

// ── Types ─────────────────────────────────────────────────────────────────────

/// A user with data pending in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveUe {
    pub rnti: Rnti,
    pub backlog: u32,
}

/// Users with pending data, grouped by beam.
pub type ActiveUeMap = BTreeMap<BeamId, Vec<ActiveUe>>;

/// Every attached user of a cell.
pub type UeMap = BTreeMap<Rnti, UeContext>;

/// Build the active map of `dir` from the users' backlogs.
pub fn active_ue_map(ues: &UeMap, dir: Direction) -> ActiveUeMap {
    let mut map = ActiveUeMap::new();
    for ue in ues.values() {
        let backlog = ue.link(dir).backlog;
        if backlog > 0 {
            map.entry(ue.beam).or_default().push(ActiveUe {
                rnti: ue.rnti,
                backlog,
            });
        }
    }
    map
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub policy: SchedulingPolicy,
    pub num_rbs: u32,
    pub rb_per_rbg: u32,
    pub symbols_per_slot: u32,
    pub dl_notch_mask: Option<Vec<bool>>,
    pub ul_notch_mask: Option<Vec<bool>>,
    pub shuffle_seed: u64,
}

// ── OfdmaScheduler ────────────────────────────────────────────────────────────

pub struct OfdmaScheduler {
    policy: SchedulingPolicy,
    amc: Amc,
    rb_per_rbg: u32,
    num_rbg: usize,
    symbols_per_slot: u32,
    dl_notch_mask: Option<Vec<bool>>,
    ul_notch_mask: Option<Vec<bool>>,
    fronthaul: Option<Box<dyn FronthaulControl + Send>>,
    rng: StdRng,
}

impl OfdmaScheduler {
    /// # Errors
    /// Any [`SchedulerError`] configuration variant.
    pub fn new(config: SchedulerConfig, amc: Amc) -> Result<Self, SchedulerError> {
        if config.symbols_per_slot == 0 {
            return Err(SchedulerError::ZeroSymbolsPerSlot);
        }
        if config.rb_per_rbg == 0 {
            return Err(SchedulerError::ZeroRbPerRbg);
        }
        let num_rbg = (config.num_rbs / config.rb_per_rbg) as usize;
        if num_rbg == 0 {
            return Err(SchedulerError::NoRbg {
                num_rbs: config.num_rbs,
                rb_per_rbg: config.rb_per_rbg,
            });
        }
        for (direction, mask) in [
            (Direction::Downlink, &config.dl_notch_mask),
            (Direction::Uplink, &config.ul_notch_mask),
        ] {
            if let Some(mask) = mask {
                if mask.len() != num_rbg {
                    return Err(SchedulerError::NotchMaskLength {
                        direction,
                        expected: num_rbg,
                        actual: mask.len(),
                    });
                }
                if !mask.iter().any(|&b| b) {
                    return Err(SchedulerError::NotchMaskEmpty { direction });
                }
            }
        }

        info!(
            policy = config.policy.name(),
            num_rbg,
            rb_per_rbg = config.rb_per_rbg,
            symbols = config.symbols_per_slot,
            "OFDMA scheduler ready"
        );

        Ok(Self {
            policy: config.policy,
            amc,
            rb_per_rbg: config.rb_per_rbg,
            num_rbg,
            symbols_per_slot: config.symbols_per_slot,
            dl_notch_mask: config.dl_notch_mask,
            ul_notch_mask: config.ul_notch_mask,
            fronthaul: None,
            rng: StdRng::seed_from_u64(config.shuffle_seed),
        })
    }

    pub fn with_fronthaul(mut self, fh: Box<dyn FronthaulControl + Send>) -> Self {
        self.fronthaul = Some(fh);
        self
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    pub fn rb_per_rbg(&self) -> u32 {
        self.rb_per_rbg
    }

    pub fn num_rbg(&self) -> usize {
        self.num_rbg
    }

    pub fn symbols_per_slot(&self) -> u32 {
        self.symbols_per_slot
    }

    fn notch_mask(&self, dir: Direction) -> Option<&[bool]> {
        match dir {
            Direction::Downlink => self.dl_notch_mask.as_deref(),
            Direction::Uplink => self.ul_notch_mask.as_deref(),
        }
    }

    /// RBGs the allocator may hand out in `dir`.
    pub fn rbg_resources(&self, dir: Direction) -> u32 {
        match self.notch_mask(dir) {
            Some(mask) => mask.iter().filter(|&&b| b).count() as u32,
            None => self.num_rbg as u32,
        }
    }

    /// Scheduling trigger: every attached user, served or not.
    pub fn on_slot_trigger(&self, dir: Direction, ues: &mut UeMap) {
        for ue in ues.values_mut() {
            self.policy.on_slot_trigger(ue.link_mut(dir));
        }
    }

    /// Release fronthaul reservations of the previous slot.
    pub fn start_slot(&mut self) {
        if let Some(fh) = self.fronthaul.as_mut() {
            fh.reset_slot();
        }
    }

    // ── Phase A: symbols per beam ─────────────────────────────────────────────

    /// Split `sym_avail` symbols across the beams of `active`.
    ///
    /// # Errors
    /// [`SchedulerError::ZeroBacklog`] when symbols are available but the
    /// beams carry no backlog at all.
    pub fn sym_per_beam(
        &self,
        sym_avail: u32,
        active: &ActiveUeMap,
    ) -> Result<BTreeMap<BeamId, u32>, SchedulerError> {
        let backlog: BTreeMap<BeamId, u64> = active
            .iter()
            .map(|(beam, ues)| (*beam, ues.iter().map(|u| u64::from(u.backlog)).sum()))
            .collect();
        let total: u64 = backlog.values().sum();

        let mut out: BTreeMap<BeamId, u32> = backlog.keys().map(|b| (*b, 0)).collect();
        if active.is_empty() || sym_avail == 0 {
            return Ok(out);
        }
        if total == 0 {
            return Err(SchedulerError::ZeroBacklog { symbols: sym_avail });
        }

        for (beam, &bytes) in &backlog {
            let share = u64::from(sym_avail) * bytes / total;
            out.insert(*beam, share as u32);
        }

        let mut assigned: u32 = out.values().sum();
        while assigned < sym_avail {
            let Some((beam, _)) = out
                .iter()
                .filter(|(b, _)| backlog[*b] > 0)
                .min_by_key(|(_, sym)| **sym)
                .map(|(b, s)| (*b, *s))
            else {
                break;
            };
            if let Some(sym) = out.get_mut(&beam) {
                *sym += 1;
            }
            assigned += 1;
        }

        for (beam, sym) in &out {
            debug!(%beam, sym, backlog = backlog[beam], "symbols per beam");
        }
        Ok(out)
    }

    // ── Phase B: RBGs within a beam ───────────────────────────────────────────

    /// Hand out the RBGs of one beam.  Returns the number of RBGs granted.
    ///
    /// # Panics
    /// If the direction has no allocable RBG.
    pub fn assign_rbg(&mut self, dir: Direction, beam_sym: u32, beam_ues: &[ActiveUe], ues: &mut UeMap) -> u32 {
        let total = self.rbg_resources(dir);
        assert!(total > 0, "no allocable RBG in {dir}");
        if beam_ues.is_empty() || beam_sym == 0 {
            return 0;
        }
        let mut resources = total;

        let unit = GrantUnit {
            amc: &self.amc,
            rb_per_rbg: self.rb_per_rbg,
            beam_sym,
        };
        for au in beam_ues {
            if let Some(ue) = ues.get_mut(&au.rnti) {
                self.policy.before_schedule(ue.link_mut(dir), &unit);
            }
        }

        let min_payload = dir.min_payload_bytes();
        let fh_cap_rbs = self
            .fronthaul
            .as_deref()
            .filter(|fh| fh.control_method() == FhControlMethod::OptimizeRbs);

        let mut order: Vec<ActiveUe> = beam_ues.to_vec();
        while resources > 0 {
            order.sort_by(|a, b| match (ues.get(&a.rnti), ues.get(&b.rnti)) {
                (Some(ua), Some(ub)) => self.policy.compare(dir, ua, ub),
                _ => std::cmp::Ordering::Equal,
            });

            let winner = order.iter().copied().find(|au| {
                let Some(ue) = ues.get(&au.rnti) else {
                    return false;
                };
                let link = ue.link(dir);
                if link.tb_size >= au.backlog.max(min_payload) {
                    trace!(rnti = au.rnti, tb = link.tb_size, backlog = au.backlog, "satisfied");
                    return false;
                }
                if let Some(fh) = fh_cap_rbs {
                    let cap = fh
                        .max_assignable_regs(link.mcs, au.rnti, link.rank)
                        .max(MIN_FH_RBGS_PER_UE * beam_sym);
                    if link.rbg + beam_sym > cap {
                        trace!(rnti = au.rnti, rbg = link.rbg, cap, "fronthaul cap");
                        return false;
                    }
                }
                true
            });
            let Some(winner) = winner else {
                debug!(%dir, resources, "no eligible user left in beam");
                break;
            };

            if let Some(ue) = ues.get_mut(&winner.rnti) {
                let link = ue.link_mut(dir);
                loop {
                    link.rbg += beam_sym;
                    link.sym = beam_sym;
                    resources -= 1;
                    link.tb_size = self.amc.tb_size(link.mcs, link.rank, link.rbg * self.rb_per_rbg);
                    self.policy.on_assigned(link, &unit);
                    if link.tb_size >= min_payload || resources == 0 {
                        break;
                    }
                }
                trace!(rnti = winner.rnti, rbg = link.rbg, tb = link.tb_size, resources, "assigned");
            }
            for au in order.iter().filter(|au| au.rnti != winner.rnti) {
                if let Some(ue) = ues.get_mut(&au.rnti) {
                    self.policy.on_not_assigned(ue.link_mut(dir), &unit);
                }
            }
        }

        self.apply_fronthaul(dir, beam_sym, &mut order, ues);
        total - resources
    }

    fn apply_fronthaul(&mut self, dir: Direction, beam_sym: u32, order: &mut [ActiveUe], ues: &mut UeMap) {
        let Some(fh) = self.fronthaul.as_mut() else {
            return;
        };
        let method = fh.control_method();
        if method == FhControlMethod::None {
            return;
        }

        if method == FhControlMethod::OptimizeMcs {
            for au in order.iter() {
                if let Some(ue) = ues.get_mut(&au.rnti) {
                    let link = ue.link_mut(dir);
                    if link.rbg > 0 {
                        let cap = fh.max_assignable_mcs(link.rbg, au.rnti, link.rank);
                        link.mcs = link.mcs.min(cap);
                    }
                }
            }
        }

        order.shuffle(&mut self.rng);
        for au in order.iter() {
            if let Some(ue) = ues.get_mut(&au.rnti) {
                let link = ue.link_mut(dir);
                if link.rbg > 0 && !fh.fits_capacity(link.mcs, link.rbg, link.rank) {
                    debug!(rnti = au.rnti, %dir, rbg = link.rbg, beam_sym, "allocation does not fit fronthaul, revoked");
                    link.reset_allocation();
                }
            }
        }
    }

    // ── Slot entry points ─────────────────────────────────────────────────────

    pub fn schedule_dl(
        &mut self,
        sym_avail: u32,
        active: &ActiveUeMap,
        ues: &mut UeMap,
    ) -> Result<Vec<ResourceGrant>, SchedulerError> {
        self.schedule(Direction::Downlink, sym_avail, active, ues)
    }

    pub fn schedule_ul(
        &mut self,
        sym_avail: u32,
        active: &ActiveUeMap,
        ues: &mut UeMap,
    ) -> Result<Vec<ResourceGrant>, SchedulerError> {
        self.schedule(Direction::Uplink, sym_avail, active, ues)
    }

    /// Allocate `sym_avail` symbols of `dir`.  DL symbols start at the top
    /// of the slot, UL symbols end at its bottom.
    ///
    /// # Errors
    /// [`SchedulerError::ZeroBacklog`] from the symbol split.
    ///
    /// # Panics
    /// If `sym_avail` exceeds the slot.
    pub fn schedule(
        &mut self,
        dir: Direction,
        sym_avail: u32,
        active: &ActiveUeMap,
        ues: &mut UeMap,
    ) -> Result<Vec<ResourceGrant>, SchedulerError> {
        assert!(
            sym_avail <= self.symbols_per_slot,
            "{sym_avail} symbols requested from a {}-symbol slot",
            self.symbols_per_slot
        );
        for ue in ues.values_mut() {
            ue.link_mut(dir).reset_allocation();
        }

        let sym_per_beam = self.sym_per_beam(sym_avail, active)?;
        let mut granted_rbg = 0;
        for (beam, &beam_sym) in &sym_per_beam {
            if let Some(beam_ues) = active.get(beam) {
                granted_rbg += self.assign_rbg(dir, beam_sym, beam_ues, ues);
            }
        }

        let encoder = GrantEncoder {
            amc: &self.amc,
            rb_per_rbg: self.rb_per_rbg,
            num_rbg: self.num_rbg,
            notch_mask: self.notch_mask(dir),
        };
        let mut spoint = PointInFtPlane {
            rbg: 0,
            sym: match dir {
                Direction::Downlink => 0,
                Direction::Uplink => self.symbols_per_slot,
            },
        };

        let mut grants = Vec::new();
        for (beam, &beam_sym) in &sym_per_beam {
            if beam_sym == 0 {
                continue;
            }
            for au in active.get(beam).map(Vec::as_slice).unwrap_or_default() {
                let Some(ue) = ues.get_mut(&au.rnti) else {
                    continue;
                };
                if ue.link(dir).rbg == 0 {
                    continue;
                }
                if let Some(g) = encoder.encode(ue, dir, &mut spoint, beam_sym) {
                    grants.push(g);
                }
            }
            spoint.rbg = 0;
            match dir {
                Direction::Downlink => spoint.sym += beam_sym,
                Direction::Uplink => spoint.sym -= beam_sym,
            }
        }

        debug!(
            %dir,
            beams = sym_per_beam.len(),
            granted_rbg,
            grants = grants.len(),
            "slot scheduled"
        );
        Ok(grants)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
