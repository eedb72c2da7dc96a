/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Optional fronthaul-capacity constraint on allocations.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::amc::{Amc, MAX_MCS};
use crate::spectrum::SUBCARRIERS_PER_RB;
use crate::ue::Rnti;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FhControlMethod {
    #[default]
    None,
    /// Revoke allocations that do not fit.
    Postponing,
    /// Lower the MCS of allocated users until they fit.
    OptimizeMcs,
    /// Cap the RBGs each user may receive.
    OptimizeRbs,
}

/// Capacity oracle consulted by the allocator.  Quantities are in
/// RBG-symbols, the allocator's unit.
pub trait FronthaulControl {
    fn control_method(&self) -> FhControlMethod;

    fn max_assignable_regs(&self, mcs: u8, rnti: Rnti, rank: u8) -> u32;

    fn max_assignable_mcs(&self, regs: u32, rnti: Rnti, rank: u8) -> u8;

    /// Reserve the capacity for an allocation if it fits.
    fn fits_capacity(&mut self, mcs: u8, regs: u32, rank: u8) -> bool;

    /// Release everything reserved in the previous slot.
    fn reset_slot(&mut self);
}

/// Fixed-rate link carrying `bits = REs × Qm × rank` per allocation.
#[derive(Debug, Clone)]
pub struct FronthaulCapacity {
    method: FhControlMethod,
    amc: Amc,
    rb_per_rbg: u32,
    capacity_bits: f64,
    used_bits: f64,
}

impl FronthaulCapacity {
    pub fn new(method: FhControlMethod, capacity_mbps: f64, slot: Duration, rb_per_rbg: u32, amc: Amc) -> Self {
        Self::with_bits_per_slot(method, capacity_mbps * 1e6 * slot.as_secs_f64(), rb_per_rbg, amc)
    }

    pub fn with_bits_per_slot(method: FhControlMethod, capacity_bits: f64, rb_per_rbg: u32, amc: Amc) -> Self {
        Self {
            method,
            amc,
            rb_per_rbg,
            capacity_bits,
            used_bits: 0.0,
        }
    }

    fn bits(&self, mcs: u8, regs: u32, rank: u8) -> f64 {
        let res = f64::from(regs) * f64::from(self.rb_per_rbg) * f64::from(SUBCARRIERS_PER_RB);
        res * f64::from(self.amc.modulation_order(mcs)) * f64::from(rank.max(1))
    }

    fn remaining(&self) -> f64 {
        (self.capacity_bits - self.used_bits).max(0.0)
    }
}

impl FronthaulControl for FronthaulCapacity {
    fn control_method(&self) -> FhControlMethod {
        self.method
    }

    fn max_assignable_regs(&self, mcs: u8, _rnti: Rnti, rank: u8) -> u32 {
        let per_reg = self.bits(mcs, 1, rank);
        if per_reg <= 0.0 {
            return u32::MAX;
        }
        (self.remaining() / per_reg).floor().min(f64::from(u32::MAX)) as u32
    }

    fn max_assignable_mcs(&self, regs: u32, rnti: Rnti, rank: u8) -> u8 {
        let remaining = self.remaining();
        let mcs = (0..=MAX_MCS)
            .rev()
            .find(|&m| self.bits(m, regs, rank) <= remaining)
            .unwrap_or(0);
        debug!(rnti, regs, mcs, "fronthaul MCS cap");
        mcs
    }

    fn fits_capacity(&mut self, mcs: u8, regs: u32, rank: u8) -> bool {
        let needed = self.bits(mcs, regs, rank);
        if needed <= self.remaining() {
            self.used_bits += needed;
            true
        } else {
            false
        }
    }

    fn reset_slot(&mut self) {
        self.used_bits = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4 RBs per RBG → one RBG-symbol is 48 REs.
    fn fh(method: FhControlMethod, bits_per_slot: f64) -> FronthaulCapacity {
        FronthaulCapacity::with_bits_per_slot(method, bits_per_slot, 4, Amc::default())
    }

    #[test]
    fn capacity_scales_with_slot_duration() {
        let f = FronthaulCapacity::new(FhControlMethod::Postponing, 1.0, Duration::from_millis(500), 4, Amc::default());
        assert!((f.remaining() - 500_000.0).abs() < 1e-6);
    }

    #[test]
    fn regs_cap_follows_modulation_order() {
        let f = fh(FhControlMethod::OptimizeRbs, 48.0 * 2.0 * 10.0);
        assert_eq!(f.max_assignable_regs(0, 1, 1), 10); // QPSK
        assert_eq!(f.max_assignable_regs(20, 1, 1), 3); // 64QAM
        assert_eq!(f.max_assignable_regs(0, 1, 2), 5);
    }

    #[test]
    fn reservations_consume_capacity_until_reset() {
        let mut f = fh(FhControlMethod::Postponing, 48.0 * 2.0 * 10.0);
        assert!(f.fits_capacity(0, 6, 1));
        assert!(!f.fits_capacity(0, 6, 1));
        assert!(f.fits_capacity(0, 4, 1));
        f.reset_slot();
        assert!(f.fits_capacity(0, 10, 1));
    }

    #[test]
    fn mcs_cap_picks_highest_fitting_modulation() {
        let f = fh(FhControlMethod::OptimizeMcs, 48.0 * 4.0 * 14.0);
        let mcs = f.max_assignable_mcs(14, 1, 1);
        assert_eq!(Amc::default().modulation_order(mcs), 4);
        assert_eq!(mcs, 16);
    }
}
