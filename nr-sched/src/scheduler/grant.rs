/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Grant encoding: allocation totals → concrete time/frequency grants.
//!
//! The encoder walks a [`PointInFtPlane`] cursor across the slot.  Within a
//! beam every user shares the beam's symbol range and takes the next free
//! RBGs in the notch mask; the RBG cursor restarts at 0 on each beam change
//! while the symbol cursor moves past the finished beam (downward for DL,
//! upward from the end of the slot for UL).

use std::sync::Arc;

use tracing::debug;

use crate::amc::Amc;
use crate::channel::PrecodingMatrix;
use crate::ue::{BeamId, Direction, Rnti, UeContext};

/// Allocation cursor: next candidate RBG and current symbol boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointInFtPlane {
    pub rbg: u32,
    pub sym: u32,
}

/// One user's resources for one slot and direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceGrant {
    pub rnti: Rnti,
    pub beam: BeamId,
    pub direction: Direction,
    pub sym_start: u32,
    pub num_sym: u32,
    pub rbg_bitmap: Vec<bool>,
    pub tb_size: u32,
    pub mcs: u8,
    pub rank: u8,
    pub precoding: Option<Arc<PrecodingMatrix>>,
}

impl ResourceGrant {
    pub fn num_rbg(&self) -> usize {
        self.rbg_bitmap.iter().filter(|&&b| b).count()
    }

    pub fn active_rbs(&self, rb_per_rbg: u32) -> Vec<usize> {
        let rb_per_rbg = rb_per_rbg as usize;
        self.rbg_bitmap
            .iter()
            .enumerate()
            .filter(|(_, &used)| used)
            .flat_map(|(rbg, _)| rbg * rb_per_rbg..(rbg + 1) * rb_per_rbg)
            .collect()
    }
}

pub struct GrantEncoder<'a> {
    pub amc: &'a Amc,
    pub rb_per_rbg: u32,
    pub num_rbg: usize,
    pub notch_mask: Option<&'a [bool]>,
}

impl GrantEncoder<'_> {
    /// Encode the allocation the user accumulated in this slot.
    ///
    /// Returns `None`, and zeroes the user's transport-block size, when the
    /// block would be below the direction's minimum payload.
    ///
    /// # Panics
    /// * If the user's RBG-symbols are not a whole number of RBGs over
    ///   `beam_sym` symbols.
    /// * If the notch mask after the cursor cannot hold the user's RBGs.
    pub fn encode(
        &self,
        ue: &mut UeContext,
        dir: Direction,
        spoint: &mut PointInFtPlane,
        beam_sym: u32,
    ) -> Option<ResourceGrant> {
        let rnti = ue.rnti;
        let beam = ue.beam;
        let link = ue.link_mut(dir);

        let tbs = self.amc.tb_size(link.mcs, link.rank, link.rbg * self.rb_per_rbg);
        assert!(
            beam_sym > 0 && link.rbg % beam_sym == 0,
            "RBG-symbols {} are not whole RBGs over {} symbols",
            link.rbg,
            beam_sym
        );

        if tbs < dir.min_payload_bytes() {
            debug!(rnti, %dir, tbs, mcs = link.mcs, "transport block too small, no grant");
            link.tb_size = 0;
            return None;
        }

        let mut remaining = link.rbg / beam_sym;
        let mut bitmap = match self.notch_mask {
            Some(mask) => mask.to_vec(),
            None => vec![true; self.num_rbg],
        };
        let mut last_rbg = spoint.rbg;
        for (i, slot) in bitmap.iter_mut().enumerate() {
            if i as u32 >= spoint.rbg && *slot && remaining > 0 {
                remaining -= 1;
                last_rbg = i as u32;
            } else {
                *slot = false;
            }
        }
        assert_eq!(remaining, 0, "notch mask after RBG {} cannot hold the allocation", spoint.rbg);
        spoint.rbg = last_rbg + 1;

        let sym_start = match dir {
            Direction::Downlink => spoint.sym,
            Direction::Uplink => spoint.sym - beam_sym,
        };

        link.tb_size = tbs;
        let grant = ResourceGrant {
            rnti,
            beam,
            direction: dir,
            sym_start,
            num_sym: link.sym,
            rbg_bitmap: bitmap,
            tb_size: tbs,
            mcs: link.mcs,
            rank: link.rank,
            precoding: link.precoding.clone(),
        };
        debug!(
            rnti,
            %dir,
            %beam,
            tbs,
            mcs = grant.mcs,
            rbgs = grant.num_rbg(),
            sym_start,
            num_sym = grant.num_sym,
            "grant"
        );
        Some(grant)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::policy::UeMetrics;
    use crate::ue::LinkState;

    fn ue(rbg: u32, sym: u32, mcs: u8) -> UeContext {
        let mut dl = LinkState::new(mcs, UeMetrics::RoundRobin);
        dl.rbg = rbg;
        dl.sym = sym;
        let ul = dl.clone();
        UeContext::new(1, 3, BeamId(0), dl, ul)
    }

    fn encoder<'a>(amc: &'a Amc, mask: Option<&'a [bool]>) -> GrantEncoder<'a> {
        GrantEncoder {
            amc,
            rb_per_rbg: 4,
            num_rbg: 6,
            notch_mask: mask,
        }
    }

    #[test]
    fn contiguous_rbgs_from_cursor() {
        let amc = Amc::default();
        let mut u = ue(2 * 14, 14, 10);
        let mut sp = PointInFtPlane { rbg: 1, sym: 0 };
        let g = encoder(&amc, None)
            .encode(&mut u, Direction::Downlink, &mut sp, 14)
            .unwrap();
        assert_eq!(g.rbg_bitmap, vec![false, true, true, false, false, false]);
        assert_eq!(sp.rbg, 3);
        assert_eq!(g.sym_start, 0);
        assert_eq!(g.num_sym, 14);
        assert_eq!(g.active_rbs(4), (4..12).collect::<Vec<_>>());
        assert_eq!(u.dl.tb_size, g.tb_size);
    }

    #[test]
    fn notch_mask_is_skipped() {
        let amc = Amc::default();
        let mask = [true, false, true, false, true, true];
        let mut u = ue(3 * 7, 7, 10);
        let mut sp = PointInFtPlane::default();
        let g = encoder(&amc, Some(&mask))
            .encode(&mut u, Direction::Downlink, &mut sp, 7)
            .unwrap();
        assert_eq!(g.rbg_bitmap, vec![true, false, true, false, true, false]);
        assert_eq!(sp.rbg, 5);
    }

    #[test]
    fn uplink_symbols_end_at_cursor() {
        let amc = Amc::default();
        let mut u = ue(4, 4, 10);
        let mut sp = PointInFtPlane { rbg: 0, sym: 14 };
        let g = encoder(&amc, None)
            .encode(&mut u, Direction::Uplink, &mut sp, 4)
            .unwrap();
        assert_eq!(g.sym_start, 10);
        assert_eq!(g.direction, Direction::Uplink);
    }

    #[test]
    fn tiny_transport_block_yields_no_grant_and_clears_tb() {
        let amc = Amc::default();
        // one RBG over one symbol at MCS 0: 48 REs → (11 - 24) bits → 0 bytes
        let mut u = ue(1, 1, 0);
        u.dl.tb_size = 99;
        u.ul.tb_size = 99;
        let mut sp = PointInFtPlane::default();
        assert!(encoder(&amc, None).encode(&mut u, Direction::Downlink, &mut sp, 1).is_none());
        assert_eq!(u.dl.tb_size, 0);
        assert!(encoder(&amc, None).encode(&mut u, Direction::Uplink, &mut sp, 1).is_none());
        assert_eq!(u.ul.tb_size, 0);
        assert_eq!(sp, PointInFtPlane::default(), "cursor untouched");
    }

    #[test]
    #[should_panic(expected = "not whole RBGs")]
    fn partial_rbg_accounting_panics() {
        let amc = Amc::default();
        let mut u = ue(15, 14, 10);
        let mut sp = PointInFtPlane::default();
        encoder(&amc, None).encode(&mut u, Direction::Downlink, &mut sp, 14);
    }
}
