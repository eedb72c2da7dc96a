/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-user scheduling state.
//!
//! A [`UeContext`] is created when a user attaches to a cell and dropped on
//! detach.  It carries one [`LinkState`] per direction: the link-adaptation
//! outputs (MCS, rank, precoder, CQI record) that persist across slots and
//! the allocation fields (`rbg`, `sym`, `tb_size`) that the scheduler resets
//! at the start of every slot.

use std::fmt;
use std::sync::Arc;

use crate::channel::PrecodingMatrix;
use crate::scheduler::policy::UeMetrics;

pub type Rnti = u16;
pub type CellId = u16;

/// Spatial group sharing one symbol budget within a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BeamId(pub u16);

impl fmt::Display for BeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "beam{}", self.0)
    }
}

// ── Direction ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Downlink,
    Uplink,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Downlink, Direction::Uplink];

    /// Smallest transport block worth a grant once MAC/RLC headers are paid.
    pub fn min_payload_bytes(self) -> u32 {
        match self {
            Direction::Downlink => 10,
            Direction::Uplink => 12,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Downlink => write!(f, "DL"),
            Direction::Uplink => write!(f, "UL"),
        }
    }
}

// ── CQI record ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CqiType {
    #[default]
    Wideband,
    Subband,
}

/// Validity of the stored CQI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CqiState {
    /// No report received since attach.
    #[default]
    Uninitialized,
    /// A report is valid for `remaining` more slots.
    Tracking { remaining: u32 },
    /// The last report expired; transmit at the start MCS until the next one.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CqiInfo {
    pub cqi_type: CqiType,
    pub wb_cqi: u8,
    pub state: CqiState,
}

impl Default for CqiInfo {
    fn default() -> Self {
        Self {
            cqi_type: CqiType::Wideband,
            wb_cqi: 1,
            state: CqiState::Uninitialized,
        }
    }
}

// ── LinkState ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LinkState {
    // link adaptation
    pub mcs: u8,
    pub rank: u8,
    pub precoding: Option<Arc<PrecodingMatrix>>,
    pub cqi: CqiInfo,

    // traffic
    /// Bytes waiting for transmission.
    pub backlog: u32,

    // per-slot allocation
    /// RBG-symbols granted this slot (one RBG over `n` symbols counts `n`).
    pub rbg: u32,
    pub sym: u32,
    pub tb_size: u32,

    pub metrics: UeMetrics,
}

impl LinkState {
    pub fn new(start_mcs: u8, metrics: UeMetrics) -> Self {
        Self {
            mcs: start_mcs,
            rank: 1,
            precoding: None,
            cqi: CqiInfo::default(),
            backlog: 0,
            rbg: 0,
            sym: 0,
            tb_size: 0,
            metrics,
        }
    }

    pub fn reset_allocation(&mut self) {
        self.rbg = 0;
        self.sym = 0;
        self.tb_size = 0;
    }
}

// ── UeContext ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UeContext {
    pub cell_id: CellId,
    pub rnti: Rnti,
    pub beam: BeamId,
    pub dl: LinkState,
    pub ul: LinkState,
}

impl UeContext {
    pub fn new(cell_id: CellId, rnti: Rnti, beam: BeamId, dl: LinkState, ul: LinkState) -> Self {
        Self {
            cell_id,
            rnti,
            beam,
            dl,
            ul,
        }
    }

    pub fn link(&self, dir: Direction) -> &LinkState {
        match dir {
            Direction::Downlink => &self.dl,
            Direction::Uplink => &self.ul,
        }
    }

    pub fn link_mut(&mut self, dir: Direction) -> &mut LinkState {
        match dir {
            Direction::Downlink => &mut self.dl,
            Direction::Uplink => &mut self.ul,
        }
    }
}
