/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Allocator configuration errors.
//!
//! Only unsatisfiable setups are errors.  A beam or slot where nobody can be
//! served yields an empty allocation instead, and broken RBG accounting
//! between the allocator and the grant encoder is an assertion failure.

use thiserror::Error;

use crate::ue::Direction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Symbols are available but no active user has anything to send, so
    /// the backlog-proportional split is undefined.
    #[error("{symbols} symbols to split but the total backlog of the active beams is 0 bytes")]
    ZeroBacklog { symbols: u32 },

    /// A notch mask does not cover exactly the RBGs of the carrier.
    #[error("{direction} notch mask has {actual} entries, carrier has {expected} RBGs")]
    NotchMaskLength {
        direction: Direction,
        expected: usize,
        actual: usize,
    },

    /// A notch mask that blocks every RBG.
    #[error("{direction} notch mask leaves no RBG to allocate")]
    NotchMaskEmpty { direction: Direction },

    #[error("slot format has 0 symbols")]
    ZeroSymbolsPerSlot,

    #[error("RBG size cannot be 0 RBs")]
    ZeroRbPerRbg,

    /// The carrier is narrower than a single RBG.
    #[error("carrier of {num_rbs} RBs holds no RBG of {rb_per_rbg} RBs")]
    NoRbg { num_rbs: u32, rb_per_rbg: u32 },
}
