/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Adaptive modulation and coding.
//!
//! Maps SINR to a 4-bit CQI through the Shannon-gap approximation, CQI to the
//! highest MCS whose spectral efficiency does not exceed it, and an MCS plus
//! rank and allocation size to a transport-block size.
//!
//! ```text
//! SE(sinr) = log2(1 + sinr / Γ),   Γ = −ln(5·BER) / 1.5
//! ```

use tracing::trace;

use crate::spectrum::SUBCARRIERS_PER_RB;

/// Highest MCS index of the table.
pub const MAX_MCS: u8 = 28;

/// Highest 4-bit CQI.
pub const MAX_CQI: u8 = 15;

/// Target bit error rate of the Shannon-gap model.
const DEFAULT_BER: f64 = 0.00005;

/// Transport-block CRC length in bits.
const TB_CRC_BITS: u64 = 24;

/// (modulation order, code rate × 1024) for MCS 0..=28.
const MCS_TABLE: [(u8, u16); 29] = [
    (2, 120),
    (2, 157),
    (2, 193),
    (2, 251),
    (2, 308),
    (2, 379),
    (2, 449),
    (2, 526),
    (2, 602),
    (2, 679),
    (4, 340),
    (4, 378),
    (4, 434),
    (4, 490),
    (4, 553),
    (4, 616),
    (4, 658),
    (6, 438),
    (6, 466),
    (6, 517),
    (6, 567),
    (6, 616),
    (6, 666),
    (6, 719),
    (6, 772),
    (6, 822),
    (6, 873),
    (6, 910),
    (6, 948),
];

/// Spectral efficiency (bit/s/Hz) of CQI 1..=15.  CQI 0 means out of range.
const CQI_SPECTRAL_EFFICIENCY: [f64; 15] = [
    0.1523, 0.2344, 0.3770, 0.6016, 0.8770, 1.1758, 1.4766, 1.9141, 2.4063, 2.7305, 3.3223,
    3.9023, 4.5234, 5.1152, 5.5547,
];

#[derive(Debug, Clone)]
pub struct Amc {
    gamma: f64,
}

impl Default for Amc {
    fn default() -> Self {
        Self::with_ber(DEFAULT_BER)
    }
}

impl Amc {
    pub fn with_ber(ber: f64) -> Self {
        Self {
            gamma: -(5.0 * ber).ln() / 1.5,
        }
    }

    /// Modulation order (bits per symbol) of `mcs`.
    pub fn modulation_order(&self, mcs: u8) -> u8 {
        MCS_TABLE[usize::from(mcs.min(MAX_MCS))].0
    }

    /// Code rate of `mcs` as a fraction.
    pub fn code_rate(&self, mcs: u8) -> f64 {
        f64::from(MCS_TABLE[usize::from(mcs.min(MAX_MCS))].1) / 1024.0
    }

    pub fn mcs_spectral_efficiency(&self, mcs: u8) -> f64 {
        f64::from(self.modulation_order(mcs)) * self.code_rate(mcs)
    }

    pub fn spectral_efficiency(&self, sinr_linear: f64) -> f64 {
        (1.0 + sinr_linear.max(0.0) / self.gamma).log2()
    }

    /// Linear SINR at which the Shannon-gap efficiency reaches that of `mcs`.
    pub fn required_sinr(&self, mcs: u8) -> f64 {
        self.gamma * (2f64.powf(self.mcs_spectral_efficiency(mcs)) - 1.0)
    }

    /// Highest CQI whose efficiency is reachable at `sinr_linear`; 0 when
    /// even CQI 1 is not.
    pub fn cqi_from_sinr(&self, sinr_linear: f64) -> u8 {
        let se = self.spectral_efficiency(sinr_linear);
        CQI_SPECTRAL_EFFICIENCY
            .iter()
            .take_while(|&&cqi_se| cqi_se <= se)
            .count() as u8
    }

    /// Highest MCS whose efficiency does not exceed that of `cqi`.
    pub fn mcs_from_cqi(&self, cqi: u8) -> u8 {
        if cqi == 0 {
            return 0;
        }
        let se = CQI_SPECTRAL_EFFICIENCY[usize::from(cqi.min(MAX_CQI)) - 1];
        let mut mcs = 0;
        while mcs < MAX_MCS && self.mcs_spectral_efficiency(mcs + 1) <= se {
            mcs += 1;
        }
        mcs
    }

    /// Transport-block size in bytes for `num_rb_sym` RB-symbols.
    ///
    /// Saturates at zero when the allocation cannot carry the CRC.
    pub fn tb_size(&self, mcs: u8, rank: u8, num_rb_sym: u32) -> u32 {
        let res = u64::from(num_rb_sym) * u64::from(SUBCARRIERS_PER_RB);
        let bits = res as f64
            * f64::from(self.modulation_order(mcs))
            * self.code_rate(mcs)
            * f64::from(rank.max(1));
        let payload = (bits as u64).saturating_sub(TB_CRC_BITS);
        (payload / 8).min(u64::from(u32::MAX)) as u32
    }

    /// Wideband CQI and MCS from a subband SINR vector.
    ///
    /// Uses the weakest subband that carried any signal; bands at zero were
    /// not part of the transmission.  Returns `(0, 0)` when nothing did.
    pub fn wideband_feedback(&self, sinr: &[f64]) -> (u8, u8) {
        let min_sinr = sinr
            .iter()
            .copied()
            .filter(|&s| s > 0.0)
            .fold(f64::INFINITY, f64::min);
        if !min_sinr.is_finite() {
            return (0, 0);
        }
        let cqi = self.cqi_from_sinr(min_sinr);
        let mcs = self.mcs_from_cqi(cqi);
        trace!(min_sinr, cqi, mcs, "wideband feedback");
        (cqi, mcs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
