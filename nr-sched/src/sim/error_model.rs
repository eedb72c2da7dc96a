/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Transport-block error model.
//!
//! TBLER is a logistic curve in SINR (dB) centred on the SINR the MCS needs
//! according to the AMC model:
//!
//! ```text
//! tbler(mcs, sinr) = 1 / (1 + exp(k·(sinr_dB − req_dB(mcs)) + ln((1 − b₀)/b₀)))
//! ```
//!
//! so a block sent exactly at the required SINR fails with probability `b₀`.

use rand::Rng;
use tracing::trace;

use crate::amc::Amc;
use crate::spectrum::psd::linear_to_db;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticErrorModel {
    /// Steepness `k`, per dB.
    pub slope_per_db: f64,
    /// TBLER at the required SINR (`b₀`).
    pub bler_at_threshold: f64,
}

impl Default for LogisticErrorModel {
    fn default() -> Self {
        Self {
            slope_per_db: 1.5,
            bler_at_threshold: 0.1,
        }
    }
}

/// One decoded transport block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TbOutcome {
    pub tbler: f64,
    pub corrupted: bool,
}

impl LogisticErrorModel {
    pub fn tbler(&self, amc: &Amc, mcs: u8, sinr_linear: f64) -> f64 {
        if sinr_linear <= 0.0 {
            return 1.0;
        }
        let b0 = self.bler_at_threshold.clamp(1e-9, 1.0 - 1e-9);
        let margin_db = linear_to_db(sinr_linear) - linear_to_db(amc.required_sinr(mcs));
        1.0 / (1.0 + (self.slope_per_db * margin_db + ((1.0 - b0) / b0).ln()).exp())
    }

    /// Evaluate and draw the outcome of a block.
    pub fn decode<R: Rng + ?Sized>(&self, amc: &Amc, mcs: u8, sinr_linear: f64, rng: &mut R) -> TbOutcome {
        let tbler = self.tbler(amc, mcs, sinr_linear);
        let corrupted = rng.gen::<f64>() < tbler;
        trace!(mcs, sinr_db = linear_to_db(sinr_linear), tbler, corrupted, "tb decoded");
        TbOutcome { tbler, corrupted }
    }
}

/// Mean linear SINR over the RBs a block occupied.  Zero when none.
pub fn effective_sinr(sinr: &[f64], active_rbs: &[usize]) -> f64 {
    let used: Vec<f64> = active_rbs.iter().filter_map(|&rb| sinr.get(rb).copied()).collect();
    if used.is_empty() {
        return 0.0;
    }
    used.iter().sum::<f64>() / used.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::psd::db_to_linear;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn threshold_sinr_fails_at_configured_rate() {
        let amc = Amc::default();
        let m = LogisticErrorModel::default();
        let t = m.tbler(&amc, 10, amc.required_sinr(10));
        assert!((t - 0.1).abs() < 1e-9);
    }

    #[test]
    fn tbler_falls_with_sinr_and_rises_with_mcs() {
        let amc = Amc::default();
        let m = LogisticErrorModel::default();
        let sinr = db_to_linear(10.0);
        assert!(m.tbler(&amc, 10, sinr) > m.tbler(&amc, 10, db_to_linear(15.0)));
        assert!(m.tbler(&amc, 20, sinr) > m.tbler(&amc, 5, sinr));
        assert_eq!(m.tbler(&amc, 5, 0.0), 1.0);
    }

    #[test]
    fn draws_follow_tbler() {
        let amc = Amc::default();
        let m = LogisticErrorModel::default();
        let mut rng = StdRng::seed_from_u64(7);
        let far_above = db_to_linear(40.0);
        let far_below = db_to_linear(-20.0);
        assert!((0..100).all(|_| !m.decode(&amc, 0, far_above, &mut rng).corrupted));
        assert!((0..100).all(|_| m.decode(&amc, 28, far_below, &mut rng).corrupted));
    }

    #[test]
    fn effective_sinr_averages_used_rbs() {
        let sinr = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(effective_sinr(&sinr, &[1, 3]), 3.0);
        assert_eq!(effective_sinr(&sinr, &[]), 0.0);
        assert_eq!(effective_sinr(&sinr, &[9]), 0.0);
    }
}
