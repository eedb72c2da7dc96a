/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Transmit and noise power spectral densities.
//!
//! | Allocation | Per-band PSD (W/Hz) |
//! |---|---|
//! | `UniformBandwidth` | `P / (width × all bands)` on the active bands |
//! | `UniformUsed` | `P / (width × active bands)` on the active bands |
//! | `CustomPerRb` | `P_rb / width_rb` for each supplied band, zero after |

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{trace, warn};

use super::{SpectrumError, SpectrumModel, SpectrumValue, SUBCARRIERS_PER_RB};

/// Thermal noise density at 290 K.
const KT_DBM_HZ: f64 = -174.0;

/// Narrowest RB the PSD numerics accept.
const MIN_RB_WIDTH_HZ: f64 = 180_000.0;

// ── Allocation policy ─────────────────────────────────────────────────────────

/// How total transmit power is spread over the grid.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PowerAllocation {
    /// Power is divided over every band of the grid; only the active bands
    /// are lit, so a partial allocation radiates less than the total.
    UniformBandwidth,
    /// Power is divided over the active bands only.
    #[default]
    UniformUsed,
    /// Explicit per-band power in dBm.  The total power and active band list
    /// are ignored.
    CustomPerRb { power_dbm: Vec<f64> },
}

// ── Conversions ───────────────────────────────────────────────────────────────

pub fn dbm_to_watts(dbm: f64) -> f64 {
    10f64.powf((dbm - 30.0) / 10.0)
}

pub fn watts_to_dbm(w: f64) -> f64 {
    10.0 * w.log10() + 30.0
}

pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

pub fn linear_to_db(lin: f64) -> f64 {
    10.0 * lin.log10()
}

// ── Builders ──────────────────────────────────────────────────────────────────

/// Build the transmit PSD for `power_dbm` spread according to `allocation`.
///
/// # Errors
/// * [`SpectrumError::SubbandTooNarrow`] if the grid's RBs are narrower than
///   180 kHz.
/// * [`SpectrumError::RbIndexOutOfRange`] if `active_rbs` names a band the
///   grid does not have.
pub fn tx_power_spectral_density(
    power_dbm: f64,
    active_rbs: &[usize],
    model: &Arc<SpectrumModel>,
    allocation: &PowerAllocation,
) -> Result<SpectrumValue, SpectrumError> {
    // a band listed twice is still one band
    let active: Vec<usize> = active_rbs.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    match allocation {
        PowerAllocation::UniformBandwidth => uniform_psd(power_dbm, &active, model, model.num_bands()),
        PowerAllocation::UniformUsed => uniform_psd(power_dbm, &active, model, active.len()),
        PowerAllocation::CustomPerRb { power_dbm } => per_rb_psd(power_dbm, model),
    }
}

fn first_band_width(model: &SpectrumModel) -> Result<f64, SpectrumError> {
    let width_hz = model.bands().first().map(|b| b.width()).unwrap_or(0.0);
    if width_hz < MIN_RB_WIDTH_HZ {
        return Err(SpectrumError::SubbandTooNarrow { width_hz });
    }
    Ok(width_hz)
}

fn uniform_psd(
    power_dbm: f64,
    active_rbs: &[usize],
    model: &Arc<SpectrumModel>,
    divisor_bands: usize,
) -> Result<SpectrumValue, SpectrumError> {
    let width_hz = first_band_width(model)?;
    let mut psd = SpectrumValue::zeros(model);
    if divisor_bands == 0 {
        return Ok(psd);
    }

    let density = dbm_to_watts(power_dbm) / (width_hz * divisor_bands as f64);
    for &rb in active_rbs {
        if rb >= model.num_bands() {
            return Err(SpectrumError::RbIndexOutOfRange {
                index: rb,
                num_bands: model.num_bands(),
            });
        }
        psd[rb] = density;
    }
    trace!(power_dbm, active = active_rbs.len(), density, "tx psd");
    Ok(psd)
}

fn per_rb_psd(power_dbm: &[f64], model: &Arc<SpectrumModel>) -> Result<SpectrumValue, SpectrumError> {
    let mut psd = SpectrumValue::zeros(model);

    if power_dbm.len() > model.num_bands() {
        warn!(
            supplied = power_dbm.len(),
            bands = model.num_bands(),
            "per-RB power vector longer than the grid; ignoring extra values"
        );
    }

    for (rb, (&p_dbm, band)) in power_dbm.iter().zip(model.bands()).enumerate() {
        let width_hz = band.width();
        if width_hz < MIN_RB_WIDTH_HZ {
            return Err(SpectrumError::SubbandTooNarrow { width_hz });
        }
        psd[rb] = dbm_to_watts(p_dbm) / width_hz;
    }
    Ok(psd)
}

/// Additive white Gaussian noise PSD for a receiver with `noise_figure_db`.
pub fn noise_power_spectral_density(noise_figure_db: f64, model: &Arc<SpectrumModel>) -> SpectrumValue {
    let kt_w_hz = dbm_to_watts(KT_DBM_HZ);
    SpectrumValue::filled(model, kt_w_hz * db_to_linear(noise_figure_db))
}

/// Largest bandwidth not above `bandwidth_hz` that is a whole number of RBs
/// at `numerology`.
pub fn effective_bandwidth(bandwidth_hz: f64, numerology: u8) -> u64 {
    let rb_hz = 15_000u64 * (1u64 << numerology) * u64::from(SUBCARRIERS_PER_RB);
    let num_rbs = (bandwidth_hz / rb_hz as f64) as u64;
    num_rbs * rb_hz
}

/// Number of RBs that fit in `bandwidth_hz` at `numerology`.
pub fn rbs_in_bandwidth(bandwidth_hz: f64, numerology: u8) -> u32 {
    let rb_hz = 15_000u64 * (1u64 << numerology) * u64::from(SUBCARRIERS_PER_RB);
    (effective_bandwidth(bandwidth_hz, numerology) / rb_hz) as u32
}

// ── Tests ─────────────────────────────────────────────────────────────────────
