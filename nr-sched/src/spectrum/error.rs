/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Errors raised while building frequency grids and power spectral densities.
//!
//! Every variant is a scenario configuration problem: the run cannot
//! continue with the requested grid, so callers propagate it up to the
//! binary which aborts.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectrumError {
    /// A grid was requested with no resource blocks.
    #[error("total bandwidth cannot be 0 RBs")]
    ZeroBandwidth,

    /// Centre frequency outside the supported carrier range.
    #[error("centre frequency {frequency_hz} Hz outside the supported range 0.5 GHz – 100 GHz")]
    CenterFrequencyOutOfRange { frequency_hz: f64 },

    /// Subcarrier spacing is not one of 15/30/60/120/240/480 kHz.
    #[error("unsupported subcarrier spacing {spacing_hz} Hz (valid: 15000, 30000, 60000, 120000, 240000, 480000)")]
    UnsupportedSubcarrierSpacing { spacing_hz: f64 },

    /// A subband of the grid is too narrow for the PSD numerics.
    #[error("erroneous spectrum model: RB width {width_hz} Hz is below 180 kHz")]
    SubbandTooNarrow { width_hz: f64 },

    /// An active RB index does not exist in the grid.
    #[error("RB index {index} out of range for a grid of {num_bands} bands")]
    RbIndexOutOfRange { index: usize, num_bands: usize },
}
