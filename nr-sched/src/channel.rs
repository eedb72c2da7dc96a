/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Channel and beamforming collaborators.
//!
//! The scheduler core never models propagation; it consumes a complex
//! channel matrix `[rx element][tx element][subband]` per link and a
//! precomputed weight vector per antenna array.  [`FlatFadingChannel`] and
//! [`UniformBeamforming`] are the deterministic stand-ins used by the
//! scenario driver.

use std::collections::BTreeMap;

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::spectrum::psd::db_to_linear;
use crate::spectrum::SpectrumValue;

// ── Geometry & antennas ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AntennaArray {
    /// Unique within a run; identifies the device the array belongs to.
    pub id: u32,
    pub num_elements: usize,
}

pub type BeamformingVector = Vec<Complex64>;

// ── Matrices ──────────────────────────────────────────────────────────────────

/// Complex channel coefficients indexed `[rx][tx][subband]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMatrix {
    num_rx: usize,
    num_tx: usize,
    num_bands: usize,
    data: Vec<Complex64>,
}

impl ChannelMatrix {
    pub fn zeros(num_rx: usize, num_tx: usize, num_bands: usize) -> Self {
        Self {
            num_rx,
            num_tx,
            num_bands,
            data: vec![Complex64::new(0.0, 0.0); num_rx * num_tx * num_bands],
        }
    }

    pub fn num_rx(&self) -> usize {
        self.num_rx
    }

    pub fn num_tx(&self) -> usize {
        self.num_tx
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    fn index(&self, rx: usize, tx: usize, band: usize) -> usize {
        assert!(rx < self.num_rx && tx < self.num_tx && band < self.num_bands);
        (rx * self.num_tx + tx) * self.num_bands + band
    }

    pub fn get(&self, rx: usize, tx: usize, band: usize) -> Complex64 {
        self.data[self.index(rx, tx, band)]
    }

    pub fn set(&mut self, rx: usize, tx: usize, band: usize, value: Complex64) {
        let i = self.index(rx, tx, band);
        self.data[i] = value;
    }

    /// Same link seen from the other end: `H_ba[t][r] = H_ab[r][t]`.
    pub fn reciprocal(&self) -> Self {
        let mut out = Self::zeros(self.num_tx, self.num_rx, self.num_bands);
        for r in 0..self.num_rx {
            for t in 0..self.num_tx {
                for b in 0..self.num_bands {
                    out.set(t, r, b, self.get(r, t, b));
                }
            }
        }
        out
    }

    /// `|w_rxᴴ · H[.][.][band] · w_tx|²`
    pub fn beamforming_gain(&self, band: usize, w_rx: &[Complex64], w_tx: &[Complex64]) -> f64 {
        assert_eq!(w_rx.len(), self.num_rx, "rx weight vector length");
        assert_eq!(w_tx.len(), self.num_tx, "tx weight vector length");
        let mut acc = Complex64::new(0.0, 0.0);
        for (r, wr) in w_rx.iter().enumerate() {
            for (t, wt) in w_tx.iter().enumerate() {
                acc += wr.conj() * self.get(r, t, band) * wt;
            }
        }
        acc.norm_sqr()
    }
}

/// Spatial precoder reported with a CQI; one column per layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecodingMatrix {
    num_ports: usize,
    data: Vec<Complex64>,
}

impl PrecodingMatrix {
    /// Column-major `num_ports × (data.len() / num_ports)` matrix.
    ///
    /// # Panics
    /// If `data` does not hold a whole number of columns.
    pub fn new(num_ports: usize, data: Vec<Complex64>) -> Self {
        assert!(num_ports > 0 && data.len() % num_ports == 0, "ragged precoding matrix");
        Self { num_ports, data }
    }

    pub fn num_ports(&self) -> usize {
        self.num_ports
    }

    pub fn num_layers(&self) -> usize {
        self.data.len() / self.num_ports
    }

    pub fn get(&self, port: usize, layer: usize) -> Complex64 {
        self.data[layer * self.num_ports + port]
    }
}

/// Received PSD after the channel and both arrays' weights.
pub fn received_psd(
    tx_psd: &SpectrumValue,
    channel: &ChannelMatrix,
    w_rx: &[Complex64],
    w_tx: &[Complex64],
) -> SpectrumValue {
    assert_eq!(channel.num_bands(), tx_psd.len(), "channel and PSD band count differ");
    let mut rx = tx_psd.clone();
    for band in 0..tx_psd.len() {
        rx[band] *= channel.beamforming_gain(band, w_rx, w_tx);
    }
    rx
}

// ── Provider traits ───────────────────────────────────────────────────────────

pub trait ChannelProvider {
    /// Channel from `b` (transmitter) to `a` (receiver).
    fn channel_matrix(
        &mut self,
        pos_a: Position,
        pos_b: Position,
        antenna_a: &AntennaArray,
        antenna_b: &AntennaArray,
    ) -> ChannelMatrix;
}

pub trait BeamformingProvider {
    fn beamforming_vector(&self, antenna: &AntennaArray, own: Position, peer: Position) -> BeamformingVector;
}

// ── Flat fading ───────────────────────────────────────────────────────────────

/// Frequency-flat channel with one random phase per link and a configured
/// power gain.
///
/// A link's coefficients are drawn on first use and cached, so repeated and
/// reverse queries see the same channel.  The draw sequence depends only on
/// `(seed, run, stream)` and the order in which links are first queried.
pub struct FlatFadingChannel {
    num_bands: usize,
    rng: StdRng,
    gains_db: BTreeMap<(u32, u32), f64>,
    default_gain_db: f64,
    phases: BTreeMap<(u32, u32), f64>,
}

impl FlatFadingChannel {
    pub fn new(seed: u64, run: u64, stream: u64, num_bands: usize) -> Self {
        let mixed = seed ^ run.rotate_left(21) ^ stream.rotate_left(42);
        Self {
            num_bands,
            rng: StdRng::seed_from_u64(mixed),
            gains_db: BTreeMap::new(),
            default_gain_db: 0.0,
            phases: BTreeMap::new(),
        }
    }

    pub fn with_default_gain_db(mut self, gain_db: f64) -> Self {
        self.default_gain_db = gain_db;
        self
    }

    /// Set the power gain of the link between two arrays (either direction).
    pub fn set_link_gain_db(&mut self, a: u32, b: u32, gain_db: f64) {
        self.gains_db.insert(link_key(a, b), gain_db);
    }

    pub fn link_gain_db(&self, a: u32, b: u32) -> f64 {
        self.gains_db
            .get(&link_key(a, b))
            .copied()
            .unwrap_or(self.default_gain_db)
    }
}

fn link_key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

impl ChannelProvider for FlatFadingChannel {
    fn channel_matrix(
        &mut self,
        _pos_a: Position,
        _pos_b: Position,
        antenna_a: &AntennaArray,
        antenna_b: &AntennaArray,
    ) -> ChannelMatrix {
        let key = link_key(antenna_a.id, antenna_b.id);
        let phase = match self.phases.get(&key) {
            Some(&p) => p,
            None => {
                let p = self.rng.gen_range(0.0..std::f64::consts::TAU);
                debug!(a = key.0, b = key.1, phase = p, "new flat-fading link");
                self.phases.insert(key, p);
                p
            }
        };
        let amplitude = db_to_linear(self.link_gain_db(antenna_a.id, antenna_b.id)).sqrt();
        let h = Complex64::from_polar(amplitude, phase);

        let mut m = ChannelMatrix::zeros(antenna_a.num_elements, antenna_b.num_elements, self.num_bands);
        for r in 0..antenna_a.num_elements {
            for t in 0..antenna_b.num_elements {
                for b in 0..self.num_bands {
                    m.set(r, t, b, h);
                }
            }
        }
        m
    }
}

// ── Beamforming ───────────────────────────────────────────────────────────────

/// Equal-weight vector of unit norm, independent of geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformBeamforming;

impl BeamformingProvider for UniformBeamforming {
    fn beamforming_vector(&self, antenna: &AntennaArray, _own: Position, _peer: Position) -> BeamformingVector {
        let n = antenna.num_elements.max(1);
        vec![Complex64::new(1.0 / (n as f64).sqrt(), 0.0); antenna.num_elements]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
