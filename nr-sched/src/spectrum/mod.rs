/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Frequency grids and per-subband values.
//!
//! A [`SpectrumModel`] is an ordered list of contiguous resource blocks, each
//! described by its low / centre / high frequency.  Models are immutable and
//! shared through `Arc`; [`SpectrumModelCache`] hands out the same `Arc` for
//! identical `(centre frequency, RB count, subcarrier spacing)` requests.
//!
//! A [`SpectrumValue`] attaches one `f64` per band to a model and supports
//! elementwise arithmetic.  Every operand of an operation must live on the
//! same grid; mixing grids is a programming error and panics.

pub mod error;
pub mod psd;

pub use error::SpectrumError;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Sub, SubAssign};
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Subcarriers in one resource block.
pub const SUBCARRIERS_PER_RB: u32 = 12;

const MIN_CENTER_FREQUENCY_HZ: f64 = 0.5e9;
const MAX_CENTER_FREQUENCY_HZ: f64 = 100e9;

static NEXT_MODEL_UID: AtomicU32 = AtomicU32::new(1);

// ── Subcarrier spacing ────────────────────────────────────────────────────────

/// Supported NR subcarrier spacings.  The discriminant is the numerology µ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubcarrierSpacing {
    Khz15,
    Khz30,
    Khz60,
    Khz120,
    Khz240,
    Khz480,
}

impl SubcarrierSpacing {
    /// Parse a spacing given in Hz.  Only the exact values of the
    /// `15 kHz · 2^µ` sequence are accepted.
    pub fn from_hz(spacing_hz: f64) -> Result<Self, SpectrumError> {
        let scs = match spacing_hz {
            v if v == 15_000.0 => SubcarrierSpacing::Khz15,
            v if v == 30_000.0 => SubcarrierSpacing::Khz30,
            v if v == 60_000.0 => SubcarrierSpacing::Khz60,
            v if v == 120_000.0 => SubcarrierSpacing::Khz120,
            v if v == 240_000.0 => SubcarrierSpacing::Khz240,
            v if v == 480_000.0 => SubcarrierSpacing::Khz480,
            _ => return Err(SpectrumError::UnsupportedSubcarrierSpacing { spacing_hz }),
        };
        Ok(scs)
    }

    pub fn from_numerology(numerology: u8) -> Option<Self> {
        match numerology {
            0 => Some(SubcarrierSpacing::Khz15),
            1 => Some(SubcarrierSpacing::Khz30),
            2 => Some(SubcarrierSpacing::Khz60),
            3 => Some(SubcarrierSpacing::Khz120),
            4 => Some(SubcarrierSpacing::Khz240),
            5 => Some(SubcarrierSpacing::Khz480),
            _ => None,
        }
    }

    pub fn numerology(self) -> u8 {
        self as u8
    }

    pub fn hz(self) -> f64 {
        15_000.0 * f64::from(1u32 << self.numerology())
    }

    /// Bandwidth of one resource block.
    pub fn rb_width_hz(self) -> f64 {
        self.hz() * f64::from(SUBCARRIERS_PER_RB)
    }

    /// Duration of one slot (1 ms subframe divided by `2^µ`).
    pub fn slot_duration(self) -> Duration {
        Duration::from_nanos(1_000_000 >> self.numerology())
    }
}

// ── SpectrumModel ─────────────────────────────────────────────────────────────

/// One subband of a frequency grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandInfo {
    pub fl: f64,
    pub fc: f64,
    pub fh: f64,
}

impl BandInfo {
    pub fn width(&self) -> f64 {
        self.fh - self.fl
    }
}

/// Ordered sequence of contiguous subbands.
#[derive(Debug, PartialEq)]
pub struct SpectrumModel {
    uid: u32,
    bands: Vec<BandInfo>,
}

impl SpectrumModel {
    pub fn from_bands(bands: Vec<BandInfo>) -> Self {
        Self {
            uid: NEXT_MODEL_UID.fetch_add(1, AtomicOrdering::Relaxed),
            bands,
        }
    }

    /// `num_rbs` contiguous RBs of `rb_width_hz` centred on `center_frequency`.
    fn contiguous(num_rbs: u32, center_frequency: f64, rb_width_hz: f64) -> Self {
        let mut f = center_frequency - f64::from(num_rbs) * rb_width_hz / 2.0;
        let bands = (0..num_rbs)
            .map(|_| {
                let fl = f;
                let fc = fl + rb_width_hz / 2.0;
                let fh = fl + rb_width_hz;
                f = fh;
                BandInfo { fl, fc, fh }
            })
            .collect();
        Self::from_bands(bands)
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn bands(&self) -> &[BandInfo] {
        &self.bands
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }
}

// ── SpectrumModelCache ────────────────────────────────────────────────────────

/// Cache key.  Frequencies are compared with `total_cmp` so the key can be
/// totally ordered.
#[derive(Debug, Clone, Copy)]
struct SpectrumModelId {
    frequency: f64,
    num_rbs: u32,
    spacing: SubcarrierSpacing,
}

impl PartialEq for SpectrumModelId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SpectrumModelId {}

impl PartialOrd for SpectrumModelId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SpectrumModelId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.frequency
            .total_cmp(&other.frequency)
            .then_with(|| self.num_rbs.cmp(&other.num_rbs))
            .then_with(|| self.spacing.cmp(&other.spacing))
    }
}

/// Memoizes frequency grids for the lifetime of one simulation run.
#[derive(Debug, Default)]
pub struct SpectrumModelCache {
    models: BTreeMap<SpectrumModelId, Arc<SpectrumModel>>,
}

impl SpectrumModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the grid for `(center_frequency, num_rbs, spacing_hz)`, creating
    /// it on first request.
    ///
    /// # Errors
    /// * [`SpectrumError::ZeroBandwidth`] if `num_rbs == 0`.
    /// * [`SpectrumError::CenterFrequencyOutOfRange`] outside 0.5–100 GHz.
    /// * [`SpectrumError::UnsupportedSubcarrierSpacing`] for any spacing other
    ///   than 15/30/60/120/240/480 kHz.
    pub fn get(
        &mut self,
        num_rbs: u32,
        center_frequency: f64,
        spacing_hz: f64,
    ) -> Result<Arc<SpectrumModel>, SpectrumError> {
        if num_rbs == 0 {
            return Err(SpectrumError::ZeroBandwidth);
        }
        if !(MIN_CENTER_FREQUENCY_HZ..=MAX_CENTER_FREQUENCY_HZ).contains(&center_frequency) {
            return Err(SpectrumError::CenterFrequencyOutOfRange {
                frequency_hz: center_frequency,
            });
        }
        let spacing = SubcarrierSpacing::from_hz(spacing_hz)?;

        let id = SpectrumModelId {
            frequency: center_frequency,
            num_rbs,
            spacing,
        };
        if let Some(model) = self.models.get(&id) {
            debug!(uid = model.uid(), "spectrum model cache hit");
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(SpectrumModel::contiguous(
            num_rbs,
            center_frequency,
            spacing.rb_width_hz(),
        ));
        info!(
            frequency_hz = center_frequency,
            num_rbs,
            spacing_hz,
            uid = model.uid(),
            "created spectrum model"
        );
        self.models.insert(id, Arc::clone(&model));
        Ok(model)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Drop every cached grid (simulation teardown).
    pub fn clear(&mut self) {
        self.models.clear();
    }
}

// ── SpectrumValue ─────────────────────────────────────────────────────────────

/// One value per band of a [`SpectrumModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumValue {
    model: Arc<SpectrumModel>,
    values: Vec<f64>,
}

impl SpectrumValue {
    /// All-zero value on `model`.
    pub fn zeros(model: &Arc<SpectrumModel>) -> Self {
        Self::filled(model, 0.0)
    }

    pub fn filled(model: &Arc<SpectrumModel>, value: f64) -> Self {
        Self {
            model: Arc::clone(model),
            values: vec![value; model.num_bands()],
        }
    }

    /// # Panics
    /// If `values.len()` differs from the number of bands.
    pub fn from_values(model: &Arc<SpectrumModel>, values: Vec<f64>) -> Self {
        assert_eq!(
            values.len(),
            model.num_bands(),
            "value count must match the grid band count"
        );
        Self {
            model: Arc::clone(model),
            values,
        }
    }

    pub fn model(&self) -> &Arc<SpectrumModel> {
        &self.model
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Integral of the PSD over frequency (W when the values are W/Hz).
    pub fn integral(&self) -> f64 {
        self.values
            .iter()
            .zip(self.model.bands())
            .map(|(v, b)| v * b.width())
            .sum()
    }

    /// Apply `f` to every band, returning a new value on the same grid.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            model: Arc::clone(&self.model),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn same_grid(&self, other: &SpectrumValue) -> bool {
        Arc::ptr_eq(&self.model, &other.model) || self.model.bands == other.model.bands
    }

    fn assert_same_grid(&self, other: &SpectrumValue) {
        assert!(
            self.same_grid(other),
            "spectrum values live on different grids (uid {} vs {})",
            self.model.uid(),
            other.model.uid()
        );
    }

    fn zip_with(&self, other: &SpectrumValue, f: impl Fn(f64, f64) -> f64) -> SpectrumValue {
        self.assert_same_grid(other);
        SpectrumValue {
            model: Arc::clone(&self.model),
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }
}

impl Index<usize> for SpectrumValue {
    type Output = f64;

    fn index(&self, band: usize) -> &f64 {
        &self.values[band]
    }
}

impl IndexMut<usize> for SpectrumValue {
    fn index_mut(&mut self, band: usize) -> &mut f64 {
        &mut self.values[band]
    }
}

impl Add for &SpectrumValue {
    type Output = SpectrumValue;

    fn add(self, rhs: &SpectrumValue) -> SpectrumValue {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for &SpectrumValue {
    type Output = SpectrumValue;

    fn sub(self, rhs: &SpectrumValue) -> SpectrumValue {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Mul for &SpectrumValue {
    type Output = SpectrumValue;

    fn mul(self, rhs: &SpectrumValue) -> SpectrumValue {
        self.zip_with(rhs, |a, b| a * b)
    }
}

impl Div for &SpectrumValue {
    type Output = SpectrumValue;

    fn div(self, rhs: &SpectrumValue) -> SpectrumValue {
        self.zip_with(rhs, |a, b| a / b)
    }
}

impl Mul<f64> for &SpectrumValue {
    type Output = SpectrumValue;

    fn mul(self, rhs: f64) -> SpectrumValue {
        self.map(|v| v * rhs)
    }
}

impl AddAssign<&SpectrumValue> for SpectrumValue {
    fn add_assign(&mut self, rhs: &SpectrumValue) {
        self.assert_same_grid(rhs);
        for (a, b) in self.values.iter_mut().zip(&rhs.values) {
            *a += b;
        }
    }
}

impl SubAssign<&SpectrumValue> for SpectrumValue {
    fn sub_assign(&mut self, rhs: &SpectrumValue) {
        self.assert_same_grid(rhs);
        for (a, b) in self.values.iter_mut().zip(&rhs.values) {
            *a -= b;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const FC: f64 = 3.5e9;

    // ── SubcarrierSpacing ─────────────────────────────────────────────────────

    #[test]
    fn spacing_round_trips_through_numerology() {
        for mu in 0..=5u8 {
            let scs = SubcarrierSpacing::from_numerology(mu).unwrap();
            assert_eq!(scs.numerology(), mu);
            assert_eq!(SubcarrierSpacing::from_hz(scs.hz()).unwrap(), scs);
        }
        assert!(SubcarrierSpacing::from_numerology(6).is_none());
    }

    #[test]
    fn unsupported_spacing_is_rejected() {
        let err = SubcarrierSpacing::from_hz(20_000.0).unwrap_err();
        assert_eq!(
            err,
            SpectrumError::UnsupportedSubcarrierSpacing { spacing_hz: 20_000.0 }
        );
    }

    #[test]
    fn slot_duration_halves_per_numerology() {
        assert_eq!(SubcarrierSpacing::Khz15.slot_duration(), Duration::from_micros(1_000));
        assert_eq!(SubcarrierSpacing::Khz30.slot_duration(), Duration::from_micros(500));
        assert_eq!(SubcarrierSpacing::Khz120.slot_duration(), Duration::from_micros(125));
    }

    // ── SpectrumModelCache ────────────────────────────────────────────────────

    #[test]
    fn identical_requests_share_one_grid() {
        let mut cache = SpectrumModelCache::new();
        let a = cache.get(52, FC, 30_000.0).unwrap();
        let b = cache.get(52, FC, 30_000.0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let c = cache.get(52, FC, 15_000.0).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn grid_bands_are_contiguous_and_centred() {
        let mut cache = SpectrumModelCache::new();
        let m = cache.get(10, FC, 30_000.0).unwrap();
        let rb = 30_000.0 * 12.0;

        assert_eq!(m.num_bands(), 10);
        for pair in m.bands().windows(2) {
            assert!((pair[0].fh - pair[1].fl).abs() < 1e-6);
        }
        for b in m.bands() {
            assert!((b.width() - rb).abs() < 1e-6);
            assert!((b.fc - (b.fl + rb / 2.0)).abs() < 1e-6);
        }
        let total = m.bands().last().unwrap().fh - m.bands()[0].fl;
        assert!((total - 10.0 * rb).abs() < 1e-3);
        assert!((m.bands()[0].fl - (FC - 5.0 * rb)).abs() < 1e-3);
    }

    #[test]
    fn zero_rbs_is_rejected() {
        let mut cache = SpectrumModelCache::new();
        assert_eq!(
            cache.get(0, FC, 30_000.0).unwrap_err(),
            SpectrumError::ZeroBandwidth
        );
    }

    #[test]
    fn out_of_range_frequency_is_rejected() {
        let mut cache = SpectrumModelCache::new();
        assert!(matches!(
            cache.get(10, 0.4e9, 30_000.0),
            Err(SpectrumError::CenterFrequencyOutOfRange { .. })
        ));
        assert!(matches!(
            cache.get(10, 101e9, 30_000.0),
            Err(SpectrumError::CenterFrequencyOutOfRange { .. })
        ));
        assert!(cache.get(10, 0.5e9, 15_000.0).is_ok());
        assert!(cache.get(10, 100e9, 120_000.0).is_ok());
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut cache = SpectrumModelCache::new();
        let a = cache.get(10, FC, 30_000.0).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        let b = cache.get(10, FC, 30_000.0).unwrap();
        assert!(!Arc::ptr_eq(&a, &b), "a fresh grid is built after clear()");
    }

    // ── SpectrumValue ─────────────────────────────────────────────────────────

    #[test]
    fn elementwise_arithmetic() {
        let mut cache = SpectrumModelCache::new();
        let m = cache.get(3, FC, 30_000.0).unwrap();
        let a = SpectrumValue::from_values(&m, vec![1.0, 2.0, 3.0]);
        let b = SpectrumValue::from_values(&m, vec![4.0, 5.0, 6.0]);

        assert_eq!((&a + &b).values(), &[5.0, 7.0, 9.0]);
        assert_eq!((&b - &a).values(), &[3.0, 3.0, 3.0]);
        assert_eq!((&a * &b).values(), &[4.0, 10.0, 18.0]);
        assert_eq!((&b / &a).values(), &[4.0, 2.5, 2.0]);
        assert_eq!((&a * 2.0).values(), &[2.0, 4.0, 6.0]);

        let mut c = a.clone();
        c += &b;
        c -= &a;
        assert_eq!(c, b);
        assert_eq!(a.sum(), 6.0);
    }

    #[test]
    #[should_panic(expected = "different grids")]
    fn mixing_grids_panics() {
        let mut cache = SpectrumModelCache::new();
        let m1 = cache.get(3, FC, 30_000.0).unwrap();
        let m2 = cache.get(4, FC, 30_000.0).unwrap();
        let _ = &SpectrumValue::zeros(&m1) + &SpectrumValue::zeros(&m2);
    }
}
