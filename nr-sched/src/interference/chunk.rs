/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Consumers of interference-engine samples.
//!
//! Between `start()` and `end()` a processor receives one
//! `evaluate_chunk(values, duration)` call per segment of constant signal
//! composition.  Segments never overlap, so weighting each sample by its
//! duration gives the exact time average over the reception.

use std::time::Duration;

use crate::spectrum::SpectrumValue;

pub trait ChunkProcessor {
    fn start(&mut self);

    fn evaluate_chunk(&mut self, values: &SpectrumValue, duration: Duration);

    fn end(&mut self);
}

/// Duration-weighted per-band mean, delivered to a callback at `end()`.
///
/// Nothing is delivered for a reception that produced no chunk (zero
/// elapsed time).
pub struct AveragingChunkProcessor<F>
where
    F: FnMut(&SpectrumValue),
{
    weighted_sum: Option<SpectrumValue>,
    total: Duration,
    on_end: F,
}

impl<F> AveragingChunkProcessor<F>
where
    F: FnMut(&SpectrumValue),
{
    pub fn new(on_end: F) -> Self {
        Self {
            weighted_sum: None,
            total: Duration::ZERO,
            on_end,
        }
    }
}

impl<F> ChunkProcessor for AveragingChunkProcessor<F>
where
    F: FnMut(&SpectrumValue),
{
    fn start(&mut self) {
        self.weighted_sum = None;
        self.total = Duration::ZERO;
    }

    fn evaluate_chunk(&mut self, values: &SpectrumValue, duration: Duration) {
        let weighted = values * duration.as_secs_f64();
        match &mut self.weighted_sum {
            Some(sum) => *sum += &weighted,
            None => self.weighted_sum = Some(weighted),
        }
        self.total += duration;
    }

    fn end(&mut self) {
        if let Some(sum) = self.weighted_sum.take() {
            if !self.total.is_zero() {
                let mean = &sum * (1.0 / self.total.as_secs_f64());
                (self.on_end)(&mean);
            }
        }
        self.total = Duration::ZERO;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
