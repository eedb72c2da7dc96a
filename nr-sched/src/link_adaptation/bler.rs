/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Sliding window of recent transport-block outcomes.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

/// Bounded FIFO of "block corrupted" flags with a running corrupted count.
#[derive(Debug, Clone)]
pub struct RecentErrorWindow {
    samples: VecDeque<bool>,
    capacity: usize,
    corrupted: usize,
}

impl Default for RecentErrorWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl RecentErrorWindow {
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "error window capacity must be positive");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            corrupted: 0,
        }
    }

    pub fn push(&mut self, corrupted: bool) {
        if self.samples.len() == self.capacity {
            if let Some(true) = self.samples.pop_front() {
                self.corrupted -= 1;
            }
        }
        self.samples.push_back(corrupted);
        if corrupted {
            self.corrupted += 1;
        }
    }

    /// Fraction of corrupted blocks in the window; 0 when empty.
    pub fn error_rate(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.corrupted as f64 / self.samples.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.corrupted = 0;
    }
}
