//! Signal conditioning for the analog inputs.
//!
//! Fixed-window moving average over the last `window` samples. Storage is a
//! `heapless::Deque`, so updates never allocate.

use efi_common::control_unit::config::FILTER_WINDOW_MAX;
use heapless::Deque;

/// Noise-reduced sensor reading.
#[derive(Debug, Clone)]
pub struct FilteredSensor {
    window: usize,
    samples: Deque<f64, FILTER_WINDOW_MAX>,
}

impl FilteredSensor {
    /// `window` is clamped to `1..=FILTER_WINDOW_MAX`.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.clamp(1, FILTER_WINDOW_MAX),
            samples: Deque::new(),
        }
    }

    /// Push a raw sample, evicting the oldest once the window is full.
    /// Non-finite samples are dropped.
    #[inline]
    pub fn update(&mut self, raw: f64) {
        if !raw.is_finite() {
            return;
        }
        if self.samples.len() >= self.window {
            self.samples.pop_front();
        }
        // Cannot fail: len < window <= capacity after the eviction above.
        let _ = self.samples.push_back(raw);
    }

    /// Mean of the samples in the window; 0.0 before the first sample.
    #[inline]
    pub fn value(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    #[inline]
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
