//! Acceleration enrichment from the throttle opening rate.

use efi_common::control_unit::config::ThrottleConfig;

/// Throttle-rate differentiator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrottleRate {
    prev: Option<(f64, u64)>,
}

impl ThrottleRate {
    /// Feed a TPS sample [%] taken at `now_us`; returns dTPS/dt [%/s].
    ///
    /// The first sample, and any sample with no elapsed time, yields 0.
    pub fn update(&mut self, tps: f64, now_us: u64) -> f64 {
        let rate = match self.prev {
            Some((prev_tps, prev_us)) if now_us > prev_us => {
                (tps - prev_tps) / ((now_us - prev_us) as f64 * 1e-6)
            }
            _ => 0.0,
        };
        self.prev = Some((tps, now_us));
        rate
    }

    #[inline]
    pub fn reset(&mut self) {
        self.prev = None;
    }
}

/// Enrichment factor for throttle rate `dtps` [%/s].
///
/// `1 + gain × dtps` above the threshold, clamped to `[1, max]`; 1 otherwise.
#[inline]
pub fn throttle_adjustment(dtps: f64, config: &ThrottleConfig) -> f64 {
    if dtps > config.threshold {
        (1.0 + config.gain * dtps).clamp(1.0, config.max.max(1.0))
    } else {
        1.0
    }
}
