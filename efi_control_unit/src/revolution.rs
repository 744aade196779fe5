//! RPM estimation from the revolution window counter.
//!
//! The interrupt side only increments counters (see [`crate::isr`]). The main
//! loop consumes the window count with a single atomic swap and converts it to
//! RPM over the time elapsed since the previous calculation:
//!
//! ```text
//! rpm = revolutions × 60_000_000 / (elapsed_us × revs_per_calc)
//! ```
//!
//! Integer arithmetic in `u64`, truncating, saturated into `i32`.

use std::sync::atomic::{AtomicU32, Ordering};

use efi_common::consts::MICROS_PER_MINUTE;

/// Outcome of one [`RpmEstimator::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpmUpdate {
    /// A new RPM was derived from `revolutions` counted edges.
    Updated { rpm: i32, revolutions: u32 },
    /// Nothing usable in the window; the previous RPM stands.
    Held,
}

/// RPM formula. Returns `None` when `elapsed_us` or `revs_per_calc` is zero.
#[inline]
pub fn compute_rpm(revolutions: u32, elapsed_us: u64, revs_per_calc: u32) -> Option<i32> {
    let denom = elapsed_us.checked_mul(u64::from(revs_per_calc))?;
    if denom == 0 {
        return None;
    }
    let rpm = u64::from(revolutions) * MICROS_PER_MINUTE / denom;
    Some(i32::try_from(rpm).unwrap_or(i32::MAX))
}

/// Main-loop side of the revolution counter.
#[derive(Debug, Clone)]
pub struct RpmEstimator {
    rpm: i32,
    last_calc_us: u64,
    revs_per_calc: u32,
}

impl RpmEstimator {
    pub fn new(revs_per_calc: u32, now_us: u64) -> Self {
        Self {
            rpm: 0,
            last_calc_us: now_us,
            revs_per_calc,
        }
    }

    /// Last derived RPM.
    #[inline]
    pub fn rpm(&self) -> i32 {
        self.rpm
    }

    /// Timestamp of the last successful calculation [µs].
    #[inline]
    pub fn last_calc_us(&self) -> u64 {
        self.last_calc_us
    }

    /// Consume the window count and derive RPM.
    ///
    /// With zero elapsed time the window is left untouched. With an empty
    /// window the timestamp is kept, so the next window spans the gap.
    pub fn update(&mut self, window: &AtomicU32, now_us: u64) -> RpmUpdate {
        let elapsed = now_us.saturating_sub(self.last_calc_us);
        if elapsed == 0 {
            return RpmUpdate::Held;
        }
        let revolutions = window.swap(0, Ordering::AcqRel);
        if revolutions == 0 {
            return RpmUpdate::Held;
        }
        match compute_rpm(revolutions, elapsed, self.revs_per_calc) {
            Some(rpm) => {
                self.rpm = rpm;
                self.last_calc_us = now_us;
                RpmUpdate::Updated { rpm, revolutions }
            }
            None => {
                // revs_per_calc == 0 is rejected by config validation; put the
                // edges back rather than lose them.
                window.fetch_add(revolutions, Ordering::AcqRel);
                RpmUpdate::Held
            }
        }
    }

    /// Forget the estimate and start a fresh window at `now_us`.
    ///
    /// Edges still pending in `window` belong to the old run and are dropped;
    /// the total tally is untouched. Returns how many were dropped.
    pub fn reset(&mut self, window: &AtomicU32, now_us: u64) -> u32 {
        self.rpm = 0;
        self.last_calc_us = now_us;
        window.swap(0, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_revs_in_ten_ms() {
        assert_eq!(compute_rpm(2, 10_000, 2), Some(6000));
    }

    #[test]
    fn formula_truncates() {
        // 3 × 60e6 / (7000 × 2) = 12857.14...
        assert_eq!(compute_rpm(3, 7_000, 2), Some(12_857));
    }

    #[test]
    fn saturates_into_i32() {
        assert_eq!(compute_rpm(u32::MAX, 1, 1), Some(i32::MAX));
        assert_eq!(compute_rpm(1, 0, 2), None);
    }

    #[test]
    fn update_consumes_window() {
        let window = AtomicU32::new(2);
        let mut est = RpmEstimator::new(2, 0);
        assert_eq!(
            est.update(&window, 10_000),
            RpmUpdate::Updated {
                rpm: 6000,
                revolutions: 2
            }
        );
        assert_eq!(window.load(Ordering::Relaxed), 0);
        assert_eq!(est.last_calc_us(), 10_000);
    }

    #[test]
    fn zero_elapsed_holds_without_consuming() {
        let window = AtomicU32::new(2);
        let mut est = RpmEstimator::new(2, 0);
        est.update(&window, 10_000);

        window.store(5, Ordering::Relaxed);
        assert_eq!(est.update(&window, 10_000), RpmUpdate::Held);
        assert_eq!(est.rpm(), 6000);
        assert_eq!(window.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn empty_window_holds_and_keeps_timestamp() {
        let window = AtomicU32::new(0);
        let mut est = RpmEstimator::new(2, 0);
        assert_eq!(est.update(&window, 5_000), RpmUpdate::Held);
        assert_eq!(est.last_calc_us(), 0);

        window.store(2, Ordering::Relaxed);
        // Window now spans 0..20 ms.
        assert_eq!(
            est.update(&window, 20_000),
            RpmUpdate::Updated {
                rpm: 3000,
                revolutions: 2
            }
        );
    }

    #[test]
    fn reset_clears_estimate() {
        let window = AtomicU32::new(2);
        let mut est = RpmEstimator::new(2, 0);
        est.update(&window, 10_000);
        assert_eq!(est.reset(&window, 50_000), 0);
        assert_eq!(est.rpm(), 0);
        assert_eq!(est.last_calc_us(), 50_000);
    }

    #[test]
    fn reset_drops_edges_from_before_the_stall() {
        let window = AtomicU32::new(1);
        let mut est = RpmEstimator::new(2, 0);
        assert_eq!(est.reset(&window, 1_000_000), 1);
        assert_eq!(window.load(Ordering::Relaxed), 0);

        // One edge of the new run, 100 ms later.
        window.fetch_add(1, Ordering::Relaxed);
        assert_eq!(
            est.update(&window, 1_100_000),
            RpmUpdate::Updated {
                rpm: 300,
                revolutions: 1
            }
        );
    }
}
