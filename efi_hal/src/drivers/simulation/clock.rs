//! Virtual microsecond clock.

use efi_common::hal::driver::MicrosClock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Manually advanced clock shared by the simulated peripherals.
#[derive(Debug, Default)]
pub struct SimClock {
    now_us: AtomicU64,
}

impl SimClock {
    /// Clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to `t_us`. Never moves backwards.
    pub fn set(&self, t_us: u64) {
        self.now_us.fetch_max(t_us, Ordering::AcqRel);
    }

    /// Advance by `dt_us`.
    pub fn advance(&self, dt_us: u64) {
        self.now_us.fetch_add(dt_us, Ordering::AcqRel);
    }
}

impl MicrosClock for SimClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic() {
        let clock = SimClock::new();
        clock.set(100);
        clock.set(50);
        assert_eq!(clock.now_us(), 100);
        clock.advance(25);
        assert_eq!(clock.now_us(), 125);
    }
}
