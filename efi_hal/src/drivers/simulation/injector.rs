//! Simulated injector pin and one-shot off-timer.

use super::clock::SimClock;
use efi_common::hal::driver::{InjectorOutput, MicrosClock};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct PinState {
    high: bool,
    rose_at_us: u64,
    deadline_us: Option<u64>,
    on_time_us: u64,
    rising_edges: u64,
    /// Width of the last completed pulse, until the engine model consumes it.
    completed_pulse_us: Option<u64>,
}

/// Injector output backed by the simulated clock.
#[derive(Debug)]
pub struct SimInjector {
    clock: Arc<SimClock>,
    state: Mutex<PinState>,
}

impl SimInjector {
    /// New injector, output low, timer idle.
    pub fn new(clock: Arc<SimClock>) -> Self {
        Self {
            clock,
            state: Mutex::new(PinState::default()),
        }
    }

    /// Pending timer expiry, if any.
    pub fn deadline_us(&self) -> Option<u64> {
        self.state.lock().deadline_us
    }

    /// Clear the pending expiry so it can be delivered.
    pub(crate) fn take_deadline(&self) -> Option<u64> {
        self.state.lock().deadline_us.take()
    }

    /// Width of the last completed pulse, consumed once.
    pub(crate) fn take_completed_pulse(&self) -> Option<u64> {
        self.state.lock().completed_pulse_us.take()
    }

    /// Total time the output has been high [µs].
    pub fn on_time_us(&self) -> u64 {
        let st = self.state.lock();
        let open = if st.high {
            self.clock.now_us().saturating_sub(st.rose_at_us)
        } else {
            0
        };
        st.on_time_us + open
    }

    /// Number of low-to-high transitions.
    pub fn rising_edges(&self) -> u64 {
        self.state.lock().rising_edges
    }
}

impl InjectorOutput for SimInjector {
    fn set_output(&self, high: bool) {
        let now = self.clock.now_us();
        let mut st = self.state.lock();
        match (st.high, high) {
            (false, true) => {
                st.rose_at_us = now;
                st.rising_edges += 1;
            }
            (true, false) => {
                let width = now.saturating_sub(st.rose_at_us);
                st.on_time_us += width;
                st.completed_pulse_us = Some(width);
            }
            _ => {}
        }
        st.high = high;
    }

    fn output_is_high(&self) -> bool {
        self.state.lock().high
    }

    fn arm_off_timer(&self, duration_us: u32) {
        let deadline = self.clock.now_us() + u64::from(duration_us);
        self.state.lock().deadline_us = Some(deadline);
    }

    fn cancel_off_timer(&self) {
        self.state.lock().deadline_us = None;
    }

    fn off_timer_pending(&self) -> bool {
        self.state.lock().deadline_us.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_width_accounting() {
        let clock = Arc::new(SimClock::new());
        let inj = SimInjector::new(clock.clone());

        clock.set(1_000);
        inj.set_output(true);
        inj.arm_off_timer(2_500);
        assert!(inj.off_timer_pending());
        assert_eq!(inj.deadline_us(), Some(3_500));

        clock.set(3_500);
        assert_eq!(inj.take_deadline(), Some(3_500));
        inj.set_output(false);

        assert!(!inj.off_timer_pending());
        assert_eq!(inj.on_time_us(), 2_500);
        assert_eq!(inj.take_completed_pulse(), Some(2_500));
        assert_eq!(inj.take_completed_pulse(), None);
        assert_eq!(inj.rising_edges(), 1);
    }

    #[test]
    fn cancel_clears_deadline() {
        let clock = Arc::new(SimClock::new());
        let inj = SimInjector::new(clock);
        inj.arm_off_timer(100);
        inj.cancel_off_timer();
        assert_eq!(inj.deadline_us(), None);
    }

    #[test]
    fn repeated_low_is_not_a_pulse() {
        let clock = Arc::new(SimClock::new());
        let inj = SimInjector::new(clock);
        inj.set_output(false);
        inj.set_output(false);
        assert_eq!(inj.take_completed_pulse(), None);
        assert!(!inj.output_is_high());
    }
}
