//! Injector actuator.
//!
//! Three-state machine stored in an atomic so either context can read it
//! without locking. Every transition runs inside the interrupt mask.
//!
//! | From | Operation | To | Output |
//! |------|-----------|----|--------|
//! | `Disabled` | `enable` | `Idle` | low |
//! | any | `disable` | `Disabled` | forced low, timer cancelled |
//! | `Idle` | `pulse_on` | `Pulsing` | high, timer armed |
//! | `Pulsing` | `pulse_off` | `Idle` | low |
//!
//! Anything else is a no-op. The output is only ever high in `Pulsing`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

use efi_common::control_unit::state::InjectorState;
use efi_common::hal::driver::InjectorOutput;

use crate::isr::InterruptMask;

/// Why [`InjectorActuator::pulse_on`] did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseRejected {
    /// Not in `Idle`.
    NotIdle(InjectorState),
    /// The previous off-timer has not expired yet.
    TimerPending,
    /// No pulse scheduled.
    ZeroWidth,
}

pub struct InjectorActuator {
    state: AtomicU8,
    scheduled_pulse_us: AtomicU32,
    total_pulse_us: AtomicU64,
    pulses: AtomicU64,
    skipped: AtomicU32,
    output: Arc<dyn InjectorOutput>,
    mask: InterruptMask,
}

impl InjectorActuator {
    /// New actuator in `Disabled`; forces the output low.
    pub fn new(output: Arc<dyn InjectorOutput>) -> Self {
        output.cancel_off_timer();
        output.set_output(false);
        Self {
            state: AtomicU8::new(InjectorState::Disabled as u8),
            scheduled_pulse_us: AtomicU32::new(0),
            total_pulse_us: AtomicU64::new(0),
            pulses: AtomicU64::new(0),
            skipped: AtomicU32::new(0),
            output,
            mask: InterruptMask::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> InjectorState {
        InjectorState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or_default()
    }

    #[inline]
    fn transition(&self, from: InjectorState, to: InjectorState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Disabled → Idle`. Clears any stale timer so the first pulse can fire.
    pub fn enable(&self) -> bool {
        self.mask.free(|_| {
            if self.transition(InjectorState::Disabled, InjectorState::Idle) {
                self.output.cancel_off_timer();
                true
            } else {
                false
            }
        })
    }

    /// Any state `→ Disabled`. Cancels the timer and forces the output low.
    pub fn disable(&self) {
        self.mask.free(|_| {
            self.state
                .store(InjectorState::Disabled as u8, Ordering::Release);
            self.output.cancel_off_timer();
            self.output.set_output(false);
        });
    }

    /// `Idle → Pulsing` for the scheduled duration.
    ///
    /// Skipped and counted if the previous off-timer is still pending.
    pub fn pulse_on(&self) -> Result<u32, PulseRejected> {
        self.mask.free(|_| {
            let state = self.state();
            if state != InjectorState::Idle {
                return Err(PulseRejected::NotIdle(state));
            }
            if self.output.off_timer_pending() {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return Err(PulseRejected::TimerPending);
            }
            let width = self.scheduled_pulse_us.load(Ordering::Acquire);
            if width == 0 {
                return Err(PulseRejected::ZeroWidth);
            }
            self.state
                .store(InjectorState::Pulsing as u8, Ordering::Release);
            self.output.set_output(true);
            self.output.arm_off_timer(width);
            self.total_pulse_us
                .fetch_add(u64::from(width), Ordering::Relaxed);
            self.pulses.fetch_add(1, Ordering::Relaxed);
            Ok(width)
        })
    }

    /// `Pulsing → Idle`. Idempotent; a late expiry after `disable` does nothing.
    pub fn pulse_off(&self) -> bool {
        self.mask.free(|_| {
            if self.transition(InjectorState::Pulsing, InjectorState::Idle) {
                self.output.set_output(false);
                true
            } else {
                false
            }
        })
    }

    /// Set the duration used by the next `pulse_on`.
    #[inline]
    pub fn schedule(&self, pulse_us: u32) {
        self.scheduled_pulse_us.store(pulse_us, Ordering::Release);
    }

    #[inline]
    pub fn scheduled_pulse_us(&self) -> u32 {
        self.scheduled_pulse_us.load(Ordering::Acquire)
    }

    /// Sum of all fired pulse durations [µs].
    #[inline]
    pub fn total_pulse_us(&self) -> u64 {
        self.total_pulse_us.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }

    /// Skipped pulses since the last call.
    #[inline]
    pub fn take_skipped(&self) -> u32 {
        self.skipped.swap(0, Ordering::AcqRel)
    }

    #[inline]
    pub fn output_is_high(&self) -> bool {
        self.output.output_is_high()
    }
}
