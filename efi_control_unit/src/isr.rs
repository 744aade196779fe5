//! State shared between interrupt context and the main loop.
//!
//! [`IsrShared`] holds everything an interrupt handler touches: the
//! revolution counters, the last edge timestamp and the injector actuator.
//! The controller owns it through an `Arc`; handlers get an [`IsrHandle`],
//! another reference to the same object.
//!
//! Handlers never block on the main loop and never log. Counters are atomics;
//! injector transitions run under [`InterruptMask`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use efi_common::hal::driver::{InjectorOutput, InterruptSink};
use parking_lot::{Mutex, MutexGuard};

use crate::state::injector::InjectorActuator;

// ─── Interrupt Mask ─────────────────────────────────────────────────

/// Host stand-in for masking interrupts.
///
/// On a microcontroller this would disable interrupts for the closure; on
/// the host a mutex gives the same mutual exclusion between contexts.
#[derive(Debug, Default)]
pub struct InterruptMask {
    lock: Mutex<()>,
}

/// Proof that the mask is held.
pub struct CriticalSection<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl InterruptMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with interrupts masked. Not reentrant.
    #[inline]
    pub fn free<R>(&self, f: impl FnOnce(&CriticalSection<'_>) -> R) -> R {
        let cs = CriticalSection {
            _guard: self.lock.lock(),
        };
        f(&cs)
    }
}

// ─── Shared State ───────────────────────────────────────────────────

pub struct IsrShared {
    total_revolutions: AtomicU64,
    window_revolutions: AtomicU32,
    last_edge_us: AtomicU64,
    last_injection_us: AtomicU64,
    revs_per_injection: u64,
    injector: InjectorActuator,
}

impl IsrShared {
    pub fn new(output: Arc<dyn InjectorOutput>, revs_per_injection: u32) -> Self {
        Self {
            total_revolutions: AtomicU64::new(0),
            window_revolutions: AtomicU32::new(0),
            last_edge_us: AtomicU64::new(0),
            last_injection_us: AtomicU64::new(0),
            revs_per_injection: u64::from(revs_per_injection.max(1)),
            injector: InjectorActuator::new(output),
        }
    }

    /// Crank-edge handler body.
    ///
    /// Stamps the edge, increments both counters and fires the injector on
    /// every `revs_per_injection`-th edge. The stamp is stored first so a
    /// reader that sees the new tally also sees this edge's time.
    pub fn count_revolution(&self, timestamp_us: u64) {
        self.last_edge_us.store(timestamp_us, Ordering::Release);
        let total = self.total_revolutions.fetch_add(1, Ordering::AcqRel) + 1;
        self.window_revolutions.fetch_add(1, Ordering::AcqRel);

        if total % self.revs_per_injection == 0 && self.injector.pulse_on().is_ok() {
            self.last_injection_us
                .store(timestamp_us, Ordering::Release);
        }
    }

    /// Monotonic edge tally.
    #[inline]
    pub fn total_revolutions(&self) -> u64 {
        self.total_revolutions.load(Ordering::Acquire)
    }

    /// Window counter, consumed by the RPM estimator.
    #[inline]
    pub fn window(&self) -> &AtomicU32 {
        &self.window_revolutions
    }

    #[inline]
    pub fn pending_revolutions(&self) -> u32 {
        self.window_revolutions.load(Ordering::Acquire)
    }

    /// Timestamp of the last crank edge, `None` before the first one.
    #[inline]
    pub fn last_edge_us(&self) -> Option<u64> {
        (self.total_revolutions() > 0).then(|| self.last_edge_us.load(Ordering::Acquire))
    }

    #[inline]
    pub fn last_injection_us(&self) -> u64 {
        self.last_injection_us.load(Ordering::Acquire)
    }

    #[inline]
    pub fn injector(&self) -> &InjectorActuator {
        &self.injector
    }
}

// ─── Interrupt Handle ───────────────────────────────────────────────

/// Reference to [`IsrShared`] given to interrupt handlers.
#[derive(Clone)]
pub struct IsrHandle(Arc<IsrShared>);

impl IsrHandle {
    pub fn new(shared: Arc<IsrShared>) -> Self {
        Self(shared)
    }

    pub fn shared(&self) -> &IsrShared {
        &self.0
    }
}

impl InterruptSink for IsrHandle {
    fn crank_edge(&self, timestamp_us: u64) {
        self.0.count_revolution(timestamp_us);
    }

    fn off_timer_expired(&self, _timestamp_us: u64) {
        self.0.injector.pulse_off();
    }
}
