//! Main-loop runner: driver cycle → controller cycle → telemetry.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to one CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`.
//!
//! Without the `rt` feature every step except the prefault is a no-op.
//!
//! ## Cycle Loop
//! Deadlines advance by exactly one cycle time from the loop start, so a
//! late cycle does not shift the ones after it. Overruns are counted, not
//! fatal.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use efi_common::config::{ConfigError, EfiConfig};
use efi_common::control_unit::error::GuardFlags;
use efi_common::hal::driver::{EfiDriver, HalError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::controller::Controller;
use crate::isr::IsrHandle;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing and guard statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: u64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: u64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: u64,
    /// Running sum for average computation.
    pub sum_cycle_ns: u64,
    /// Cycles whose body took longer than the cycle time.
    pub overruns: u64,
    /// Cycles in which at least one injection event was skipped.
    pub pulse_skip_cycles: u64,
    /// Cycles that raised a warning-level guard.
    pub warn_cycles: u64,
    /// Failed telemetry writes.
    pub telemetry_errors: u64,
    /// Guards of the most recent cycle.
    #[serde(skip)]
    pub last_guards: GuardFlags,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: u64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            pulse_skip_cycles: 0,
            warn_cycles: 0,
            telemetry_errors: 0,
            last_guards: GuardFlags::empty(),
        }
    }

    /// Record one cycle. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: u64, guards: GuardFlags) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        if guards.contains(GuardFlags::PULSE_SKIPPED) {
            self.pulse_skip_cycles += 1;
        }
        if guards.has_warning() {
            self.warn_cycles += 1;
        }
        self.last_guards = guards;
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during RT setup or runner lifecycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("RT setup error: {0}")]
    RtSetup(String),

    #[error("driver error: {0}")]
    Driver(#[from] HalError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ─── RT Setup ───────────────────────────────────────────────────────

const PREFAULT_STACK_BYTES: usize = 256 * 1024;

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch the stack so the loop never takes a page fault on it.
fn prefault_stack() {
    let mut buf = [0u8; PREFAULT_STACK_BYTES];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup sequence. Call once, before [`CycleRunner::run`].
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the driver and the controller and paces the main loop.
pub struct CycleRunner {
    driver: Box<dyn EfiDriver>,
    controller: Controller,
    isr: IsrHandle,
    cycle_time: Duration,
    stats: CycleStats,
    telemetry_out: Option<Box<dyn Write + Send>>,
}

impl CycleRunner {
    /// Validate `config`, initialize `driver` and build the controller on
    /// the driver's injector and clock.
    pub fn new(config: &EfiConfig, mut driver: Box<dyn EfiDriver>) -> Result<Self, CycleError> {
        config.validate()?;
        driver.init(config)?;

        let controller = Controller::new(config, driver.injector(), driver.clock());
        let isr = controller.isr_handle();
        let cycle_time = Duration::from_micros(u64::from(config.controller.cycle_time_us));

        info!(
            "CycleRunner ready: driver={} v{}, cycle={}µs",
            driver.name(),
            driver.version(),
            config.controller.cycle_time_us
        );

        Ok(Self {
            driver,
            controller,
            isr,
            cycle_time,
            stats: CycleStats::new(),
            telemetry_out: None,
        })
    }

    /// Send telemetry frames to `out`.
    pub fn with_telemetry_sink(mut self, out: Box<dyn Write + Send>) -> Self {
        self.telemetry_out = Some(out);
        self
    }

    #[inline]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Mutable access, for commands between cycles.
    #[inline]
    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    #[inline]
    pub fn driver(&self) -> &dyn EfiDriver {
        self.driver.as_ref()
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    #[inline]
    pub fn cycle_time(&self) -> Duration {
        self.cycle_time
    }

    /// One cycle body: let the driver deliver interrupts and sample the
    /// sensors, run the controller, then offer a telemetry frame.
    pub fn step(&mut self) -> GuardFlags {
        let started = Instant::now();

        let readings = self.driver.cycle(&self.isr, self.cycle_time);
        let guards = self.controller.run_cycle(&readings);

        if let Some(out) = self.telemetry_out.as_mut() {
            if let Err(e) = self.controller.try_sending_data(out.as_mut()) {
                self.stats.telemetry_errors += 1;
                warn!("Telemetry write failed: {e}");
            }
        }

        let elapsed_ns = started.elapsed().as_nanos() as u64;
        self.stats.record(elapsed_ns, guards);
        if elapsed_ns > self.cycle_time.as_nanos() as u64 {
            self.stats.overruns += 1;
        }
        guards
    }

    /// Run `cycles` cycles back to back without pacing.
    ///
    /// Returns every guard raised along the way.
    pub fn run_for(&mut self, cycles: u64) -> GuardFlags {
        let mut seen = GuardFlags::empty();
        for _ in 0..cycles {
            seen |= self.step();
        }
        seen
    }

    /// Paced loop until `running` goes false or `max_cycles` is reached,
    /// then shut down.
    pub fn run(&mut self, running: &AtomicBool, max_cycles: Option<u64>) -> Result<(), CycleError> {
        info!("Entering cycle loop");
        let start = Instant::now();
        let mut next_wake = start;
        let mut executed = 0u64;
        let mut late_logged = false;

        while running.load(Ordering::SeqCst) && max_cycles.is_none_or(|max| executed < max) {
            next_wake += self.cycle_time;
            self.step();
            executed += 1;

            let now = Instant::now();
            if let Some(remaining) = next_wake.checked_duration_since(now) {
                std::thread::sleep(remaining);
            } else if !late_logged {
                late_logged = true;
                warn!(
                    "Cycle {} missed its deadline by {:?} (body {}ns)",
                    self.stats.cycle_count,
                    now - next_wake,
                    self.stats.last_cycle_ns
                );
            }
        }

        debug!(
            "Cycle loop left after {} cycles in {:?}",
            executed,
            start.elapsed()
        );
        self.shutdown()
    }

    /// Disable the injector, stop the driver and flush telemetry.
    pub fn shutdown(&mut self) -> Result<(), CycleError> {
        self.controller.disable_inj();
        self.driver.shutdown()?;
        if let Some(out) = self.telemetry_out.as_mut() {
            if let Err(e) = out.flush() {
                warn!("Telemetry flush failed: {e}");
            }
        }
        info!(
            "Runner stopped: {} cycles, avg {}ns, max {}ns, {} overruns, {} revolutions",
            self.stats.cycle_count,
            self.stats.avg_cycle_ns(),
            self.stats.max_cycle_ns,
            self.stats.overruns,
            self.controller.total_revolutions()
        );
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
