//! HAL driver traits and error types.
//!
//! This module defines the hardware boundary of the control core:
//! - `InjectorOutput` - injector drive pin plus its one-shot off-timer
//! - `MicrosClock` - free-running microsecond time base
//! - `InterruptSink` - interrupt entry points implemented by the control core
//! - `EfiDriver` - pluggable driver lifecycle (simulation, board support)
//! - `HalError` - error types for HAL operations

use crate::config::EfiConfig;
use crate::hal::types::SensorReadings;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error types for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Hardware communication error
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn EfiDriver>;

/// Optional driver diagnostics.
#[derive(Debug, Clone, Default)]
pub struct DriverDiagnostics {
    /// Number of cycles executed
    pub cycle_count: u64,
    /// Crank edges delivered to the interrupt sink
    pub crank_edges: u64,
    /// Off-timer expiries delivered to the interrupt sink
    pub timer_expiries: u64,
    /// Time the injector output has been high [µs]
    pub injector_on_time_us: u64,
}

/// Injector drive output and its hardware one-shot off-timer.
///
/// Called from both execution contexts, so every method takes `&self`.
/// Implementations must keep each call short and non-blocking.
pub trait InjectorOutput: Send + Sync {
    /// Drive the injector pin high (`true`) or low (`false`).
    fn set_output(&self, high: bool);

    /// Current pin level.
    fn output_is_high(&self) -> bool;

    /// Arm the one-shot timer to expire `duration_us` from now.
    ///
    /// Expiry is delivered through [`InterruptSink::off_timer_expired`].
    fn arm_off_timer(&self, duration_us: u32);

    /// Cancel a pending expiry. No-op if nothing is armed.
    fn cancel_off_timer(&self);

    /// Whether an expiry is still pending.
    fn off_timer_pending(&self) -> bool;
}

/// Free-running microsecond clock (the `micros()` time base).
pub trait MicrosClock: Send + Sync {
    /// Microseconds since driver start. Monotonic.
    fn now_us(&self) -> u64;
}

/// Interrupt entry points.
///
/// The control core implements this; drivers call it from interrupt context
/// (or, in simulation, in event-time order). Implementations must complete in
/// a small, bounded number of steps and must not block.
pub trait InterruptSink {
    /// Crank-position edge detected at `timestamp_us`.
    fn crank_edge(&self, timestamp_us: u64);

    /// Injector off-timer expired at `timestamp_us`.
    fn off_timer_expired(&self, timestamp_us: u64);
}

/// Trait defining the interface for EFI hardware drivers.
///
/// # Lifecycle
///
/// 1. `init()` - Called once before the control loop starts
/// 2. `cycle()` - Called once per main-loop cycle
/// 3. `shutdown()` - Called when the control loop stops
///
/// # Timing Contracts
///
/// | Operation | Max Duration | RT Constraint |
/// |-----------|--------------|---------------|
/// | `init()` | 30 seconds | None (pre-RT) |
/// | `cycle()` | cycle_time_us | **HARD** |
/// | `shutdown()` | 1 second | None (post-RT) |
pub trait EfiDriver: Send {
    /// Returns the driver's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Initialize the driver from the full configuration.
    ///
    /// # Errors
    /// Return `HalError::InitFailed` if initialization cannot complete.
    fn init(&mut self, config: &EfiConfig) -> Result<(), HalError>;

    /// Handle to the injector pin and off-timer.
    fn injector(&self) -> Arc<dyn InjectorOutput>;

    /// Handle to the microsecond clock.
    fn clock(&self) -> Arc<dyn MicrosClock>;

    /// Advance the hardware by `dt`.
    ///
    /// Every crank edge and timer expiry falling inside the step is delivered
    /// to `sink` in timestamp order. Returns the analog inputs at the end of
    /// the step, already scaled to physical units.
    fn cycle(&mut self, sink: &dyn InterruptSink, dt: Duration) -> SensorReadings;

    /// Graceful shutdown. The injector output must be left low.
    fn shutdown(&mut self) -> Result<(), HalError>;

    /// Get driver-specific diagnostics.
    /// Default: None
    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        None
    }
}
