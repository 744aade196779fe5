//! Prelude module for common re-exports.
//!
//! ```rust
//! use efi_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, EfiConfig, LogLevel, SharedConfig, load_config};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CYCLE_TIME_US, NUM_TABLE_COLS, NUM_TABLE_ROWS};

// ─── Control Unit ───────────────────────────────────────────────────
pub use crate::control_unit::command::{Command, CommandError, PulseRecalc, TableCell};
pub use crate::control_unit::error::GuardFlags;
pub use crate::control_unit::state::{EngineSample, EngineState, InjectorState};

// ─── HAL ────────────────────────────────────────────────────────────
pub use crate::hal::driver::{
    DriverFactory, EfiDriver, HalError, InjectorOutput, InterruptSink, MicrosClock,
};
pub use crate::hal::types::SensorReadings;

// ─── Telemetry ──────────────────────────────────────────────────────
pub use crate::telemetry::{FrameSync, TelemetryError, TelemetryFrame};

/// Default main-loop cycle time as Duration.
pub const DEFAULT_CYCLE_TIME: Duration = Duration::from_micros(CYCLE_TIME_US as u64);
