//! # EFI Control Unit Library
//!
//! Fuel-injection control core for a single-injector engine. Counts crank
//! edges, derives RPM, looks up and trims the injector pulse, drives the
//! injector through a three-state actuator and streams telemetry.
//!
//! ## Contexts
//!
//! 1. **Interrupt**: crank edge → [`isr::IsrShared::count_revolution`],
//!    off-timer expiry → injector `pulse_off`. Atomics only, never blocks.
//! 2. **Main loop**: [`controller::Controller::run_cycle`], driven by
//!    [`cycle::CycleRunner`] once per cycle time.
//!
//! ## Fuel Equation
//!
//! ```text
//! pulse_us = base(rpm, map) / IAT_K × startup × throttle × trim(rpm, map) × (1 + idle)
//! base     = MAP_Pa × V_charge / R_air / AFR_target / flow_kg_s × 1e6     [µs·K]
//! ```

pub mod config;
pub mod control;
pub mod controller;
pub mod cycle;
pub mod isr;
pub mod revolution;
pub mod state;
pub mod table;
pub mod telemetry;

pub use crate::controller::Controller;
pub use crate::cycle::{CycleError, CycleRunner, CycleStats};
