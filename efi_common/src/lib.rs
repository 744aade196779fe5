//! EFI Common Library
//!
//! Shared constants, configuration loading, hardware-boundary traits and the
//! telemetry codec for all EFI workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Table geometry, physical constants, frame layout
//! - [`config`] - Configuration loading traits and the full `EfiConfig`
//! - [`control_unit`] - State enums, guard flags, commands, config sections
//! - [`hal`] - Driver, injector, clock and interrupt traits
//! - [`telemetry`] - 44-byte telemetry frame codec and stream synchroniser
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod control_unit;
pub mod hal;
pub mod prelude;
pub mod telemetry;
