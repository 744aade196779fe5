//! # EFI HAL Library
//!
//! Hardware abstraction for the injection control core. Drivers implement
//! the `EfiDriver` trait defined in `efi_common::hal::driver` and hand the
//! core an injector output, a microsecond clock and, once per cycle, the
//! interrupt events and sensor readings of the elapsed step.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Driver implementations
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐   cycle(sink, dt)   ┌──────────────────────┐
//! │  efi_control_unit  │ ──────────────────► │  EfiDriver           │
//! │  (InterruptSink)   │ ◄────────────────── │  (simulation, ...)   │
//! └────────────────────┘  crank_edge /       └──────────────────────┘
//!                         off_timer_expired
//! ```

#![deny(missing_docs)]

pub mod driver_registry;
pub mod drivers;

pub use crate::driver_registry::DriverRegistry;

/// Registry with every built-in driver registered.
pub fn default_registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    drivers::register_all_drivers(&mut registry);
    registry
}
