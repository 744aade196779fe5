//! Hardware abstraction layer boundary.
//!
//! - [`driver`] - driver, injector, clock and interrupt traits plus `HalError`
//! - [`types`] - sensor readings handed back by a driver cycle
//! - [`config`] - simulation driver configuration

pub mod config;
pub mod driver;
pub mod types;
