//! State machines of the control core.
//!
//! - [`injector`] - `Disabled | Idle | Pulsing` injector actuator
//! - [`engine`] - `Stopped | Running` engine-state monitor

pub mod engine;
pub mod injector;
