//! Simulation driver module.
//!
//! Emulates the crank-position interrupt, the injector pin with its one-shot
//! off-timer, the microsecond clock and the analog sensors. Time is virtual:
//! each `cycle(dt)` advances the simulated clock by exactly `dt`, so runs are
//! deterministic.

mod clock;
mod driver;
mod engine;
mod injector;

pub use clock::SimClock;
pub use driver::SimulationDriver;
pub use engine::EngineModel;
pub use injector::SimInjector;

use efi_common::hal::driver::EfiDriver;

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn EfiDriver> {
    Box::new(SimulationDriver::new())
}
