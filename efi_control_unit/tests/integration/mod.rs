mod closed_loop;
mod concurrency;
mod engine_stop;
mod startup;
mod telemetry_stream;

use efi_common::config::EfiConfig;
use efi_common::hal::config::SimulationConfig;
use efi_control_unit::CycleRunner;

/// Config for a steady simulated operating point.
pub fn steady_config(rpm: f64, map_kpa: f64, tps_pct: f64) -> EfiConfig {
    EfiConfig {
        simulation: SimulationConfig::steady(rpm, map_kpa, tps_pct),
        ..Default::default()
    }
}

/// Runner on a fresh simulation driver from the default registry.
pub fn sim_runner(config: &EfiConfig) -> CycleRunner {
    let driver = efi_hal::default_registry()
        .create_driver("simulation")
        .expect("simulation driver registered");
    CycleRunner::new(config, driver).expect("runner")
}
