//! Engine start from the shipped configuration.
//!
//! The default profile cranks from rest to 400 rpm in 0.3 s and reaches
//! idle (1800 rpm, 35 kPa) at 1.5 s.

use std::path::PathBuf;

use efi_common::control_unit::state::{EngineState, InjectorState};
use efi_control_unit::config::{ConfigSource, resolve_config};

use super::sim_runner;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/efi.toml")
}

#[test]
fn shipped_config_is_valid() {
    let path = shipped_config();
    let (config, source) = resolve_config(Some(path.as_path())).unwrap();
    assert!(matches!(source, ConfigSource::File(_)));
    assert_eq!(config.simulation.profile.len(), 7);
    assert_eq!(
        config.simulation.edges_per_revolution,
        config.controller.revs_per_calc
    );
}

#[test]
fn cranking_engine_starts_and_fuels() {
    let (config, _) = resolve_config(Some(shipped_config().as_path())).unwrap();
    let mut runner = sim_runner(&config);

    // At rest: nothing counted, injector held off.
    runner.run_for(10);
    assert_eq!(runner.controller().engine_state(), EngineState::Stopped);
    assert_eq!(runner.controller().injector_state(), InjectorState::Disabled);
    assert_eq!(runner.controller().total_pulse_time_us(), 0);

    runner.run_for(1_490);
    let ctl = runner.controller();
    assert_eq!(ctl.engine_state(), EngineState::Running);
    assert!(ctl.injector_state().is_enabled());
    assert!((ctl.rpm() - 1800).abs() < 200, "rpm {}", ctl.rpm());
    assert!(ctl.total_revolutions() > 20);
    assert!(ctl.total_pulse_time_us() > 0);
    assert!(ctl.startup_modifier() > 1.0);
    assert!((ctl.sample().map - 35.0).abs() < 1.0);
}

#[test]
fn unknown_driver_is_rejected() {
    let registry = efi_hal::default_registry();
    assert!(registry.create_driver("bosch_me7").is_err());
    assert_eq!(registry.list_drivers(), vec!["simulation"]);
}
