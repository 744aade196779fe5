//! Stall and restart.
//!
//! Profile: idle at 1800 rpm, the crank stops at 1.1 s, stays still until
//! 2.8 s, then the engine is restarted and back at idle by 2.9 s.

use efi_common::config::EfiConfig;
use efi_common::control_unit::state::{EngineState, InjectorState};
use efi_common::hal::config::{ProfilePoint, SimulationConfig};
use efi_control_unit::table::Table;

use super::sim_runner;

fn stall_profile() -> EfiConfig {
    EfiConfig {
        simulation: SimulationConfig {
            profile: vec![
                ProfilePoint::new(0.0, 1800.0, 35.0, 2.0),
                ProfilePoint::new(1.0, 1800.0, 35.0, 2.0),
                ProfilePoint::new(1.1, 0.0, 100.0, 0.0),
                ProfilePoint::new(2.8, 0.0, 100.0, 0.0),
                ProfilePoint::new(2.9, 1800.0, 35.0, 2.0),
            ],
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn stall_disables_injector_and_restart_reenables() {
    let mut runner = sim_runner(&stall_profile());

    runner.run_for(1_000);
    {
        let ctl = runner.controller();
        assert_eq!(ctl.engine_state(), EngineState::Running);
        assert!(ctl.injector_state().is_enabled());
        // Startup enrichment makes the exhaust rich; the AFR loop has
        // already leaned the idle cell.
        assert_ne!(ctl.trim_table(), &Table::filled(1.0));
    }
    let revs_before_stall = runner.controller().total_revolutions();

    runner.run_for(1_500);
    {
        let ctl = runner.controller();
        assert_eq!(ctl.engine_state(), EngineState::Stopped);
        assert_eq!(ctl.injector_state(), InjectorState::Disabled);
        assert!(!runner.driver().injector().output_is_high());
        assert_eq!(ctl.trim_table(), &Table::filled(1.0));
        assert_eq!(ctl.idle_trim(), 0.0);
        assert_eq!(ctl.rpm(), 0);
        assert!(ctl.total_revolutions() >= revs_before_stall);
    }
    let pulse_time_stopped = runner.controller().total_pulse_time_us();

    // A stopped engine gets no fuel.
    runner.run_for(100);
    assert_eq!(runner.controller().total_pulse_time_us(), pulse_time_stopped);

    runner.run_for(1_400);
    let ctl = runner.controller();
    assert_eq!(ctl.engine_state(), EngineState::Running);
    assert!(ctl.injector_state().is_enabled());
    assert!(ctl.total_pulse_time_us() > pulse_time_stopped);
    assert!(ctl.startup_modifier() > 1.2);
    assert!((ctl.rpm() - 1800).abs() < 100, "rpm {}", ctl.rpm());
}
