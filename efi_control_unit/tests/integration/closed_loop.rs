//! Closed-loop AFR correction against an injector that flows more fuel
//! than its configured rate.
//!
//! Operating point 2000 rpm / 40 kPa sits exactly on cell (row 2, col 2),
//! whose target AFR is 15.0. With a 15 % rich injector the open-loop
//! exhaust reads 15 / 1.15 ≈ 13.0; the trim must pull it back.

use efi_common::control_unit::command::{Command, TableCell};
use efi_common::config::EfiConfig;

use super::{sim_runner, steady_config};

const TARGET_AFR: f64 = 15.0;
const FLOW_ERROR: f64 = 1.15;
const CELL: TableCell = TableCell { row: 2, col: 2 };

fn rich_injector_config(afr_feedback: bool) -> EfiConfig {
    let mut config = steady_config(2000.0, 40.0, 0.0);
    config.simulation.injector_flow_scale = FLOW_ERROR;
    config.feedback.afr.enabled = afr_feedback;
    config.feedback.idle.enabled = false;
    config.feedback.startup.initial = 1.0;
    config
}

#[test]
fn open_loop_reads_rich() {
    let mut runner = sim_runner(&rich_injector_config(false));
    runner.run_for(2_000);

    let afr = runner.controller().sample().afr;
    let expected = TARGET_AFR / FLOW_ERROR;
    assert!((afr - expected).abs() < 0.2, "afr {afr}, expected {expected}");
    assert_eq!(runner.controller().trim_table().get(CELL), 1.0);
}

#[test]
fn afr_trim_converges_on_target() {
    let mut runner = sim_runner(&rich_injector_config(true));
    runner.run_for(6_000);

    let ctl = runner.controller();
    let afr = ctl.sample().afr;
    assert!((afr - TARGET_AFR).abs() < 0.3, "afr {afr}");

    let trim = ctl.trim_table().get(CELL);
    assert!(
        (trim - 1.0 / FLOW_ERROR).abs() < 0.03,
        "trim {trim}, expected {}",
        1.0 / FLOW_ERROR
    );

    // Only the cell under the operating point was touched.
    let untouched = TableCell { row: 5, col: 7 };
    assert_eq!(ctl.trim_table().get(untouched), 1.0);
}

#[test]
fn enabling_feedback_mid_run_corrects() {
    let mut runner = sim_runner(&rich_injector_config(false));
    runner.run_for(1_000);
    let open_loop_error = (runner.controller().sample().afr - TARGET_AFR).abs();

    runner
        .controller_mut()
        .handle_command(Command::SetAfrFeedback(true))
        .unwrap();
    runner.run_for(5_000);
    let closed_loop_error = (runner.controller().sample().afr - TARGET_AFR).abs();

    assert!(closed_loop_error < open_loop_error / 4.0);

    // Reset drops the learned correction; the exhaust goes rich again.
    runner
        .controller_mut()
        .handle_command(Command::SetAfrFeedback(false))
        .unwrap();
    runner
        .controller_mut()
        .handle_command(Command::ResetTrims)
        .unwrap();
    runner.run_for(1_000);
    assert!(runner.controller().sample().afr < TARGET_AFR - 1.0);
}

/// Idle trim after one simulated second at 1500 rpm, 300 below target.
fn idle_trim_after_one_second(cycle_time_us: u32) -> f64 {
    let mut config = steady_config(1500.0, 35.0, 1.0);
    config.controller.cycle_time_us = cycle_time_us;
    config.feedback.afr.enabled = false;
    config.feedback.idle.trim_max = 0.5;

    let mut runner = sim_runner(&config);
    runner.run_for(u64::from(1_000_000 / cycle_time_us));
    assert_eq!(runner.controller().rpm(), 1500);
    runner.controller().idle_trim()
}

#[test]
fn idle_trim_rate_independent_of_cycle_time() {
    let slow = idle_trim_after_one_second(1000);
    let fast = idle_trim_after_one_second(250);

    // Integral only: ki × 300 rpm × (just under) 1 s.
    let ki = EfiConfig::default().feedback.idle.ki;
    assert!(slow > 0.8 * ki * 300.0 && slow < ki * 300.0, "slow {slow}");
    assert!((fast - slow).abs() < 0.1 * slow, "fast {fast}, slow {slow}");
}
