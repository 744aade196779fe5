//! Telemetry written by the runner and recovered by a receiver.

use std::fs;

use efi_common::consts::TELEMETRY_FRAME_LEN;
use efi_common::control_unit::command::Command;
use efi_common::telemetry::{FrameSync, TelemetryFrame};
use tempfile::NamedTempFile;

use super::{sim_runner, steady_config};

/// Run 500 ms at 2000 rpm with transmission on and return the raw stream.
fn recorded_stream() -> Vec<u8> {
    let file = NamedTempFile::new().unwrap();
    let config = steady_config(2000.0, 40.0, 0.0);

    let mut runner = sim_runner(&config).with_telemetry_sink(Box::new(file.reopen().unwrap()));
    runner
        .controller_mut()
        .handle_command(Command::StartTransmission)
        .unwrap();
    runner.run_for(500);
    runner.shutdown().unwrap();

    fs::read(file.path()).unwrap()
}

fn decode_all(sync: &mut FrameSync) -> Vec<TelemetryFrame> {
    std::iter::from_fn(|| sync.next_frame()).collect()
}

#[test]
fn frames_respect_sample_interval() {
    let bytes = recorded_stream();
    // First frame after cycle 1 (1 ms), then every 10 ms up to 491 ms.
    assert_eq!(bytes.len(), 50 * TELEMETRY_FRAME_LEN);

    let mut sync = FrameSync::new();
    sync.push(&bytes);
    let frames = decode_all(&mut sync);
    assert_eq!(frames.len(), 50);
    assert_eq!(sync.discarded(), 0);

    assert_eq!(frames[0].timestamp_us, 1_000);
    for pair in frames.windows(2) {
        assert_eq!(pair[1].timestamp_us - pair[0].timestamp_us, 10_000);
        assert!(pair[1].total_revolutions >= pair[0].total_revolutions);
        assert!(pair[1].total_pulse_time_us >= pair[0].total_pulse_time_us);
    }

    let last = frames.last().unwrap();
    assert_eq!(last.rpm, 2000);
    assert_eq!(last.map, 40.0);
    assert_eq!(last.iat, 25.0);
    assert!(last.total_pulse_time_us > 0.0);
}

#[test]
fn receiver_resyncs_after_line_noise() {
    let bytes = recorded_stream();

    let mut noisy = vec![0x00, 0x80, 0x01, 0xff, 0x13];
    noisy.extend_from_slice(&bytes);

    let mut sync = FrameSync::new();
    let mut frames = Vec::new();
    for chunk in noisy.chunks(7) {
        sync.push(chunk);
        frames.extend(decode_all(&mut sync));
    }

    assert_eq!(frames.len(), 50);
    assert_eq!(sync.discarded(), 5);
    assert_eq!(frames[0].timestamp_us, 1_000);
}

#[test]
fn silent_until_started() {
    let file = NamedTempFile::new().unwrap();
    let config = steady_config(2000.0, 40.0, 0.0);
    let mut runner = sim_runner(&config).with_telemetry_sink(Box::new(file.reopen().unwrap()));

    runner.run_for(100);
    assert!(!runner.controller().is_transmitting());

    runner
        .controller_mut()
        .handle_command(Command::StartTransmission)
        .unwrap();
    runner.run_for(20);
    runner
        .controller_mut()
        .handle_command(Command::StopTransmission)
        .unwrap();
    runner.run_for(100);
    runner.shutdown().unwrap();

    // Frames at 101 ms and 111 ms only.
    assert_eq!(fs::read(file.path()).unwrap().len(), 2 * TELEMETRY_FRAME_LEN);
}
