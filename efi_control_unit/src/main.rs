//! # EFI Control Unit
//!
//! Loads the configuration, creates the selected HAL driver, performs RT
//! setup and runs the injection control loop until Ctrl-C or the requested
//! duration has elapsed.

use clap::Parser;
use efi_common::config::{EfiConfig, LogLevel};
use efi_common::control_unit::command::Command;
use efi_control_unit::config::{ConfigSource, render_config, resolve_config};
use efi_control_unit::cycle::{CycleRunner, rt_setup};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// EFI Control Unit: fuel-injection control loop
#[derive(Parser, Debug)]
#[command(name = "efi_control_unit")]
#[command(version)]
#[command(about = "Fuel-injection control loop with closed-loop AFR and idle trims")]
struct Args {
    /// Configuration TOML. Defaults to /etc/efi/efi.toml, or built-in
    /// defaults if that file does not exist.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HAL driver to run against.
    #[arg(long, default_value = "simulation")]
    driver: String,

    /// Stop after this many seconds (runs until Ctrl-C if omitted).
    #[arg(long, value_name = "SECONDS")]
    duration: Option<f64>,

    /// Write the binary telemetry stream to this file.
    #[arg(long, value_name = "FILE")]
    telemetry_out: Option<PathBuf>,

    /// CPU core to pin the loop thread to.
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority.
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    // Config first: `[shared] log_level` sets the base log level.
    let resolved = resolve_config(args.config.as_deref());
    let log_level = resolved
        .as_ref()
        .map(|(config, _)| config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("EFI Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let outcome = match resolved {
        Ok((config, source)) => run(&args, config, source),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = outcome {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("EFI Control Unit shutdown complete");
}

fn run(
    args: &Args,
    config: EfiConfig,
    source: ConfigSource,
) -> Result<(), Box<dyn std::error::Error>> {
    match &source {
        ConfigSource::File(path) => info!("Config loaded from {path}"),
        ConfigSource::Defaults => info!("Config: built-in defaults"),
    }

    if args.print_config {
        println!("{}", render_config(&config)?);
        return Ok(());
    }

    info!(
        "Config OK: service={}, cycle={}µs, {} cc / {} cyl, injector {} g/s",
        config.shared.service_name,
        config.controller.cycle_time_us,
        config.engine.displacement_cc,
        config.engine.cylinders,
        config.injector.flow_rate_g_per_s
    );

    let registry = efi_hal::default_registry();
    info!("Available drivers: {:?}", registry.list_drivers());
    let driver = registry.create_driver(&args.driver)?;

    let mut runner = CycleRunner::new(&config, driver)?;
    if let Some(path) = &args.telemetry_out {
        let file = File::create(path)?;
        runner = runner.with_telemetry_sink(Box::new(BufWriter::new(file)));
        runner
            .controller_mut()
            .handle_command(Command::StartTransmission)?;
        info!("Telemetry stream to {}", path.display());
    }

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let max_cycles = match args.duration {
        Some(secs) if secs > 0.0 => {
            let total = Duration::try_from_secs_f64(secs)?;
            Some((total.as_micros() / runner.cycle_time().as_micros().max(1)) as u64)
        }
        _ => None,
    };

    runner.run(&running, max_cycles)?;

    let ctl = runner.controller();
    info!(
        "Final state: engine={:?} rpm={} revolutions={} pulse_time={}µs startup={:.3} idle_trim={:+.4}",
        ctl.engine_state(),
        ctl.rpm(),
        ctl.total_revolutions(),
        ctl.total_pulse_time_us(),
        ctl.startup_modifier(),
        ctl.idle_trim()
    );
    info!("Cycle stats:\n{}", toml::to_string(runner.stats())?);
    Ok(())
}

/// Setup tracing subscriber from CLI arguments and the configured level.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let level = tracing_level(args.verbose, log_level);

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

/// `--verbose` forces DEBUG; otherwise `[shared] log_level` applies.
fn tracing_level(verbose: bool, log_level: LogLevel) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::from(log_level)
    }
}
