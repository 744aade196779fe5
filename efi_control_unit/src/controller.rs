//! The injection controller.
//!
//! One owned [`Controller`] holds every piece of main-loop state. Interrupt
//! handlers reach the shared part through an [`IsrHandle`].
//!
//! ## Cycle Body
//!
//! ```text
//! read_sensors → update_rpm (when a window is ready) → check_engine_state
//!   → lower_startup_modifier → throttle adjustment → afr_feedback
//!   → idle_rpm_feedback → lookup_pulse_time (schedules the next pulse)
//! ```
//!
//! The control path never fails: out-of-range inputs clamp, missing timing
//! holds RPM, misuse of the injector is a no-op. What fired is reported in
//! the returned [`GuardFlags`].

use std::io::{self, Write};
use std::sync::Arc;

use efi_common::config::EfiConfig;
use efi_common::consts::{KELVIN_OFFSET, MICROS_PER_MINUTE, R_AIR};
use efi_common::control_unit::command::{Command, CommandError, PulseRecalc, TableCell, check_afr};
use efi_common::control_unit::config::{
    ControllerConfig, EngineConfig, FeedbackConfig, InjectorConfig, SensorConfig,
};
use efi_common::control_unit::error::GuardFlags;
use efi_common::control_unit::state::{EngineSample, EngineState, InjectorState};
use efi_common::hal::driver::{InjectorOutput, MicrosClock};
use efi_common::hal::types::SensorReadings;
use efi_common::telemetry::TelemetryFrame;
use tracing::{debug, info, warn};

use crate::control::feedback::{
    AfrLoopState, IdleState, StartupModifier, afr_trim_compute, idle_active, idle_trim_compute,
};
use crate::control::filters::FilteredSensor;
use crate::control::throttle::{ThrottleRate, throttle_adjustment};
use crate::isr::{IsrHandle, IsrShared};
use crate::revolution::{RpmEstimator, RpmUpdate};
use crate::state::engine::{EngineMonitor, EngineTransition};
use crate::state::injector::PulseRejected;
use crate::table::{CalibrationTable, PulseTimeTable, Table, TableAxes, TrimTable};
use crate::telemetry::Transmitter;

/// Lowest intake temperature used in the charge-density correction [K].
const MIN_IAT_K: f64 = 200.0;

pub struct Controller {
    controller: ControllerConfig,
    engine: EngineConfig,
    injector: InjectorConfig,
    feedback: FeedbackConfig,
    sensors: SensorConfig,

    isr: Arc<IsrShared>,
    clock: Arc<dyn MicrosClock>,

    rpm: RpmEstimator,
    /// Set by a successful `update_rpm`, taken by the idle loop.
    rpm_fresh: bool,
    axes: TableAxes,
    calibration: CalibrationTable,
    base_pulse: PulseTimeTable,
    trims: TrimTable,

    afr_feedback_enabled: bool,
    idle_feedback_enabled: bool,
    afr_loop: AfrLoopState,
    idle: IdleState,
    startup: StartupModifier,
    throttle_rate: ThrottleRate,
    throttle_adjustment: f64,

    monitor: EngineMonitor,
    map_filter: FilteredSensor,
    afr_filter: FilteredSensor,
    sample: EngineSample,

    transmitter: Transmitter,
    guards: GuardFlags,
}

impl Controller {
    /// Build a controller from a validated configuration.
    ///
    /// The injector starts `Disabled`; it is enabled by the first
    /// `Stopped → Running` transition.
    pub fn new(
        config: &EfiConfig,
        output: Arc<dyn InjectorOutput>,
        clock: Arc<dyn MicrosClock>,
    ) -> Self {
        let now = clock.now_us();
        let isr = Arc::new(IsrShared::new(
            output,
            config.controller.revs_per_injection,
        ));

        let mut controller = Self {
            controller: config.controller.clone(),
            engine: config.engine.clone(),
            injector: config.injector.clone(),
            feedback: config.feedback.clone(),
            sensors: config.sensors.clone(),
            isr,
            clock,
            rpm: RpmEstimator::new(config.controller.revs_per_calc, now),
            rpm_fresh: false,
            axes: TableAxes::from(&config.table),
            calibration: Table::calibration(&config.table),
            base_pulse: Table::filled(0.0),
            trims: Table::filled(1.0),
            afr_feedback_enabled: config.feedback.afr.enabled,
            idle_feedback_enabled: config.feedback.idle.enabled,
            afr_loop: AfrLoopState::default(),
            idle: IdleState::default(),
            startup: StartupModifier::default(),
            throttle_rate: ThrottleRate::default(),
            throttle_adjustment: 1.0,
            monitor: EngineMonitor::new(config.monitor.clone()),
            map_filter: FilteredSensor::new(config.sensors.filter_window),
            afr_filter: FilteredSensor::new(config.sensors.filter_window),
            sample: EngineSample::default(),
            transmitter: Transmitter::new(&config.telemetry),
            guards: GuardFlags::empty(),
        };
        controller.calculate_base_pulse_time(PulseRecalc::All);
        controller
    }

    /// Handle for interrupt handlers.
    pub fn isr_handle(&self) -> IsrHandle {
        IsrHandle::new(self.isr.clone())
    }

    #[inline]
    fn now_us(&self) -> u64 {
        self.clock.now_us()
    }

    // ─── Revolution Counter ─────────────────────────────────────────

    /// Crank-edge entry point (interrupt context).
    pub fn count_revolution(&self) {
        self.isr.count_revolution(self.now_us());
    }

    /// Consume the revolution window and derive RPM.
    pub fn update_rpm(&mut self) -> RpmUpdate {
        let now = self.now_us();
        let update = self.rpm.update(self.isr.window(), now);
        match update {
            RpmUpdate::Updated { rpm, .. } => {
                self.sample.rpm = rpm;
                self.rpm_fresh = true;
            }
            RpmUpdate::Held => self.guards |= GuardFlags::RPM_HELD,
        }
        update
    }

    // ─── Sensors ────────────────────────────────────────────────────

    /// Filter and store one set of analog inputs.
    pub fn read_sensors(&mut self, readings: &SensorReadings) {
        let now = self.now_us();
        self.map_filter.update(readings.map_kpa);
        self.afr_filter.update(readings.afr_volts);

        self.sample.map = self.map_filter.value();
        self.sample.afr = self.sensors.volts_to_afr(self.afr_filter.value());
        self.sample.ect = readings.ect_c;
        self.sample.iat = readings.iat_c;
        self.sample.tps = readings.tps_pct;
        self.sample.dtps = self.throttle_rate.update(readings.tps_pct, now);
    }

    /// Acceleration enrichment for the current dTPS/dt.
    pub fn compute_throttle_adjustment(&self) -> f64 {
        throttle_adjustment(self.sample.dtps, &self.feedback.throttle)
    }

    // ─── Pulse Interpolator ─────────────────────────────────────────

    /// Recompute base pulse time [µs·K] for one cell or the whole table.
    ///
    /// `PulseRecalc::All` overwrites every base value. Trims are untouched.
    pub fn calculate_base_pulse_time(&mut self, selection: PulseRecalc) {
        let charge_m3 = self.engine.charge_volume_m3();
        let flow = self.injector.flow_rate_kg_per_s();
        let axes = self.axes;
        let calibration = &self.calibration;
        let compute = |cell: TableCell| {
            let map_pa = axes.map_row_kpa(cell.row) * 1000.0;
            let air_k = map_pa * charge_m3 / R_AIR;
            let fuel_k = air_k / calibration.get(cell);
            fuel_k / flow * 1e6
        };

        match selection {
            PulseRecalc::Cell(cell) => {
                let value = compute(cell);
                self.base_pulse.set(cell, value);
            }
            PulseRecalc::All => {
                for cell in Table::all_cells() {
                    let value = compute(cell);
                    self.base_pulse.set(cell, value);
                }
                debug!("Recomputed all base pulse times");
            }
        }
    }

    /// Bilinear lookup in the base pulse table [µs·K].
    #[inline]
    pub fn interpolate_2d(&self, x: f64, y: f64) -> f64 {
        self.base_pulse.interpolate_2d(x, y)
    }

    /// Maximum pulse the duty-cycle limit allows at `rpm` [µs].
    fn pulse_limit_us(&self, rpm: i32) -> f64 {
        let ceiling = f64::from(self.injector.max_pulse_us);
        if rpm <= 0 {
            return ceiling;
        }
        let interval_us = f64::from(self.controller.revs_per_injection)
            * MICROS_PER_MINUTE as f64
            / (f64::from(rpm) * f64::from(self.controller.revs_per_calc));
        ceiling.min(self.injector.max_duty_cycle * interval_us)
    }

    /// Compute the effective pulse for the current operating point and
    /// schedule it for the next injection event. Returns the pulse [µs].
    pub fn lookup_pulse_time(&mut self) -> u32 {
        let (x, y, guards) = self
            .axes
            .coords(f64::from(self.sample.rpm), self.sample.map);
        self.guards |= guards;

        let iat_k = (self.sample.iat + KELVIN_OFFSET).max(MIN_IAT_K);
        let mut pulse = self.interpolate_2d(x, y) / iat_k
            * self.startup.value()
            * self.throttle_adjustment
            * self.trims.interpolate_2d(x, y)
            * (1.0 + self.idle.trim);

        let limit = self.pulse_limit_us(self.sample.rpm);
        if pulse > limit {
            pulse = limit;
            self.guards |= GuardFlags::PULSE_CLAMPED;
        }
        let pulse_us = if pulse.is_finite() && pulse > 0.0 {
            pulse.round().min(f64::from(u32::MAX)) as u32
        } else {
            0
        };
        self.isr.injector().schedule(pulse_us);
        pulse_us
    }

    // ─── Feedback ───────────────────────────────────────────────────

    /// One AFR trim step against the interpolated target.
    pub fn afr_feedback(&mut self) {
        let cfg = &self.feedback.afr;
        if !self.afr_feedback_enabled
            || self.monitor.state() != EngineState::Running
            || self.sample.rpm < cfg.min_rpm
        {
            return;
        }
        let now = self.now_us();
        if !self.afr_loop.due(now, cfg.interval_us) {
            return;
        }

        let (x, y, _) = self
            .axes
            .coords(f64::from(self.sample.rpm), self.sample.map);
        let target = self.calibration.interpolate_2d(x, y);
        let cell = Table::nearest(x, y);
        let (trim, saturated) = afr_trim_compute(self.trims.get(cell), self.sample.afr, target, cfg);
        self.trims.set(cell, trim);
        if saturated {
            self.guards |= GuardFlags::TRIM_SATURATED;
        }
    }

    /// One idle-speed trim step.
    ///
    /// Steps only on an RPM sample `update_rpm` has derived since the last
    /// call, so the loop rate follows the measurement, not the main loop.
    pub fn idle_rpm_feedback(&mut self) {
        let fresh = std::mem::take(&mut self.rpm_fresh);
        let cfg = &self.feedback.idle;
        let active = self.idle_feedback_enabled
            && self.monitor.state() == EngineState::Running
            && idle_active(self.sample.rpm, self.sample.tps, cfg);
        if !active {
            self.idle.pause();
            return;
        }
        if !fresh {
            return;
        }
        let now = self.clock.now_us();
        if idle_trim_compute(&mut self.idle, self.sample.rpm, now, cfg) {
            self.guards |= GuardFlags::TRIM_SATURATED;
        }
    }

    pub fn set_startup_modifier(&mut self) {
        let total = self.isr.total_revolutions();
        self.startup.set(&self.feedback.startup, total);
    }

    pub fn raise_startup_modifier(&mut self) {
        self.startup.raise(&self.feedback.startup);
    }

    pub fn lower_startup_modifier(&mut self) {
        let total = self.isr.total_revolutions();
        self.startup.lower(&self.feedback.startup, total);
    }

    /// Return every trim to neutral. Base pulse times are untouched.
    pub fn reset_trims(&mut self) {
        self.trims.fill(1.0);
        self.idle.reset();
        self.afr_loop.reset();
        debug!("Feedback trims reset");
    }

    // ─── Engine-State Monitor ───────────────────────────────────────

    pub fn detect_engine_off(&mut self) -> bool {
        let now = self.now_us();
        let last_edge = self.isr.last_edge_us();
        self.monitor
            .detect_engine_off(self.sample.rpm, now, last_edge)
    }

    /// Apply running/stopped transitions.
    pub fn check_engine_state(&mut self) -> Option<EngineTransition> {
        let now = self.now_us();
        let last_edge = self.isr.last_edge_us();
        let transition = self.monitor.check(self.sample.rpm, now, last_edge);
        match transition {
            Some(EngineTransition::Stopped) => {
                self.disable_inj();
                self.reset_trims();
                // A held RPM is stale once the crank has stopped, and so are
                // edges counted toward the next window.
                let dropped = self.rpm.reset(self.isr.window(), now);
                self.rpm_fresh = false;
                self.sample.rpm = 0;
                if dropped > 0 {
                    debug!("Dropped {} pending edge(s) at stop", dropped);
                }
                info!(
                    "Engine stopped at {} revolutions",
                    self.isr.total_revolutions()
                );
            }
            Some(EngineTransition::Started) => {
                self.enable_inj();
                self.set_startup_modifier();
                info!(
                    "Engine running at {} rpm, startup modifier {:.3}",
                    self.sample.rpm,
                    self.startup.value()
                );
            }
            None => {}
        }
        transition
    }

    // ─── Injector Actuator ──────────────────────────────────────────

    pub fn enable_inj(&self) -> bool {
        self.isr.injector().enable()
    }

    pub fn disable_inj(&self) {
        self.isr.injector().disable();
    }

    pub fn pulse_on(&self) -> Result<u32, PulseRejected> {
        self.isr.injector().pulse_on()
    }

    pub fn pulse_off(&self) -> bool {
        self.isr.injector().pulse_off()
    }

    // ─── Main Loop ──────────────────────────────────────────────────

    /// One main-loop iteration. Returns the guards that fired.
    pub fn run_cycle(&mut self, readings: &SensorReadings) -> GuardFlags {
        let previous = self.guards;
        self.guards = GuardFlags::empty();

        self.read_sensors(readings);
        if self.isr.pending_revolutions() >= self.controller.revs_per_calc {
            self.update_rpm();
        }
        self.check_engine_state();
        if self.monitor.state() == EngineState::Running {
            self.lower_startup_modifier();
        }
        self.throttle_adjustment = self.compute_throttle_adjustment();
        self.afr_feedback();
        self.idle_rpm_feedback();
        self.lookup_pulse_time();

        let skipped = self.isr.injector().take_skipped();
        if skipped > 0 {
            self.guards |= GuardFlags::PULSE_SKIPPED;
            warn!(
                "Skipped {} injection event(s): off-timer still pending at {} rpm",
                skipped, self.sample.rpm
            );
        }

        let raised = self.guards.difference(previous);
        if raised.has_warning() && !raised.contains(GuardFlags::PULSE_SKIPPED) {
            warn!("Guards raised: {:?}", raised);
        } else if !raised.is_empty() {
            debug!("Guards raised: {:?}", raised);
        }
        self.guards
    }

    // ─── Commands & Telemetry ───────────────────────────────────────

    pub fn start_data_transmission(&mut self) -> bool {
        info!("Telemetry transmission started");
        self.transmitter.start()
    }

    pub fn stop_data_transmission(&mut self) -> bool {
        info!("Telemetry transmission stopped");
        self.transmitter.stop()
    }

    /// Emit a telemetry frame if transmission is on and the interval passed.
    pub fn try_sending_data<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<bool> {
        let now = self.now_us();
        if !self.transmitter.due(now) {
            return Ok(false);
        }
        let frame = self.telemetry_frame();
        self.transmitter.try_send(now, &frame, out)
    }

    /// Apply a command-channel request.
    pub fn handle_command(&mut self, command: Command) -> Result<(), CommandError> {
        debug!("Command: {:?}", command);
        match command {
            Command::StartTransmission => {
                self.start_data_transmission();
            }
            Command::StopTransmission => {
                self.stop_data_transmission();
            }
            Command::SetCalibrationCell { row, col, afr } => {
                let cell = TableCell::new(row, col)?;
                let afr = check_afr(afr)?;
                self.calibration.set(cell, afr);
                self.calculate_base_pulse_time(PulseRecalc::Cell(cell));
                info!("Calibration cell ({}, {}) set to AFR {:.2}", row, col, afr);
            }
            Command::RecalculateAll => self.calculate_base_pulse_time(PulseRecalc::All),
            Command::ResetTrims => self.reset_trims(),
            Command::SetAfrFeedback(enabled) => {
                self.afr_feedback_enabled = enabled;
                info!("AFR feedback {}", if enabled { "enabled" } else { "disabled" });
            }
            Command::SetIdleFeedback(enabled) => {
                self.idle_feedback_enabled = enabled;
                if !enabled {
                    self.idle.pause();
                }
                info!("Idle feedback {}", if enabled { "enabled" } else { "disabled" });
            }
            Command::RaiseStartupModifier => self.raise_startup_modifier(),
            Command::LowerStartupModifier => self.lower_startup_modifier(),
        }
        Ok(())
    }

    /// Snapshot for the telemetry stream.
    pub fn telemetry_frame(&self) -> TelemetryFrame {
        TelemetryFrame {
            // Wraps like the 32-bit micros() counter.
            timestamp_us: self.now_us() as u32,
            total_revolutions: self.isr.total_revolutions() as u32,
            ect: self.sample.ect as f32,
            iat: self.sample.iat as f32,
            map: self.sample.map as f32,
            tps: self.sample.tps as f32,
            afr: self.sample.afr as f32,
            total_pulse_time_us: self.isr.injector().total_pulse_us() as f32,
            rpm: self.sample.rpm,
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub fn rpm(&self) -> i32 {
        self.sample.rpm
    }

    #[inline]
    pub fn sample(&self) -> &EngineSample {
        &self.sample
    }

    #[inline]
    pub fn engine_state(&self) -> EngineState {
        self.monitor.state()
    }

    #[inline]
    pub fn injector_state(&self) -> InjectorState {
        self.isr.injector().state()
    }

    #[inline]
    pub fn total_revolutions(&self) -> u64 {
        self.isr.total_revolutions()
    }

    #[inline]
    pub fn total_pulse_time_us(&self) -> u64 {
        self.isr.injector().total_pulse_us()
    }

    #[inline]
    pub fn scheduled_pulse_us(&self) -> u32 {
        self.isr.injector().scheduled_pulse_us()
    }

    #[inline]
    pub fn base_pulse_table(&self) -> &PulseTimeTable {
        &self.base_pulse
    }

    #[inline]
    pub fn calibration_table(&self) -> &CalibrationTable {
        &self.calibration
    }

    #[inline]
    pub fn trim_table(&self) -> &TrimTable {
        &self.trims
    }

    #[inline]
    pub fn idle_trim(&self) -> f64 {
        self.idle.trim
    }

    #[inline]
    pub fn startup_modifier(&self) -> f64 {
        self.startup.value()
    }

    #[inline]
    pub fn throttle_adjustment(&self) -> f64 {
        self.throttle_adjustment
    }

    #[inline]
    pub fn afr_feedback_enabled(&self) -> bool {
        self.afr_feedback_enabled
    }

    #[inline]
    pub fn idle_feedback_enabled(&self) -> bool {
        self.idle_feedback_enabled
    }

    #[inline]
    pub fn is_transmitting(&self) -> bool {
        self.transmitter.is_enabled()
    }

    #[inline]
    pub fn guards(&self) -> GuardFlags {
        self.guards
    }
}
