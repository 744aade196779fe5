//! Configuration sections for the injection control core.
//!
//! All config types use `serde::Deserialize` for TOML loading and fall back
//! to field-level defaults, so a config file only names what it overrides.
//! `validate()` on each section enforces the parameter bounds.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::consts::{
    AFR_PLAUSIBLE_MAX, AFR_PLAUSIBLE_MIN, CYCLE_TIME_US, NUM_TABLE_COLS, NUM_TABLE_ROWS,
};

/// Bounds for the main-loop cycle time [µs].
pub const CYCLE_TIME_US_MIN: u32 = 100;
pub const CYCLE_TIME_US_MAX: u32 = 100_000;

fn invalid(msg: String) -> ConfigError {
    ConfigError::ValidationError(msg)
}

// ─── Controller ─────────────────────────────────────────────────────

/// Main-loop and revolution-counting parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Main-loop cycle time [µs].
    pub cycle_time_us: u32,
    /// Crank edges per revolution used in the RPM formula.
    pub revs_per_calc: u32,
    /// Crank edges between injection events.
    pub revs_per_injection: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: CYCLE_TIME_US,
            revs_per_calc: 2,
            revs_per_injection: 2,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(CYCLE_TIME_US_MIN..=CYCLE_TIME_US_MAX).contains(&self.cycle_time_us) {
            return Err(invalid(format!(
                "controller.cycle_time_us {} out of range [{}, {}]",
                self.cycle_time_us, CYCLE_TIME_US_MIN, CYCLE_TIME_US_MAX
            )));
        }
        if self.revs_per_calc == 0 {
            return Err(invalid("controller.revs_per_calc must be > 0".to_string()));
        }
        if self.revs_per_injection == 0 {
            return Err(invalid(
                "controller.revs_per_injection must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Engine & Injector ──────────────────────────────────────────────

/// Fixed engine geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Total swept volume [cm³].
    pub displacement_cc: f64,
    /// Number of cylinders sharing the injector bank.
    pub cylinders: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            displacement_cc: 49.4,
            cylinders: 1,
        }
    }
}

impl EngineConfig {
    /// Swept volume of one intake charge [m³].
    #[inline]
    pub fn charge_volume_m3(&self) -> f64 {
        self.displacement_cc * 1e-6 / self.cylinders.max(1) as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.displacement_cc > 0.0 && self.displacement_cc <= 10_000.0) {
            return Err(invalid(format!(
                "engine.displacement_cc {} out of range (0, 10000]",
                self.displacement_cc
            )));
        }
        if self.cylinders == 0 || self.cylinders > 16 {
            return Err(invalid(format!(
                "engine.cylinders {} out of range [1, 16]",
                self.cylinders
            )));
        }
        Ok(())
    }
}

/// Injector characteristics and pulse limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    /// Static flow rate [g/s].
    pub flow_rate_g_per_s: f64,
    /// Largest fraction of the inter-injection interval a pulse may occupy.
    pub max_duty_cycle: f64,
    /// Absolute ceiling on a single pulse [µs].
    pub max_pulse_us: u32,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            flow_rate_g_per_s: 1.5,
            max_duty_cycle: 0.85,
            max_pulse_us: 25_000,
        }
    }
}

impl InjectorConfig {
    /// Flow rate [kg/s].
    #[inline]
    pub fn flow_rate_kg_per_s(&self) -> f64 {
        self.flow_rate_g_per_s * 1e-3
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.flow_rate_g_per_s > 0.0) {
            return Err(invalid(format!(
                "injector.flow_rate_g_per_s {} must be > 0",
                self.flow_rate_g_per_s
            )));
        }
        if !(self.max_duty_cycle > 0.0 && self.max_duty_cycle <= 1.0) {
            return Err(invalid(format!(
                "injector.max_duty_cycle {} out of range (0, 1]",
                self.max_duty_cycle
            )));
        }
        if self.max_pulse_us == 0 {
            return Err(invalid("injector.max_pulse_us must be > 0".to_string()));
        }
        Ok(())
    }
}

// ─── Table ──────────────────────────────────────────────────────────

/// Axis breakpoints and optional calibration override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// RPM at column 0.
    pub rpm_min: f64,
    /// RPM spacing between columns.
    pub rpm_step: f64,
    /// MAP at row 0 [kPa].
    pub map_min_kpa: f64,
    /// MAP spacing between rows [kPa].
    pub map_step_kpa: f64,
    /// Replacement calibration (rows × cols target AFR). Factory table if absent.
    pub calibration: Option<Vec<Vec<f64>>>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            rpm_min: 0.0,
            rpm_step: 1000.0,
            map_min_kpa: 20.0,
            map_step_kpa: 10.0,
            calibration: None,
        }
    }
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rpm_step > 0.0) || !(self.map_step_kpa > 0.0) {
            return Err(invalid("table axis steps must be > 0".to_string()));
        }
        if self.rpm_min < 0.0 || !(self.map_min_kpa > 0.0) {
            return Err(invalid(
                "table.rpm_min must be >= 0 and table.map_min_kpa > 0".to_string(),
            ));
        }
        if let Some(ref rows) = self.calibration {
            if rows.len() != NUM_TABLE_ROWS || rows.iter().any(|r| r.len() != NUM_TABLE_COLS) {
                return Err(invalid(format!(
                    "table.calibration must be {NUM_TABLE_ROWS} rows x {NUM_TABLE_COLS} columns"
                )));
            }
            if let Some(bad) = rows
                .iter()
                .flatten()
                .find(|afr| !(AFR_PLAUSIBLE_MIN..=AFR_PLAUSIBLE_MAX).contains(*afr))
            {
                return Err(invalid(format!(
                    "table.calibration AFR {bad} out of range [{AFR_PLAUSIBLE_MIN}, {AFR_PLAUSIBLE_MAX}]"
                )));
            }
        }
        Ok(())
    }
}

// ─── Feedback ───────────────────────────────────────────────────────

/// Closed-loop AFR trim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AfrFeedbackConfig {
    pub enabled: bool,
    /// Trim change per unit relative AFR error.
    pub gain: f64,
    /// Minimum time between trim updates [µs].
    pub interval_us: u64,
    /// Lower trim bound (multiplicative).
    pub trim_min: f64,
    /// Upper trim bound (multiplicative).
    pub trim_max: f64,
    /// Below this RPM the exhaust reading is ignored.
    pub min_rpm: i32,
}

impl Default for AfrFeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gain: 0.2,
            interval_us: 50_000,
            trim_min: 0.8,
            trim_max: 1.2,
            min_rpm: 800,
        }
    }
}

/// Closed-loop idle-speed trim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleFeedbackConfig {
    pub enabled: bool,
    /// Target idle speed.
    pub desired_rpm: i32,
    /// Integral gain [1/(RPM·s)].
    pub ki: f64,
    /// Damping gain on the rate of change of RPM error [s/RPM].
    pub kd: f64,
    /// Lower trim bound (additive fraction).
    pub trim_min: f64,
    /// Upper trim bound (additive fraction).
    pub trim_max: f64,
    /// Loop only runs at or below this throttle opening [%].
    pub max_tps: f64,
    /// Loop only runs at or below this speed.
    pub max_rpm: i32,
}

impl Default for IdleFeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            desired_rpm: 1800,
            ki: 0.000_2,
            kd: 0.000_001,
            trim_min: -0.15,
            trim_max: 0.15,
            max_tps: 5.0,
            max_rpm: 3000,
        }
    }
}

/// Post-start enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Modifier applied on the Stopped → Running transition.
    pub initial: f64,
    /// Upper bound for the modifier.
    pub max: f64,
    /// Decay toward 1.0 per counted revolution.
    pub decay_per_rev: f64,
    /// Step used by `raise_startup_modifier`.
    pub raise_step: f64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            initial: 1.4,
            max: 2.0,
            decay_per_rev: 0.0005,
            raise_step: 0.05,
        }
    }
}

/// Acceleration enrichment from throttle rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Enrichment per %/s of throttle opening rate.
    pub gain: f64,
    /// Opening rate below which no enrichment is applied [%/s].
    pub threshold: f64,
    /// Upper bound on the adjustment.
    pub max: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            gain: 0.001,
            threshold: 50.0,
            max: 1.5,
        }
    }
}

/// All feedback-loop parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub afr: AfrFeedbackConfig,
    pub idle: IdleFeedbackConfig,
    pub startup: StartupConfig,
    pub throttle: ThrottleConfig,
}

impl FeedbackConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let afr = &self.afr;
        if !(afr.trim_min > 0.0 && afr.trim_min <= 1.0 && afr.trim_max >= 1.0) {
            return Err(invalid(format!(
                "feedback.afr trim bounds [{}, {}] must satisfy 0 < min <= 1 <= max",
                afr.trim_min, afr.trim_max
            )));
        }
        if afr.gain < 0.0 {
            return Err(invalid("feedback.afr.gain must be >= 0".to_string()));
        }
        let idle = &self.idle;
        if !(idle.trim_min <= 0.0 && idle.trim_max >= 0.0 && idle.trim_min > -1.0) {
            return Err(invalid(format!(
                "feedback.idle trim bounds [{}, {}] must satisfy -1 < min <= 0 <= max",
                idle.trim_min, idle.trim_max
            )));
        }
        if idle.desired_rpm <= 0 {
            return Err(invalid("feedback.idle.desired_rpm must be > 0".to_string()));
        }
        if idle.ki < 0.0 || idle.kd < 0.0 {
            return Err(invalid("feedback.idle gains must be >= 0".to_string()));
        }
        let startup = &self.startup;
        if !(startup.initial >= 1.0 && startup.max >= startup.initial) {
            return Err(invalid(format!(
                "feedback.startup requires 1 <= initial ({}) <= max ({})",
                startup.initial, startup.max
            )));
        }
        if startup.decay_per_rev < 0.0 || startup.raise_step < 0.0 {
            return Err(invalid("feedback.startup steps must be >= 0".to_string()));
        }
        if self.throttle.max < 1.0 || self.throttle.gain < 0.0 {
            return Err(invalid(
                "feedback.throttle requires max >= 1 and gain >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Engine-State Monitor ───────────────────────────────────────────

/// Running/stopped detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Minimum speed considered running (must sit below cranking speed).
    pub min_running_rpm: i32,
    /// Time below `min_running_rpm` before declaring the engine off [µs].
    pub debounce_us: u64,
    /// Time without any crank edge before declaring the engine off [µs].
    pub stall_timeout_us: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_running_rpm: 150,
            debounce_us: 250_000,
            stall_timeout_us: 500_000,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_running_rpm <= 0 {
            return Err(invalid("monitor.min_running_rpm must be > 0".to_string()));
        }
        if self.stall_timeout_us == 0 {
            return Err(invalid("monitor.stall_timeout_us must be > 0".to_string()));
        }
        Ok(())
    }
}

// ─── Sensors ────────────────────────────────────────────────────────

/// Filtering and scaling of the analog inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Moving-average window for MAP and AFR voltage [samples].
    pub filter_window: usize,
    /// Wideband transfer function: AFR = slope × volts + offset.
    pub afr_slope: f64,
    pub afr_offset: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            filter_window: 8,
            afr_slope: 2.0,
            afr_offset: 10.0,
        }
    }
}

/// Largest supported filter window.
pub const FILTER_WINDOW_MAX: usize = 64;

impl SensorConfig {
    /// Convert a wideband sensor voltage to AFR.
    #[inline]
    pub fn volts_to_afr(&self, volts: f64) -> f64 {
        self.afr_slope * volts + self.afr_offset
    }

    /// Inverse of [`volts_to_afr`](Self::volts_to_afr).
    #[inline]
    pub fn afr_to_volts(&self, afr: f64) -> f64 {
        (afr - self.afr_offset) / self.afr_slope
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_window == 0 || self.filter_window > FILTER_WINDOW_MAX {
            return Err(invalid(format!(
                "sensors.filter_window {} out of range [1, {FILTER_WINDOW_MAX}]",
                self.filter_window
            )));
        }
        if self.afr_slope == 0.0 {
            return Err(invalid("sensors.afr_slope must be non-zero".to_string()));
        }
        Ok(())
    }
}

// ─── Telemetry ──────────────────────────────────────────────────────

/// Telemetry stream parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Start transmitting without waiting for a command.
    pub transmit_on_start: bool,
    /// Minimum spacing between frames [µs].
    pub min_time_per_sample_us: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            transmit_on_start: false,
            min_time_per_sample_us: 10_000,
        }
    }
}
