//! Configuration loading traits and types.
//!
//! Every EFI binary reads a single TOML file. Each section falls back to its
//! defaults, so a file only names what it overrides.
//!
//! # Usage
//!
//! ```rust,no_run
//! use efi_common::config::{load_config, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = load_config(Path::new("efi.toml"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::control_unit::config::{
    ControllerConfig, EngineConfig, FeedbackConfig, InjectorConfig, MonitorConfig, SensorConfig,
    TableConfig, TelemetryConfig,
};
use crate::hal::config::SimulationConfig;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "efi-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "efi_control_unit".to_string(),
        }
    }
}

impl SharedConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Complete configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EfiConfig {
    pub shared: SharedConfig,
    pub controller: ControllerConfig,
    pub engine: EngineConfig,
    pub injector: InjectorConfig,
    pub table: TableConfig,
    pub feedback: FeedbackConfig,
    pub monitor: MonitorConfig,
    pub sensors: SensorConfig,
    pub telemetry: TelemetryConfig,
    pub simulation: SimulationConfig,
}

impl EfiConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.controller.validate()?;
        self.engine.validate()?;
        self.injector.validate()?;
        self.table.validate()?;
        self.feedback.validate()?;
        self.monitor.validate()?;
        self.sensors.validate()?;
        self.simulation.validate()?;

        if self.simulation.edges_per_revolution != self.controller.revs_per_calc {
            return Err(ConfigError::ValidationError(format!(
                "simulation.edges_per_revolution ({}) must equal controller.revs_per_calc ({})",
                self.simulation.edges_per_revolution, self.controller.revs_per_calc
            )));
        }
        Ok(())
    }
}

/// Load and validate the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<EfiConfig, ConfigError> {
    info!("Loading configuration from {}", path.display());
    let config = EfiConfig::load(path)?;
    config.validate()?;
    debug!(
        "Config: service={} cycle={}µs revs_per_calc={} revs_per_injection={}",
        config.shared.service_name,
        config.controller.cycle_time_us,
        config.controller.revs_per_calc,
        config.controller.revs_per_injection
    );
    Ok(config)
}
