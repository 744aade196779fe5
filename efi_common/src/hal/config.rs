//! HAL configuration types.
//!
//! - `SimulationConfig` - the `[simulation]` section consumed by the
//!   simulation driver
//! - `ProfilePoint` - one breakpoint of the scripted engine operating profile

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Default function for edges_per_revolution
fn default_edges_per_revolution() -> u32 {
    2
}

/// Default function for injector_flow_scale
fn default_flow_scale() -> f64 {
    1.0
}

/// Default function for ect_c
fn default_ect_c() -> f64 {
    85.0
}

/// Default function for iat_c
fn default_iat_c() -> f64 {
    25.0
}

/// Default function for profile
fn default_profile() -> Vec<ProfilePoint> {
    vec![
        ProfilePoint::new(0.0, 0.0, 100.0, 0.0),
        ProfilePoint::new(0.3, 400.0, 95.0, 0.0),
        ProfilePoint::new(1.5, 1800.0, 35.0, 2.0),
        ProfilePoint::new(4.0, 1800.0, 35.0, 2.0),
        ProfilePoint::new(5.0, 4500.0, 75.0, 45.0),
        ProfilePoint::new(8.0, 4500.0, 75.0, 45.0),
        ProfilePoint::new(9.0, 1800.0, 35.0, 2.0),
    ]
}

/// One breakpoint of the operating profile. The simulator interpolates
/// linearly between breakpoints and holds the last one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    /// Time since simulation start [s]
    pub t_s: f64,
    /// Crankshaft speed [rev/min]
    pub rpm: f64,
    /// Manifold absolute pressure [kPa]
    pub map_kpa: f64,
    /// Throttle opening [%]
    pub tps_pct: f64,
}

impl ProfilePoint {
    pub const fn new(t_s: f64, rpm: f64, map_kpa: f64, tps_pct: f64) -> Self {
        Self {
            t_s,
            rpm,
            map_kpa,
            tps_pct,
        }
    }
}

/// Simulation driver parameters.
///
/// # TOML Example
///
/// ```toml
/// [simulation]
/// edges_per_revolution = 2
/// injector_flow_scale = 1.1
///
/// [[simulation.profile]]
/// t_s = 0.0
/// rpm = 1800.0
/// map_kpa = 35.0
/// tps_pct = 2.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Crank-position edges per crankshaft revolution.
    #[serde(default = "default_edges_per_revolution")]
    pub edges_per_revolution: u32,

    /// Real injector flow relative to the configured nominal flow.
    /// Values other than 1.0 make the open-loop fueling wrong.
    #[serde(default = "default_flow_scale")]
    pub injector_flow_scale: f64,

    /// Coolant temperature [°C]
    #[serde(default = "default_ect_c")]
    pub ect_c: f64,

    /// Intake air temperature [°C]
    #[serde(default = "default_iat_c")]
    pub iat_c: f64,

    /// Scripted operating profile, sorted by `t_s`.
    #[serde(default = "default_profile")]
    pub profile: Vec<ProfilePoint>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            edges_per_revolution: default_edges_per_revolution(),
            injector_flow_scale: default_flow_scale(),
            ect_c: default_ect_c(),
            iat_c: default_iat_c(),
            profile: default_profile(),
        }
    }
}

impl SimulationConfig {
    /// Constant operating point from t = 0.
    pub fn steady(rpm: f64, map_kpa: f64, tps_pct: f64) -> Self {
        Self {
            profile: vec![ProfilePoint::new(0.0, rpm, map_kpa, tps_pct)],
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.edges_per_revolution == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.edges_per_revolution must be > 0".to_string(),
            ));
        }
        if !(self.injector_flow_scale > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "simulation.injector_flow_scale must be > 0, got {}",
                self.injector_flow_scale
            )));
        }
        if self.profile.is_empty() {
            return Err(ConfigError::ValidationError(
                "simulation.profile must have at least one point".to_string(),
            ));
        }
        if self.profile.windows(2).any(|w| w[1].t_s < w[0].t_s) {
            return Err(ConfigError::ValidationError(
                "simulation.profile must be sorted by t_s".to_string(),
            ));
        }
        if self
            .profile
            .iter()
            .any(|p| p.rpm < 0.0 || p.map_kpa <= 0.0 || !(0.0..=100.0).contains(&p.tps_pct))
        {
            return Err(ConfigError::ValidationError(
                "simulation.profile point out of range".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_valid() {
        let cfg = SimulationConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.profile[0].rpm, 0.0);
    }

    #[test]
    fn unsorted_profile_rejected() {
        let mut cfg = SimulationConfig::steady(1800.0, 35.0, 2.0);
        cfg.profile.push(ProfilePoint::new(-1.0, 1000.0, 30.0, 0.0));
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn zero_flow_scale_rejected() {
        let cfg = SimulationConfig {
            injector_flow_scale: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
