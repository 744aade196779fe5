//! HAL data types.

use serde::{Deserialize, Serialize};

/// Analog inputs, already scaled to physical units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    /// Manifold absolute pressure [kPa]
    pub map_kpa: f64,
    /// Wideband AFR sensor output [V]
    pub afr_volts: f64,
    /// Coolant temperature [°C]
    pub ect_c: f64,
    /// Intake air temperature [°C]
    pub iat_c: f64,
    /// Throttle opening [%]
    pub tps_pct: f64,
}
