//! State machine enums for the injection control core.
//!
//! Both enums are `#[repr(u8)]` so they can live in an atomic byte shared
//! between the main loop and interrupt context.

use serde::{Deserialize, Serialize};

/// Injector actuator state.
///
/// The output may only be high in `Pulsing`. There is no representation for
/// "pulsing while disabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InjectorState {
    /// Output forced low, off-timer detached; pulses are refused.
    Disabled = 0,
    /// Enabled, output low, waiting for the next injection event.
    Idle = 1,
    /// Enabled, output high, off-timer pending.
    Pulsing = 2,
}

impl InjectorState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Idle),
            2 => Some(Self::Pulsing),
            _ => None,
        }
    }

    /// Whether pulses are accepted in this state.
    #[inline]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl Default for InjectorState {
    fn default() -> Self {
        Self::Disabled
    }
}

/// Engine running state as seen by the engine-state monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EngineState {
    /// Below running speed or stalled.
    Stopped = 0,
    /// At or above running speed with crank edges arriving.
    Running = 1,
}

impl EngineState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stopped),
            1 => Some(Self::Running),
            _ => None,
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::Stopped
    }
}

/// Per-cycle engine snapshot.
///
/// Read fresh each control cycle; only `rpm` is carried into the next one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSample {
    /// Engine speed.
    pub rpm: i32,
    /// Throttle opening [%].
    pub tps: f64,
    /// Throttle opening rate [%/s].
    pub dtps: f64,
    /// Coolant temperature [°C].
    pub ect: f64,
    /// Intake air temperature [°C].
    pub iat: f64,
    /// Manifold absolute pressure [kPa].
    pub map: f64,
    /// Measured air-fuel ratio.
    pub afr: f64,
}
