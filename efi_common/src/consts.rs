//! System-wide constants for the EFI workspace.
//!
//! Single source of truth for table geometry, physical constants,
//! telemetry framing and default paths.

use static_assertions::const_assert;

// ─── Table Geometry ─────────────────────────────────────────────────

/// Number of manifold-pressure bins (table rows). Row 0 is minimum pressure.
pub const NUM_TABLE_ROWS: usize = 11;

/// Number of RPM bins (table columns). Column 0 is minimum RPM.
pub const NUM_TABLE_COLS: usize = 10;

/// Factory calibration: target air-fuel ratio per (MAP row, RPM column).
pub const DEFAULT_CALIBRATION: [[f64; NUM_TABLE_COLS]; NUM_TABLE_ROWS] = [
    [14.5, 14.8, 15.0, 15.3, 15.3, 15.2, 14.6, 14.3, 13.8, 13.6],
    [14.5, 14.8, 15.0, 15.3, 15.3, 15.2, 14.6, 14.3, 13.8, 13.6],
    [14.5, 14.8, 15.0, 15.3, 15.3, 15.2, 14.6, 14.3, 13.8, 13.6],
    [14.5, 14.8, 15.0, 15.3, 16.0, 16.0, 15.7, 14.3, 13.8, 13.6],
    [14.5, 14.8, 15.0, 15.3, 16.0, 16.0, 15.7, 14.3, 13.8, 13.6],
    [14.5, 14.8, 15.0, 15.3, 16.0, 16.0, 15.7, 14.3, 13.8, 13.6],
    [14.5, 14.8, 15.0, 15.3, 15.3, 15.2, 14.6, 14.3, 13.8, 13.6],
    [14.5, 14.8, 15.0, 15.3, 15.3, 15.2, 14.6, 14.3, 13.8, 13.6],
    [14.5, 14.8, 15.0, 15.3, 15.3, 15.2, 14.6, 14.3, 13.8, 13.6],
    [14.5, 14.8, 15.0, 15.3, 15.3, 15.2, 14.6, 14.3, 13.8, 13.6],
    [14.5, 14.8, 15.0, 15.3, 15.3, 15.2, 14.6, 14.3, 13.8, 13.6],
];

/// Lowest AFR accepted into the calibration table.
pub const AFR_PLAUSIBLE_MIN: f64 = 6.0;

/// Highest AFR accepted into the calibration table.
pub const AFR_PLAUSIBLE_MAX: f64 = 25.0;

// ─── Physics ────────────────────────────────────────────────────────

/// Specific gas constant of dry air [J/(kg·K)].
pub const R_AIR: f64 = 287.05;

/// 0 °C in Kelvin.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Stoichiometric AFR of gasoline.
pub const STOICH_AFR: f64 = 14.7;

/// Microseconds per minute (RPM arithmetic).
pub const MICROS_PER_MINUTE: u64 = 60_000_000;

// ─── Telemetry ──────────────────────────────────────────────────────

/// Size of one telemetry frame on the wire [bytes].
pub const TELEMETRY_FRAME_LEN: usize = 44;

/// Leading frame sentinel.
pub const FRAME_START_SENTINEL: u32 = 0x8000_0001;

/// Trailing frame sentinel.
pub const FRAME_END_SENTINEL: u32 = 0x8000_0000;

// ─── Defaults ───────────────────────────────────────────────────────

/// Default main-loop cycle time in microseconds.
pub const CYCLE_TIME_US: u32 = 1000;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/efi/efi.toml";

/// Canonical HAL service name (logging).
pub const HAL_SERVICE_NAME: &str = "efi_hal";

const_assert!(NUM_TABLE_ROWS >= 2);
const_assert!(NUM_TABLE_COLS >= 2);
const_assert!(TELEMETRY_FRAME_LEN == 11 * 4);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_is_plausible() {
        for row in DEFAULT_CALIBRATION.iter() {
            for &afr in row.iter() {
                assert!((AFR_PLAUSIBLE_MIN..=AFR_PLAUSIBLE_MAX).contains(&afr));
            }
        }
    }

    #[test]
    fn sentinels_differ() {
        assert_ne!(FRAME_START_SENTINEL, FRAME_END_SENTINEL);
        assert_eq!(FRAME_START_SENTINEL & 0x8000_0000, 0x8000_0000);
    }
}
