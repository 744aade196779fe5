//! Inbound commands the control core accepts from the command channel.
//!
//! The byte-level protocol is not part of the core; whatever transport sits in
//! front of it decodes into [`Command`] and hands it to the controller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{AFR_PLAUSIBLE_MAX, AFR_PLAUSIBLE_MIN, NUM_TABLE_COLS, NUM_TABLE_ROWS};

/// Cell coordinate in the 11 × 10 tables (row = MAP bin, col = RPM bin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableCell {
    pub row: usize,
    pub col: usize,
}

impl TableCell {
    /// Bounds-checked constructor.
    pub fn new(row: usize, col: usize) -> Result<Self, CommandError> {
        if row >= NUM_TABLE_ROWS || col >= NUM_TABLE_COLS {
            return Err(CommandError::CellOutOfRange { row, col });
        }
        Ok(Self { row, col })
    }
}

/// Which base pulse cells to recompute from the calibration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PulseRecalc {
    /// One cell.
    Cell(TableCell),
    /// Every cell. Overwrites all base values.
    All,
}

/// Command-channel request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Enable the telemetry stream.
    StartTransmission,
    /// Disable the telemetry stream.
    StopTransmission,
    /// Rewrite one calibration cell and recompute its base pulse time.
    SetCalibrationCell { row: usize, col: usize, afr: f64 },
    /// Recompute every base pulse time from the calibration table.
    RecalculateAll,
    /// Return all feedback trims to neutral.
    ResetTrims,
    /// Turn the AFR loop on or off.
    SetAfrFeedback(bool),
    /// Turn the idle-speed loop on or off.
    SetIdleFeedback(bool),
    /// Step the startup enrichment up.
    RaiseStartupModifier,
    /// Decay the startup enrichment now.
    LowerStartupModifier,
}

/// Rejected command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("table cell ({row}, {col}) out of range")]
    CellOutOfRange { row: usize, col: usize },

    #[error("AFR {0} outside plausible range [{AFR_PLAUSIBLE_MIN}, {AFR_PLAUSIBLE_MAX}]")]
    ImplausibleAfr(f64),
}

/// Validate a calibration AFR value.
pub fn check_afr(afr: f64) -> Result<f64, CommandError> {
    if (AFR_PLAUSIBLE_MIN..=AFR_PLAUSIBLE_MAX).contains(&afr) {
        Ok(afr)
    } else {
        Err(CommandError::ImplausibleAfr(afr))
    }
}
