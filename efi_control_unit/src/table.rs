//! Fixed-geometry 2-D tables and their axes.
//!
//! Rows are MAP bins (row 0 = lowest pressure), columns are RPM bins. The
//! same geometry backs the calibration (target AFR), base pulse time [µs·K]
//! and AFR trim tables.

use efi_common::consts::{DEFAULT_CALIBRATION, NUM_TABLE_COLS, NUM_TABLE_ROWS};
use efi_common::control_unit::command::TableCell;
use efi_common::control_unit::config::TableConfig;
use efi_common::control_unit::error::GuardFlags;
use static_assertions::const_assert;

const_assert!(NUM_TABLE_ROWS >= 2 && NUM_TABLE_COLS >= 2);

/// Target AFR per cell.
pub type CalibrationTable = Table;
/// Base injector pulse per cell [µs·K].
pub type PulseTimeTable = Table;
/// Multiplicative AFR trim per cell (neutral = 1.0).
pub type TrimTable = Table;

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    cells: [[f64; NUM_TABLE_COLS]; NUM_TABLE_ROWS],
}

impl Table {
    /// Every cell set to `value`.
    pub const fn filled(value: f64) -> Self {
        Self {
            cells: [[value; NUM_TABLE_COLS]; NUM_TABLE_ROWS],
        }
    }

    pub const fn from_cells(cells: [[f64; NUM_TABLE_COLS]; NUM_TABLE_ROWS]) -> Self {
        Self { cells }
    }

    /// Calibration from config, or the built-in default.
    ///
    /// The config shape is checked by `TableConfig::validate`; a mismatched
    /// shape here falls back to the default.
    pub fn calibration(config: &TableConfig) -> CalibrationTable {
        let mut table = Self::from_cells(DEFAULT_CALIBRATION);
        if let Some(rows) = &config.calibration {
            let shape_ok = rows.len() == NUM_TABLE_ROWS
                && rows.iter().all(|r| r.len() == NUM_TABLE_COLS);
            if shape_ok {
                for (dst, src) in table.cells.iter_mut().zip(rows) {
                    dst.copy_from_slice(src);
                }
            }
        }
        table
    }

    #[inline]
    pub fn get(&self, cell: TableCell) -> f64 {
        self.cells[cell.row][cell.col]
    }

    #[inline]
    pub fn set(&mut self, cell: TableCell, value: f64) {
        self.cells[cell.row][cell.col] = value;
    }

    pub fn fill(&mut self, value: f64) {
        *self = Self::filled(value);
    }

    pub fn rows(&self) -> &[[f64; NUM_TABLE_COLS]; NUM_TABLE_ROWS] {
        &self.cells
    }

    /// All cell coordinates, row-major.
    pub fn all_cells() -> impl Iterator<Item = TableCell> {
        (0..NUM_TABLE_ROWS)
            .flat_map(|row| (0..NUM_TABLE_COLS).map(move |col| TableCell { row, col }))
    }

    /// Bilinear interpolation at fractional indices `x` (column) and `y` (row).
    ///
    /// Indices clamp to the table first, so out-of-range input reads the edge.
    pub fn interpolate_2d(&self, x: f64, y: f64) -> f64 {
        let x = clamp_index(x, NUM_TABLE_COLS);
        let y = clamp_index(y, NUM_TABLE_ROWS);

        // Lower-left corner of the 2×2 neighbourhood; the last row/column
        // pairs with its predecessor so the upper index stays in bounds.
        let col = (x.floor() as usize).min(NUM_TABLE_COLS - 2);
        let row = (y.floor() as usize).min(NUM_TABLE_ROWS - 2);
        let fx = x - col as f64;
        let fy = y - row as f64;

        let bl = self.cells[row][col];
        let br = self.cells[row][col + 1];
        let tl = self.cells[row + 1][col];
        let tr = self.cells[row + 1][col + 1];

        let bottom = bl + fx * (br - bl);
        let top = tl + fx * (tr - tl);
        bottom + fy * (top - bottom)
    }

    /// Cell nearest to fractional indices `(x, y)`, clamped.
    pub fn nearest(x: f64, y: f64) -> TableCell {
        TableCell {
            row: clamp_index(y, NUM_TABLE_ROWS).round() as usize,
            col: clamp_index(x, NUM_TABLE_COLS).round() as usize,
        }
    }
}

#[inline]
fn clamp_index(v: f64, len: usize) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, (len - 1) as f64)
}

/// Mapping from engine operating point to fractional table indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableAxes {
    pub rpm_min: f64,
    pub rpm_step: f64,
    pub map_min_kpa: f64,
    pub map_step_kpa: f64,
}

impl From<&TableConfig> for TableAxes {
    fn from(config: &TableConfig) -> Self {
        Self {
            rpm_min: config.rpm_min,
            rpm_step: config.rpm_step,
            map_min_kpa: config.map_min_kpa,
            map_step_kpa: config.map_step_kpa,
        }
    }
}

impl TableAxes {
    /// Fractional `(x, y)` for `rpm` and `map_kpa`, clamped to the table.
    ///
    /// Sets `RPM_CLAMPED` / `MAP_CLAMPED` when the input fell outside an axis.
    pub fn coords(&self, rpm: f64, map_kpa: f64) -> (f64, f64, GuardFlags) {
        let mut guards = GuardFlags::empty();

        let raw_x = (rpm - self.rpm_min) / self.rpm_step;
        let x = clamp_index(raw_x, NUM_TABLE_COLS);
        if x != raw_x {
            guards |= GuardFlags::RPM_CLAMPED;
        }

        let raw_y = (map_kpa - self.map_min_kpa) / self.map_step_kpa;
        let y = clamp_index(raw_y, NUM_TABLE_ROWS);
        if y != raw_y {
            guards |= GuardFlags::MAP_CLAMPED;
        }

        (x, y, guards)
    }

    /// Manifold pressure at the centre of `row` [kPa].
    #[inline]
    pub fn map_row_kpa(&self, row: usize) -> f64 {
        self.map_min_kpa + row as f64 * self.map_step_kpa
    }
}
