//! VE calibration tables: axes, cell grids and the text table format.
//!
//! A [`VeTable`] pairs an RPM axis (columns) and a load axis (rows) with a
//! grid of VE percentages. Every per-cell result map produced by the
//! correction pipeline shares the same `[load, rpm]` shape.

pub mod axis;
pub mod format;
pub mod grid;

pub use axis::Axis;
pub use grid::Grid;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::binning::interpolate_bin;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while building, editing, loading or pasting tables
#[derive(Debug, Error)]
pub enum TableError {
    /// The table text could not be parsed
    #[error("Invalid table format: {0}")]
    Format(String),

    /// A values-only block does not match the loaded table's shape
    #[error("Size mismatch: table is {expected_rows}x{expected_cols}, pasted block is {rows}x{cols}")]
    SizeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    /// An axis edit would break ordering or remove the last breakpoint
    #[error("Invalid axis: {0}")]
    InvalidAxis(String),

    /// Failed to read or write a table file
    #[error("Table file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Load Type
// ============================================================================

/// What the load axis measures
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Display, EnumString, PartialEq, Eq, Serialize, Deserialize,
)]
pub enum LoadType {
    /// Throttle position, percent
    #[default]
    #[strum(serialize = "TPS")]
    #[serde(rename = "TPS")]
    Tps,
    /// Manifold pressure
    #[strum(serialize = "MAP")]
    #[serde(rename = "MAP")]
    Map,
}

impl LoadType {
    /// Header label written into the top-left cell of a table file
    pub fn label(&self) -> String {
        format!("Fuel - Load ({}) (%)", self.as_ref())
    }

    /// Recover the load type from a header label. Anything without "TPS" is MAP.
    pub fn from_label(label: &str) -> Self {
        if label.contains("TPS") {
            LoadType::Tps
        } else {
            LoadType::Map
        }
    }
}

// ============================================================================
// VE Table
// ============================================================================

/// A VE map: load rows × RPM columns of VE percentages
#[derive(Clone, Debug, PartialEq)]
pub struct VeTable {
    rpm_axis: Axis,
    load_axis: Axis,
    load_type: LoadType,
    values: Grid<f64>,
}

impl VeTable {
    /// Create a table, checking that the grid matches the axes
    pub fn new(
        rpm_axis: Axis,
        load_axis: Axis,
        load_type: LoadType,
        values: Grid<f64>,
    ) -> Result<Self, TableError> {
        if values.shape() != (load_axis.len(), rpm_axis.len()) {
            return Err(TableError::SizeMismatch {
                expected_rows: load_axis.len(),
                expected_cols: rpm_axis.len(),
                rows: values.rows(),
                cols: values.cols(),
            });
        }

        Ok(Self {
            rpm_axis,
            load_axis,
            load_type,
            values,
        })
    }

    /// Table with every cell set to `ve`
    pub fn filled(rpm_axis: Axis, load_axis: Axis, load_type: LoadType, ve: f64) -> Self {
        let values = Grid::new(load_axis.len(), rpm_axis.len(), ve);
        Self {
            rpm_axis,
            load_axis,
            load_type,
            values,
        }
    }

    pub fn rpm_axis(&self) -> &Axis {
        &self.rpm_axis
    }

    pub fn load_axis(&self) -> &Axis {
        &self.load_axis
    }

    pub fn load_type(&self) -> LoadType {
        self.load_type
    }

    pub fn values(&self) -> &Grid<f64> {
        &self.values
    }

    /// `(rows, cols)` = `(load breakpoints, rpm breakpoints)`
    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row, col).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, ve: f64) -> Result<(), TableError> {
        let cell = self.values.get_mut(row, col).ok_or_else(|| {
            TableError::Format(format!("cell ({}, {}) is outside the table", row, col))
        })?;
        *cell = ve;
        Ok(())
    }

    /// Replace all VE values. Shape must match; the table is unchanged on error.
    pub fn replace_values(&mut self, values: Grid<f64>) -> Result<(), TableError> {
        if values.shape() != self.shape() {
            return Err(TableError::SizeMismatch {
                expected_rows: self.values.rows(),
                expected_cols: self.values.cols(),
                rows: values.rows(),
                cols: values.cols(),
            });
        }
        self.values = values;
        Ok(())
    }

    /// Add an RPM column; new cells are interpolated from the neighbouring columns
    pub fn insert_rpm(&mut self, rpm: f64) -> Result<usize, TableError> {
        let pos = interpolate_bin(rpm, self.rpm_axis.values());
        let index = self.rpm_axis.insert(rpm)?;
        let old = self.values.clone();
        self.values.insert_col_with(index, |r| {
            old[(r, pos.lower)] * (1.0 - pos.factor) + old[(r, pos.upper)] * pos.factor
        });
        Ok(index)
    }

    /// Add a load row; new cells are interpolated from the neighbouring rows
    pub fn insert_load(&mut self, load: f64) -> Result<usize, TableError> {
        let pos = interpolate_bin(load, self.load_axis.values());
        let index = self.load_axis.insert(load)?;
        let old = self.values.clone();
        self.values.insert_row_with(index, |c| {
            old[(pos.lower, c)] * (1.0 - pos.factor) + old[(pos.upper, c)] * pos.factor
        });
        Ok(index)
    }

    pub fn set_rpm_breakpoint(&mut self, index: usize, rpm: f64) -> Result<(), TableError> {
        self.rpm_axis.set(index, rpm)
    }

    pub fn set_load_breakpoint(&mut self, index: usize, load: f64) -> Result<(), TableError> {
        self.load_axis.set(index, load)
    }

    pub fn remove_rpm(&mut self, index: usize) -> Result<(), TableError> {
        self.rpm_axis.remove(index)?;
        self.values.remove_col(index);
        Ok(())
    }

    pub fn remove_load(&mut self, index: usize) -> Result<(), TableError> {
        self.load_axis.remove(index)?;
        self.values.remove_row(index);
        Ok(())
    }

    /// Breakpoint coordinates `(rpm, load)` of a cell
    pub fn cell_coordinates(&self, row: usize, col: usize) -> Option<(f64, f64)> {
        Some((self.rpm_axis.get(col)?, self.load_axis.get(row)?))
    }
}
