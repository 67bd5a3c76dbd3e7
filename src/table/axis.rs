//! Table axes (breakpoint lists).

use serde::{Deserialize, Serialize};

use super::TableError;
use crate::binning;

/// Ordered list of breakpoints for one table dimension.
///
/// Always non-empty and strictly monotonic, either increasing (RPM) or
/// decreasing (load tables are usually stored from 100% down to 0%).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Axis {
    breakpoints: Vec<f64>,
}

impl Axis {
    /// Create an axis, validating that it is non-empty, finite and strictly monotonic
    pub fn new(breakpoints: Vec<f64>) -> Result<Self, TableError> {
        check_breakpoints(&breakpoints)?;
        Ok(Self { breakpoints })
    }

    pub fn values(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    /// Axes are never empty; provided for API symmetry with slices
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.breakpoints.get(index).copied()
    }

    pub fn is_descending(&self) -> bool {
        binning::is_descending(&self.breakpoints)
    }

    /// Replace a single breakpoint. The edit is rejected if it would break ordering.
    pub fn set(&mut self, index: usize, value: f64) -> Result<(), TableError> {
        self.check_index(index)?;
        let mut candidate = self.breakpoints.clone();
        candidate[index] = value;
        check_breakpoints(&candidate)?;
        self.breakpoints = candidate;
        Ok(())
    }

    /// Insert a breakpoint at the position that keeps the axis ordered.
    ///
    /// Returns the index the value was inserted at.
    pub fn insert(&mut self, value: f64) -> Result<usize, TableError> {
        if !value.is_finite() {
            return Err(TableError::InvalidAxis(format!(
                "breakpoint {} is not finite",
                value
            )));
        }
        if self.breakpoints.iter().any(|&b| b == value) {
            return Err(TableError::InvalidAxis(format!(
                "breakpoint {} already exists",
                value
            )));
        }

        // A single-breakpoint axis has no direction yet and grows ascending
        let index = if self.is_descending() {
            self.breakpoints
                .iter()
                .position(|&b| value > b)
                .unwrap_or(self.len())
        } else {
            self.breakpoints
                .iter()
                .position(|&b| value < b)
                .unwrap_or(self.len())
        };

        let mut candidate = self.breakpoints.clone();
        candidate.insert(index, value);
        check_breakpoints(&candidate)?;
        self.breakpoints = candidate;
        Ok(index)
    }

    /// Remove a breakpoint. The last remaining breakpoint cannot be removed.
    pub fn remove(&mut self, index: usize) -> Result<f64, TableError> {
        self.check_index(index)?;
        if self.len() == 1 {
            return Err(TableError::InvalidAxis(
                "cannot remove the only breakpoint".to_string(),
            ));
        }
        Ok(self.breakpoints.remove(index))
    }

    fn check_index(&self, index: usize) -> Result<(), TableError> {
        if index >= self.len() {
            return Err(TableError::InvalidAxis(format!(
                "index {} out of range for axis of length {}",
                index,
                self.len()
            )));
        }
        Ok(())
    }
}

impl TryFrom<Vec<f64>> for Axis {
    type Error = TableError;

    fn try_from(breakpoints: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(breakpoints)
    }
}

impl From<Axis> for Vec<f64> {
    fn from(axis: Axis) -> Self {
        axis.breakpoints
    }
}

fn check_breakpoints(values: &[f64]) -> Result<(), TableError> {
    if values.is_empty() {
        return Err(TableError::InvalidAxis(
            "axis needs at least one breakpoint".to_string(),
        ));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(TableError::InvalidAxis(format!(
            "breakpoint {} is not finite",
            bad
        )));
    }

    let increasing = values.windows(2).all(|w| w[1] > w[0]);
    let decreasing = values.windows(2).all(|w| w[1] < w[0]);
    if !(increasing || decreasing) {
        return Err(TableError::InvalidAxis(
            "breakpoints must be strictly increasing or strictly decreasing".to_string(),
        ));
    }

    Ok(())
}
