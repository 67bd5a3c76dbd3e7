//! Breakpoint binning for calibration table axes.
//!
//! Each table cell owns the span between its breakpoint and the next one:
//! - Ascending axis (RPM): bin `i` covers `[axis[i], axis[i+1])`
//! - Descending axis (Load): bin `i` covers `(axis[i+1], axis[i]]`
//!
//! Values beyond either end of the axis clamp to the edge bins.

/// Returns true when the axis runs from high to low (e.g. Load: 100, 90, ... 0)
#[inline]
pub fn is_descending(axis: &[f64]) -> bool {
    match (axis.first(), axis.last()) {
        (Some(first), Some(last)) => first > last,
        _ => false,
    }
}

/// Find the bin index for a value using the axis breakpoints as bin boundaries.
///
/// Returns an index in `0..axis.len()`. Degenerate axes (empty or a single
/// breakpoint) always map to bin 0.
pub fn find_bin_index(value: f64, axis: &[f64]) -> usize {
    if axis.len() < 2 {
        return 0;
    }

    let last = axis.len() - 1;

    if is_descending(axis) {
        // Value 95 on [100, 90, 80] goes to bin 0, value 85 to bin 1
        if value >= axis[0] {
            return 0;
        }
        if value <= axis[last] {
            return last;
        }

        // First breakpoint strictly below the value closes the bin
        axis.windows(2)
            .position(|w| value <= w[0] && value > w[1])
            .unwrap_or(last)
    } else {
        // Value 125 on [0, 250, 500] goes to bin 0, value 375 to bin 1
        if value <= axis[0] {
            return 0;
        }
        if value >= axis[last] {
            return last;
        }

        axis.windows(2)
            .position(|w| value >= w[0] && value < w[1])
            .unwrap_or(last)
    }
}

/// Bracketing breakpoints for a value along an axis
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinPosition {
    /// Index of the breakpoint at or before the value (in axis order)
    pub lower: usize,
    /// Index of the breakpoint after the value
    pub upper: usize,
    /// 0.0 = exactly at `lower`, 1.0 = exactly at `upper`
    pub factor: f64,
}

impl BinPosition {
    fn edge(index: usize) -> Self {
        Self {
            lower: index,
            upper: index,
            factor: 0.0,
        }
    }
}

/// Find the two bracketing breakpoints and the linear interpolation factor
/// between them.
///
/// Used when a sample should be spread across neighbouring bins instead of
/// hard-binned. Values outside the axis clamp to the nearest edge with a
/// factor of 0.
pub fn interpolate_bin(value: f64, axis: &[f64]) -> BinPosition {
    if axis.len() < 2 || value.is_nan() {
        return BinPosition::edge(0);
    }

    let last = axis.len() - 1;
    let descending = is_descending(axis);

    // Position along the axis direction: "before the first breakpoint" and
    // "past the last breakpoint" flip for descending axes
    let before_start = if descending {
        value >= axis[0]
    } else {
        value <= axis[0]
    };
    let past_end = if descending {
        value <= axis[last]
    } else {
        value >= axis[last]
    };

    if before_start {
        return BinPosition::edge(0);
    }
    if past_end {
        return BinPosition::edge(last);
    }

    for upper in 1..axis.len() {
        let reached = if descending {
            value >= axis[upper]
        } else {
            value <= axis[upper]
        };

        if reached {
            let lower = upper - 1;
            let span = axis[upper] - axis[lower];
            let factor = if span.abs() > f64::EPSILON {
                ((value - axis[lower]) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            return BinPosition {
                lower,
                upper,
                factor,
            };
        }
    }

    BinPosition::edge(last)
}
