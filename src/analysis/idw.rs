//! Inverse-distance-weighted interpolation of measured correction ratios.
//!
//! Used to fill cells without fitting a parametric model. Far from every
//! measured cell the estimate blends toward the global average ratio so
//! extrapolation stays bounded.

use serde::Serialize;

use super::stats::weighted_mean;

/// RPM is divided by this before distances are taken so that 100 rpm and
/// 1% load count about the same. Fixed, not derived from the table axes.
pub const RPM_SCALE: f64 = 100.0;
pub const LOAD_SCALE: f64 = 1.0;

/// Normalized distance under which a query snaps to the reference point
pub const EXACT_MATCH_DISTANCE: f64 = 0.01;

/// Inverse distance power
pub const IDW_POWER: f64 = 2.0;

/// Nearest-point distance where blending toward the global average starts;
/// the blend is complete at twice this distance.
pub const BLEND_DISTANCE: f64 = 20.0;

/// A measured cell: its coordinates, correction ratio and confidence weight
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ReferencePoint {
    pub rpm: f64,
    pub load: f64,
    pub ratio: f64,
    /// Weight in the global average (usually the hit count)
    pub weight: f64,
}

impl ReferencePoint {
    pub fn new(rpm: f64, load: f64, ratio: f64) -> Self {
        Self {
            rpm,
            load,
            ratio,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    fn distance_to(&self, rpm_norm: f64, load_norm: f64) -> f64 {
        let dr = self.rpm / RPM_SCALE - rpm_norm;
        let dl = self.load / LOAD_SCALE - load_norm;
        (dr * dr + dl * dl).sqrt()
    }
}

/// IDW predictor over scattered reference points
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScatteredCorrectionInterpolator {
    points: Vec<ReferencePoint>,
    global_average: f64,
}

impl Default for ScatteredCorrectionInterpolator {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            global_average: 1.0,
        }
    }
}

impl ScatteredCorrectionInterpolator {
    /// Build from reference points. Points with a non-finite coordinate or
    /// ratio are dropped.
    pub fn new(points: Vec<ReferencePoint>) -> Self {
        let points: Vec<ReferencePoint> = points
            .into_iter()
            .filter(|p| p.rpm.is_finite() && p.load.is_finite() && p.ratio.is_finite())
            .collect();

        let ratios: Vec<f64> = points.iter().map(|p| p.ratio).collect();
        let weights: Vec<f64> = points.iter().map(|p| p.weight.max(0.0)).collect();
        let global_average = weighted_mean(&ratios, &weights).unwrap_or(1.0);

        Self {
            points,
            global_average,
        }
    }

    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Weighted average ratio over all reference points (1.0 when empty)
    pub fn global_average(&self) -> f64 {
        self.global_average
    }

    /// Predict the correction ratio at `(rpm, load)`
    pub fn predict(&self, rpm: f64, load: f64) -> f64 {
        if self.points.is_empty() || !rpm.is_finite() || !load.is_finite() {
            return self.global_average;
        }

        let rpm_norm = rpm / RPM_SCALE;
        let load_norm = load / LOAD_SCALE;
        let distances: Vec<f64> = self
            .points
            .iter()
            .map(|p| p.distance_to(rpm_norm, load_norm))
            .collect();

        let (nearest_idx, nearest) = distances
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best });

        if nearest < EXACT_MATCH_DISTANCE {
            return self.points[nearest_idx].ratio;
        }

        let weights: Vec<f64> = distances.iter().map(|d| 1.0 / d.powf(IDW_POWER)).collect();
        let total: f64 = weights.iter().sum();
        let interpolated = self
            .points
            .iter()
            .zip(&weights)
            .map(|(p, w)| p.ratio * w / total)
            .sum::<f64>();

        if nearest > BLEND_DISTANCE {
            let blend = ((nearest - BLEND_DISTANCE) / BLEND_DISTANCE).min(1.0);
            (1.0 - blend) * interpolated + blend * self.global_average
        } else {
            interpolated
        }
    }
}
