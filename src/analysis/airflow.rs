//! Alpha-N airflow model for VE prediction and extrapolation.
//!
//! `VE(rpm, load) = ve_base × rpm_factor(rpm) × load_factor(load)`
//!
//! - VE peaks at the torque peak and falls off linearly toward redline
//! - Throttle airflow follows a butterfly plate: area ∝ 1 − cos θ
//! - `ve_base` is pinned to the profile's peak VE so wide-open-throttle
//!   predictions stay anchored even when the logs only cover part throttle
//!
//! The model can also hold measured correction ratios and interpolate them
//! (see [`AirflowModel::fit_correction_ratios`]), which is more robust for
//! test-stand logs than the absolute VE fit.

use serde::Serialize;
use std::f64::consts::FRAC_PI_2;

use super::idw::{ReferencePoint, ScatteredCorrectionInterpolator};
use super::optimize::{least_squares, Bounds, SolverConfig};
use super::stats::{FitQuality, FitStatistics};
use crate::engine::EngineProfile;
use crate::table::{Axis, Grid};

/// Lower limit on the RPM factor; VE never drops to zero or below
pub const RPM_FACTOR_FLOOR: f64 = 0.05;

/// Only loads below this are fitted when enough of them exist. Unloaded
/// test-stand data at high throttle is not representative of real WOT flow.
pub const LOW_LOAD_LIMIT: f64 = 60.0;
pub const MIN_LOW_LOAD_POINTS: usize = 5;

/// Fewer points than this and the shape is not fitted at all
pub const MIN_FIT_POINTS: usize = 3;

pub const MAX_FIT_EVALUATIONS: usize = 5000;

/// Bounds of the fitted shape parameters
pub const RPM_MIN_FACTOR_BOUNDS: (f64, f64) = (0.1, 0.8);
pub const IDLE_FLOW_BOUNDS: (f64, f64) = (0.0, 0.15);
pub const LOAD_EXPONENT_BOUNDS: (f64, f64) = (0.3, 3.0);

/// The three fitted shape parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ShapeParams {
    /// RPM factor at 0 rpm; ramps linearly to 1.0 at the torque peak
    pub rpm_min_factor: f64,
    /// Airflow fraction with the throttle closed
    pub idle_flow: f64,
    /// Reshapes the butterfly curve (1.0 = pure cosine model)
    pub load_exponent: f64,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            rpm_min_factor: 0.3,
            idle_flow: 0.02,
            load_exponent: 1.0,
        }
    }
}

impl ShapeParams {
    fn to_vec(self) -> Vec<f64> {
        vec![self.rpm_min_factor, self.idle_flow, self.load_exponent]
    }

    fn from_slice(p: &[f64]) -> Self {
        Self {
            rpm_min_factor: p[0],
            idle_flow: p[1],
            load_exponent: p[2],
        }
    }

    fn bounds() -> Bounds {
        Bounds::new(
            vec![RPM_MIN_FACTOR_BOUNDS.0, IDLE_FLOW_BOUNDS.0, LOAD_EXPONENT_BOUNDS.0],
            vec![RPM_MIN_FACTOR_BOUNDS.1, IDLE_FLOW_BOUNDS.1, LOAD_EXPONENT_BOUNDS.1],
        )
    }
}

/// Piecewise RPM factor: linear ramp up to the torque peak, linear decay after
pub fn rpm_factor(profile: &EngineProfile, params: &ShapeParams, rpm: f64) -> f64 {
    let peak = profile.peak_torque_rpm.max(1.0);
    let span = (profile.redline_rpm - peak).max(1.0);
    let redline_factor = profile.cam_profile.redline_factor();

    let factor = if rpm < peak {
        params.rpm_min_factor + (1.0 - params.rpm_min_factor) * (rpm / peak)
    } else {
        // Keeps decaying past redline
        1.0 - (1.0 - redline_factor) / span * (rpm - peak)
    };

    factor.max(RPM_FACTOR_FLOOR)
}

/// Butterfly-valve load factor: `idle_flow` closed, 1.0 wide open
pub fn load_factor(params: &ShapeParams, load: f64) -> f64 {
    let theta = (load / 100.0) * FRAC_PI_2;
    let shaped = (1.0 - theta.cos()).max(0.0).powf(params.load_exponent);

    (params.idle_flow + (1.0 - params.idle_flow) * shaped).clamp(0.0, 1.0)
}

/// Which fits have succeeded on a model
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FitState {
    pub shape: bool,
    pub correction_ratios: bool,
}

/// Alpha-N VE model bound to an engine profile
#[derive(Clone, Debug)]
pub struct AirflowModel {
    profile: EngineProfile,
    ve_base: f64,
    params: ShapeParams,
    state: FitState,
    fit_stats: Option<FitStatistics>,
    corrections: ScatteredCorrectionInterpolator,
}

impl AirflowModel {
    pub fn new(profile: EngineProfile) -> Self {
        Self {
            ve_base: profile.peak_ve_estimate,
            profile,
            params: ShapeParams::default(),
            state: FitState::default(),
            fit_stats: None,
            corrections: ScatteredCorrectionInterpolator::default(),
        }
    }

    pub fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    pub fn ve_base(&self) -> f64 {
        self.ve_base
    }

    pub fn params(&self) -> ShapeParams {
        self.params
    }

    pub fn fit_state(&self) -> FitState {
        self.state
    }

    /// Statistics of the most recent fit call
    pub fn fit_stats(&self) -> Option<&FitStatistics> {
        self.fit_stats.as_ref()
    }

    /// Measured ratios stored by the last correction-ratio fit
    pub fn corrections(&self) -> &ScatteredCorrectionInterpolator {
        &self.corrections
    }

    pub fn has_shape_fit(&self) -> bool {
        self.state.shape
    }

    pub fn has_ratio_fit(&self) -> bool {
        self.state.correction_ratios
    }

    pub fn has_valid_fit(&self) -> bool {
        self.state.shape || self.state.correction_ratios
    }

    pub fn rpm_factor(&self, rpm: f64) -> f64 {
        rpm_factor(&self.profile, &self.params, rpm)
    }

    pub fn load_factor(&self, load: f64) -> f64 {
        load_factor(&self.params, load)
    }

    /// Predicted VE% at one point
    pub fn predict(&self, rpm: f64, load: f64) -> f64 {
        self.ve_base * self.rpm_factor(rpm) * self.load_factor(load)
    }

    /// Predicted VE for every cell of a table layout (`[load, rpm]`)
    pub fn predict_grid(&self, rpm_axis: &Axis, load_axis: &Axis) -> Grid<f64> {
        let rows: Vec<Vec<f64>> = load_axis
            .values()
            .iter()
            .map(|&load| {
                rpm_axis
                    .values()
                    .iter()
                    .map(|&rpm| self.predict(rpm, load))
                    .collect()
            })
            .collect();
        // Rows are built from the axes, so they cannot be ragged
        Grid::from_rows(rows).unwrap_or_else(|_| Grid::new(0, 0, 0.0))
    }

    /// Fit the shape parameters to measured VE.
    ///
    /// `ve_base` stays pinned to the profile's peak VE estimate. `weights`
    /// are per-point confidences (hit counts), normalised by their maximum.
    /// Never fails: with too few points or a failed solve the current
    /// parameters are kept and the returned statistics carry `r_squared = 0`.
    pub fn fit(
        &mut self,
        rpm: &[f64],
        load: &[f64],
        ve: &[f64],
        weights: Option<&[f64]>,
    ) -> FitStatistics {
        let n = rpm.len().min(load.len()).min(ve.len());
        if rpm.len() != n || load.len() != n || ve.len() != n {
            tracing::warn!(
                "Airflow fit inputs have different lengths, using first {} points",
                n
            );
        }

        let mut points: Vec<(f64, f64, f64, f64)> = (0..n)
            .map(|i| {
                let w = weights.and_then(|w| w.get(i)).copied().unwrap_or(1.0);
                (rpm[i], load[i], ve[i], w)
            })
            .filter(|(r, l, v, w)| r.is_finite() && l.is_finite() && v.is_finite() && w.is_finite())
            .collect();

        self.ve_base = self.profile.peak_ve_estimate;

        if points.len() < MIN_FIT_POINTS {
            tracing::warn!(
                "Airflow fit needs at least {} points, got {}",
                MIN_FIT_POINTS,
                points.len()
            );
            return self.finish_failed_fit(&points);
        }

        let max_weight = points.iter().map(|p| p.3).fold(0.0, f64::max);
        for p in points.iter_mut() {
            p.3 = if max_weight > 0.0 { p.3 / max_weight } else { 1.0 };
        }

        let low_load: Vec<_> = points
            .iter()
            .copied()
            .filter(|p| p.1 < LOW_LOAD_LIMIT)
            .collect();
        if low_load.len() >= MIN_LOW_LOAD_POINTS {
            tracing::debug!(
                "Fitting {} of {} points below {}% load",
                low_load.len(),
                points.len(),
                LOW_LOAD_LIMIT
            );
            points = low_load;
        }

        let profile = self.profile.clone();
        let ve_base = self.ve_base;
        let residuals = |p: &[f64]| -> Vec<f64> {
            let params = ShapeParams::from_slice(p);
            points
                .iter()
                .map(|&(r, l, v, w)| {
                    let predicted =
                        ve_base * rpm_factor(&profile, &params, r) * load_factor(&params, l);
                    w * (v - predicted)
                })
                .collect()
        };

        let config = SolverConfig {
            max_evaluations: MAX_FIT_EVALUATIONS,
            ..SolverConfig::default()
        };

        match least_squares(residuals, &self.params.to_vec(), &ShapeParams::bounds(), &config) {
            Ok(solution) => {
                self.params = ShapeParams::from_slice(&solution.params);
                self.state.shape = true;

                let stats = self.statistics_for(&points);
                tracing::info!(
                    "Airflow fit: R²={:.4}, RMSE={:.2}, {} points, {} evaluations{}",
                    stats.r_squared,
                    stats.rmse,
                    stats.n_points,
                    solution.evaluations,
                    if solution.converged { "" } else { " (evaluation cap hit)" }
                );
                self.fit_stats = Some(stats.clone());
                stats
            }
            Err(e) => {
                tracing::warn!("Airflow model fitting failed: {}", e);
                self.finish_failed_fit(&points)
            }
        }
    }

    fn statistics_for(&self, points: &[(f64, f64, f64, f64)]) -> FitStatistics {
        let observed: Vec<f64> = points.iter().map(|p| p.2).collect();
        let predicted: Vec<f64> = points.iter().map(|p| self.predict(p.0, p.1)).collect();
        FitStatistics::from_predictions(&observed, &predicted)
    }

    fn finish_failed_fit(&mut self, points: &[(f64, f64, f64, f64)]) -> FitStatistics {
        self.state.shape = false;
        let stats = self.statistics_for(points).degraded();
        self.fit_stats = Some(stats.clone());
        stats
    }

    /// Store measured correction ratios for interpolation instead of fitting
    /// an absolute VE surface.
    ///
    /// Ratio = corrected / base per cell (1.0 where base is not positive).
    /// The weighted mean ratio becomes the far-field fallback; statistics
    /// describe the spread around it in percentage points.
    pub fn fit_correction_ratios(
        &mut self,
        rpm: &[f64],
        load: &[f64],
        base_ve: &[f64],
        corrected_ve: &[f64],
        weights: Option<&[f64]>,
    ) -> FitStatistics {
        let n = rpm
            .len()
            .min(load.len())
            .min(base_ve.len())
            .min(corrected_ve.len());

        let points: Vec<ReferencePoint> = (0..n)
            .map(|i| {
                let ratio = if base_ve[i] > 0.0 {
                    corrected_ve[i] / base_ve[i]
                } else {
                    1.0
                };
                let weight = weights.and_then(|w| w.get(i)).copied().unwrap_or(1.0);
                ReferencePoint::new(rpm[i], load[i], ratio).with_weight(weight)
            })
            .collect();

        self.corrections = ScatteredCorrectionInterpolator::new(points);
        self.state.correction_ratios = !self.corrections.is_empty();

        if self.corrections.is_empty() {
            let stats = FitStatistics::default();
            self.fit_stats = Some(stats.clone());
            return stats;
        }

        let average = self.corrections.global_average();
        let ratios: Vec<f64> = self.corrections.points().iter().map(|p| p.ratio).collect();
        let residuals: Vec<f64> = ratios.iter().map(|r| r - average).collect();
        let stats = FitStatistics::from_residuals(&ratios, residuals).scaled(100.0);

        tracing::info!(
            "Stored {} correction ratios, average {:.3}",
            stats.n_points,
            average
        );

        self.fit_stats = Some(stats.clone());
        stats
    }

    /// Interpolated correction ratio at `(rpm, load)`
    pub fn predict_correction_ratio(&self, rpm: f64, load: f64) -> f64 {
        self.corrections.predict(rpm, load)
    }

    pub fn predict_corrected_ve(&self, rpm: f64, load: f64, base_ve: f64) -> f64 {
        base_ve * self.predict_correction_ratio(rpm, load)
    }

    /// Quality band of the last fit, `None` before any fit
    pub fn fit_quality(&self) -> Option<FitQuality> {
        self.fit_stats
            .as_ref()
            .map(|s| FitQuality::from_r_squared(s.r_squared))
    }

    /// Human-readable fit quality, e.g. "Good (R² = 0.912)"
    pub fn fit_quality_description(&self) -> String {
        match (&self.fit_stats, self.fit_quality()) {
            (Some(stats), Some(quality)) => {
                format!("{} (R² = {:.3})", quality.label(), stats.r_squared)
            }
            _ => "Model not fitted".to_string(),
        }
    }
}
