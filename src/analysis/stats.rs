//! Fit-quality statistics and small weighted-average helpers.

use serde::Serialize;

/// Model fit quality metrics
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FitStatistics {
    /// Coefficient of determination. 0.0 also signals a failed fit.
    pub r_squared: f64,
    pub rmse: f64,
    /// Largest absolute residual
    pub max_error: f64,
    /// Mean absolute residual
    pub mean_error: f64,
    pub n_points: usize,
    #[serde(skip)]
    pub residuals: Vec<f64>,
}

impl FitStatistics {
    /// Statistics for observed values against a model prediction
    pub fn from_predictions(observed: &[f64], predicted: &[f64]) -> Self {
        let residuals: Vec<f64> = observed
            .iter()
            .zip(predicted)
            .map(|(o, p)| o - p)
            .collect();
        Self::from_residuals(observed, residuals)
    }

    /// Statistics from residuals; `observed` supplies the total sum of squares
    pub fn from_residuals(observed: &[f64], residuals: Vec<f64>) -> Self {
        let n = residuals.len();
        if n == 0 {
            return Self::default();
        }

        let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
        let obs_mean = mean(observed).unwrap_or(0.0);
        let ss_tot: f64 = observed.iter().map(|o| (o - obs_mean).powi(2)).sum();
        let r_squared = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            0.0
        };

        let abs = residuals.iter().map(|r| r.abs());
        let max_error = abs.clone().fold(0.0, f64::max);
        let mean_error = abs.sum::<f64>() / n as f64;

        Self {
            r_squared,
            rmse: (ss_res / n as f64).sqrt(),
            max_error,
            mean_error,
            n_points: n,
            residuals,
        }
    }

    /// Same error metrics but flagged as a failed fit
    pub fn degraded(mut self) -> Self {
        self.r_squared = 0.0;
        self
    }

    /// Scale error metrics (e.g. ratio units to percentage points)
    pub fn scaled(mut self, factor: f64) -> Self {
        self.rmse *= factor;
        self.max_error *= factor;
        self.mean_error *= factor;
        self
    }
}

/// Fit quality bands used for display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl FitQuality {
    pub fn from_r_squared(r2: f64) -> Self {
        if r2 >= 0.95 {
            FitQuality::Excellent
        } else if r2 >= 0.85 {
            FitQuality::Good
        } else if r2 >= 0.70 {
            FitQuality::Fair
        } else {
            FitQuality::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FitQuality::Excellent => "Excellent",
            FitQuality::Good => "Good",
            FitQuality::Fair => "Fair",
            FitQuality::Poor => "Poor",
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Weighted mean; falls back to the plain mean when the weights sum to zero
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().take(values.len()).sum();
    if weights.len() < values.len() || !(total > 0.0) || !total.is_finite() {
        return mean(values);
    }

    Some(
        values
            .iter()
            .zip(weights)
            .map(|(v, w)| v * w)
            .sum::<f64>()
            / total,
    )
}
