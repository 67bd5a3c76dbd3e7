//! Fuel types and air-fuel mixture units.
//!
//! Mixture channels arrive either as AFR (≈10–20 for gasoline) or as
//! Lambda (≈0.6–1.5). Correction maths is always done in Lambda.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Fuel whose stoichiometric ratio converts AFR to Lambda
#[derive(
    AsRefStr,
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    EnumIter,
    EnumString,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum FuelType {
    #[default]
    Gasoline,
    E85,
    Methanol,
}

impl FuelType {
    /// Stoichiometric air-fuel ratio
    pub fn stoich_afr(&self) -> f64 {
        match self {
            FuelType::Gasoline => 14.7,
            FuelType::E85 => 9.765,
            FuelType::Methanol => 6.4,
        }
    }

    /// Convert an AFR reading to Lambda
    pub fn afr_to_lambda(&self, afr: f64) -> f64 {
        afr / self.stoich_afr()
    }

    /// Convert a Lambda reading to AFR
    pub fn lambda_to_afr(&self, lambda: f64) -> f64 {
        lambda * self.stoich_afr()
    }
}

/// Scale a batch of mixture readings is expressed in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixtureScale {
    /// Air-fuel ratio, needs dividing by the stoichiometric ratio
    Afr,
    /// Already normalised (1.0 = stoichiometric)
    Lambda,
}

/// Median above which a batch is treated as AFR rather than Lambda.
///
/// Coarse: a batch with very few samples or an unusual target table can be
/// misclassified.
pub const AFR_DETECTION_THRESHOLD: f64 = 5.0;

/// Plausible Lambda window; readings outside it are sensor faults or
/// overrun fuel cut, not mixture.
pub const MIN_PLAUSIBLE_LAMBDA: f64 = 0.6;
pub const MAX_PLAUSIBLE_LAMBDA: f64 = 1.5;

/// Classify a batch from its target and measured readings.
///
/// The batch is AFR if the median of the valid targets, or the median of
/// the valid positive measured values, exceeds [`AFR_DETECTION_THRESHOLD`].
pub fn detect_mixture_scale(target: &[f64], measured: &[f64]) -> MixtureScale {
    let valid_target: Vec<f64> = target.iter().copied().filter(|v| !v.is_nan()).collect();
    let valid_measured: Vec<f64> = measured
        .iter()
        .copied()
        .filter(|v| !v.is_nan() && *v > 0.0)
        .collect();

    let over = |m: Option<f64>| m.is_some_and(|m| m > AFR_DETECTION_THRESHOLD);

    if over(median(&valid_target)) || over(median(&valid_measured)) {
        MixtureScale::Afr
    } else {
        MixtureScale::Lambda
    }
}

/// Whether a Lambda value lies inside the plausible window
#[inline]
pub fn is_plausible_lambda(lambda: f64) -> bool {
    (MIN_PLAUSIBLE_LAMBDA..=MAX_PLAUSIBLE_LAMBDA).contains(&lambda)
}

/// Median of a slice, `None` when empty. NaNs must be filtered beforehand.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();

    Some(if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    })
}
