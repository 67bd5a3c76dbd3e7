//! Tests for fuel types and mixture scale detection

use approx::assert_relative_eq;
use std::str::FromStr;
use strum::IntoEnumIterator;
use vetune::units::{
    detect_mixture_scale, is_plausible_lambda, median, FuelType, MixtureScale,
};

// ============================================
// Fuel Type Tests
// ============================================

#[test]
fn test_stoich_constants() {
    assert_eq!(FuelType::Gasoline.stoich_afr(), 14.7);
    assert_eq!(FuelType::E85.stoich_afr(), 9.765);
    assert_eq!(FuelType::Methanol.stoich_afr(), 6.4);
}

#[test]
fn test_fuel_parse_case_insensitive() {
    assert_eq!(FuelType::from_str("gasoline").unwrap(), FuelType::Gasoline);
    assert_eq!(FuelType::from_str("e85").unwrap(), FuelType::E85);
    assert_eq!(FuelType::from_str("METHANOL").unwrap(), FuelType::Methanol);
    assert!(FuelType::from_str("diesel").is_err());
}

#[test]
fn test_afr_lambda_conversion() {
    for fuel in FuelType::iter() {
        assert_relative_eq!(fuel.afr_to_lambda(fuel.stoich_afr()), 1.0);
        assert_relative_eq!(fuel.lambda_to_afr(1.0), fuel.stoich_afr());
    }
    assert_relative_eq!(FuelType::Gasoline.afr_to_lambda(13.23), 0.9, epsilon = 1e-12);
}

// ============================================
// Mixture Scale Detection Tests
// ============================================

#[test]
fn test_detect_lambda_batch() {
    let scale = detect_mixture_scale(&[1.0, 0.95, 0.85], &[1.02, 0.97, 0.88]);
    assert_eq!(scale, MixtureScale::Lambda);
}

#[test]
fn test_detect_afr_batch() {
    let scale = detect_mixture_scale(&[14.7, 14.0, 12.5], &[14.9, 13.8, 12.2]);
    assert_eq!(scale, MixtureScale::Afr);
}

#[test]
fn test_detect_from_measured_only() {
    // Targets missing entirely, measured clearly AFR
    let scale = detect_mixture_scale(&[f64::NAN, f64::NAN], &[14.2, 14.9]);
    assert_eq!(scale, MixtureScale::Afr);

    // Non-positive measured values are ignored by the median
    let scale = detect_mixture_scale(&[1.0], &[0.0, -1.0, 0.98]);
    assert_eq!(scale, MixtureScale::Lambda);
}

#[test]
fn test_detect_empty_defaults_to_lambda() {
    assert_eq!(detect_mixture_scale(&[], &[]), MixtureScale::Lambda);
}

#[test]
fn test_plausible_window() {
    assert!(is_plausible_lambda(0.6));
    assert!(is_plausible_lambda(1.5));
    assert!(!is_plausible_lambda(0.59));
    assert!(!is_plausible_lambda(1.51));
    assert!(!is_plausible_lambda(f64::NAN));
}

#[test]
fn test_median() {
    assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    assert_eq!(median(&[]), None);
}
