//! Tests for the alpha-N airflow model and its fits

use approx::{assert_abs_diff_eq, assert_relative_eq};
use vetune::analysis::airflow::{
    load_factor, rpm_factor, AirflowModel, ShapeParams, LOW_LOAD_LIMIT,
};
use vetune::analysis::stats::FitQuality;
use vetune::engine::CamProfile;

use crate::common::{load_axis, rpm_axis, test_profile};

fn truth() -> ShapeParams {
    ShapeParams {
        rpm_min_factor: 0.45,
        idle_flow: 0.06,
        load_exponent: 1.6,
    }
}

/// Noise-free VE surface generated from `params`
fn synthetic_points(params: &ShapeParams, loads: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let profile = test_profile();
    let mut rpm = Vec::new();
    let mut load = Vec::new();
    let mut ve = Vec::new();
    for r in (1000..=6500).step_by(500) {
        for &l in loads {
            let r = r as f64;
            rpm.push(r);
            load.push(l);
            ve.push(
                profile.peak_ve_estimate * rpm_factor(&profile, params, r) * load_factor(params, l),
            );
        }
    }
    (rpm, load, ve)
}

// ============================================
// Shape Tests
// ============================================

#[test]
fn test_cam_profile_sets_redline_factor() {
    let params = ShapeParams::default();
    for (cam, expected) in [
        (CamProfile::Stock, 0.80),
        (CamProfile::Mild, 0.85),
        (CamProfile::Aggressive, 0.90),
    ] {
        let profile = vetune::engine::EngineProfile {
            cam_profile: cam,
            ..test_profile()
        };
        assert_relative_eq!(rpm_factor(&profile, &params, 7000.0), expected, epsilon = 1e-12);
    }
}

#[test]
fn test_load_factor_is_monotonic_and_bounded() {
    let params = truth();
    let mut last = -1.0;
    for l in 0..=100 {
        let f = load_factor(&params, l as f64);
        assert!((0.0..=1.0).contains(&f));
        assert!(f >= last);
        last = f;
    }
    assert_relative_eq!(load_factor(&params, 0.0), 0.06, epsilon = 1e-12);
}

#[test]
fn test_predict_grid_layout() {
    let model = AirflowModel::new(test_profile());
    let grid = model.predict_grid(&rpm_axis(), &load_axis());
    assert_eq!(grid.shape(), (5, 6));
    // Row 0 is 100% load, column 3 is the 4000 rpm torque peak
    assert_relative_eq!(grid[(0, 3)], 100.0, epsilon = 1e-9);
    assert_relative_eq!(grid[(2, 1)], model.predict(2000.0, 50.0));
}

// ============================================
// Fit Tests
// ============================================

#[test]
fn test_fit_recovers_known_params() {
    let loads = [0.0, 10.0, 20.0, 30.0, 40.0, 50.0];
    let (rpm, load, ve) = synthetic_points(&truth(), &loads);

    let mut model = AirflowModel::new(test_profile());
    let stats = model.fit(&rpm, &load, &ve, None);
    let fitted = model.params();

    assert!(model.has_shape_fit());
    assert!(stats.r_squared > 0.99, "R² was {}", stats.r_squared);
    assert_abs_diff_eq!(fitted.rpm_min_factor, 0.45, epsilon = 1e-3);
    assert_abs_diff_eq!(fitted.idle_flow, 0.06, epsilon = 1e-3);
    assert_abs_diff_eq!(fitted.load_exponent, 1.6, epsilon = 1e-3);
    assert_eq!(model.fit_quality(), Some(FitQuality::Excellent));
}

#[test]
fn test_fit_uses_low_load_subset() {
    // Low-load points follow `truth`, high-load points are deliberately off
    let (mut rpm, mut load, mut ve) = synthetic_points(&truth(), &[0.0, 15.0, 30.0, 45.0]);
    for r in [2000.0, 3000.0, 4000.0, 5000.0] {
        rpm.push(r);
        load.push(LOW_LOAD_LIMIT + 20.0);
        ve.push(20.0);
    }

    let mut model = AirflowModel::new(test_profile());
    let stats = model.fit(&rpm, &load, &ve, None);

    // Only the low-load points were fitted
    assert_eq!(stats.n_points, rpm.len() - 4);
    assert!(stats.r_squared > 0.99);
    assert_abs_diff_eq!(model.params().load_exponent, 1.6, epsilon = 1e-3);
}

#[test]
fn test_weighted_fit() {
    let (rpm, load, ve) = synthetic_points(&truth(), &[0.0, 20.0, 40.0]);
    let weights: Vec<f64> = (0..rpm.len()).map(|i| 1.0 + (i % 7) as f64 * 10.0).collect();

    let mut model = AirflowModel::new(test_profile());
    let stats = model.fit(&rpm, &load, &ve, Some(&weights));
    assert!(stats.r_squared > 0.99);
    assert_abs_diff_eq!(model.params().rpm_min_factor, 0.45, epsilon = 1e-3);
}

#[test]
fn test_params_stay_in_bounds() {
    // VE far above anything the model can produce
    let rpm = vec![1000.0, 2000.0, 3000.0, 4000.0, 5000.0];
    let load = vec![5.0, 5.0, 5.0, 5.0, 5.0];
    let ve = vec![300.0; 5];

    let mut model = AirflowModel::new(test_profile());
    model.fit(&rpm, &load, &ve, None);
    let p = model.params();
    assert!((0.1..=0.8).contains(&p.rpm_min_factor));
    assert!((0.0..=0.15).contains(&p.idle_flow));
    assert!((0.3..=3.0).contains(&p.load_exponent));
}

#[test]
fn test_insufficient_points_degrade() {
    let mut model = AirflowModel::new(test_profile());
    let stats = model.fit(&[3000.0, f64::NAN, 4000.0], &[20.0, 30.0, 40.0], &[50.0, 60.0, 70.0], None);

    assert_eq!(stats.n_points, 2);
    assert_eq!(stats.r_squared, 0.0);
    assert_eq!(model.params(), ShapeParams::default());
    assert!(!model.has_valid_fit());
    assert_eq!(model.fit_quality(), Some(FitQuality::Poor));
}

// ============================================
// Correction Ratio Tests
// ============================================

#[test]
fn test_ratio_fit_statistics() {
    let mut model = AirflowModel::new(test_profile());
    let stats = model.fit_correction_ratios(
        &[2000.0, 4000.0],
        &[30.0, 30.0],
        &[50.0, 50.0],
        &[55.0, 45.0],
        None,
    );

    assert_eq!(stats.n_points, 2);
    assert_abs_diff_eq!(stats.rmse, 10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(stats.max_error, 10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(stats.r_squared, 0.0, epsilon = 1e-9);
    assert_relative_eq!(model.corrections().global_average(), 1.0, epsilon = 1e-12);
    assert!(model.has_ratio_fit());
    assert!(!model.has_shape_fit());
}

#[test]
fn test_ratio_prediction() {
    let mut model = AirflowModel::new(test_profile());
    model.fit_correction_ratios(
        &[2000.0, 4000.0],
        &[30.0, 30.0],
        &[50.0, 50.0],
        &[55.0, 45.0],
        Some(&[3.0, 1.0]),
    );

    assert_relative_eq!(model.predict_correction_ratio(2000.0, 30.0), 1.1, epsilon = 1e-12);
    assert_relative_eq!(model.predict_corrected_ve(4000.0, 30.0, 80.0), 72.0, epsilon = 1e-9);
    // Far away: weighted global average (3 × 1.1 + 1 × 0.9) / 4
    assert_relative_eq!(model.predict_correction_ratio(20000.0, 30.0), 1.05, epsilon = 1e-9);
}
