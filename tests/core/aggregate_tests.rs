//! Tests for binning samples into correction grids

use approx::{assert_abs_diff_eq, assert_relative_eq};
use vetune::analysis::aggregate::{BinnedSamples, CorrectionAggregator, CorrectionOptions};
use vetune::analysis::AnalysisError;
use vetune::table::Grid;
use vetune::telemetry::{ChannelKind, ChannelMapping, CorrectionSamples};
use vetune::units::{FuelType, MixtureScale};

use crate::common::{flat_table, samples, small_table, source_with_kind};

// ============================================
// Single Sample Scenario
// ============================================

#[test]
fn test_one_sample_one_cell() {
    let table = small_table(90.0);
    let agg = CorrectionAggregator::for_table(&table, FuelType::Gasoline);
    let (grids, _) = agg
        .run(
            &[samples(&[(1500.0, 75.0, 1.00, 1.05)])],
            table.values(),
            CorrectionOptions::new(1),
        )
        .unwrap();

    assert_eq!(grids.hit_count[(0, 0)], 1);
    assert_relative_eq!(grids.correction_ratio[(0, 0)], 1.05, epsilon = 1e-12);
    assert_relative_eq!(grids.corrected[(0, 0)], 94.5, epsilon = 1e-9);
    assert_abs_diff_eq!(grids.error[(0, 0)], 5.0, epsilon = 1e-9);

    // Everything else untouched
    for ((r, c), &hits) in grids.hit_count.cells() {
        if (r, c) != (0, 0) {
            assert_eq!(hits, 0);
            assert_eq!(grids.correction_ratio[(r, c)], 1.0);
            assert_eq!(grids.corrected[(r, c)], 90.0);
            assert!(grids.error[(r, c)].is_nan());
        }
    }
}

// ============================================
// Unit Handling Tests
// ============================================

#[test]
fn test_on_target_is_unit_ratio_in_any_scale() {
    let table = flat_table(80.0);
    for fuel in [FuelType::Gasoline, FuelType::E85, FuelType::Methanol] {
        let agg = CorrectionAggregator::for_table(&table, fuel);
        let stoich = fuel.stoich_afr();
        let batches = [
            samples(&[(2500.0, 60.0, stoich, stoich), (3500.0, 30.0, stoich * 0.9, stoich * 0.9)]),
            samples(&[(2500.0, 60.0, 1.0, 1.0), (3500.0, 30.0, 0.85, 0.85)]),
        ];
        let (binned, reports) = agg.bin_all(&batches).unwrap();

        assert_eq!(reports[0].scale, MixtureScale::Afr);
        assert_eq!(reports[1].scale, MixtureScale::Lambda);
        for ratios in binned.values() {
            for &ratio in ratios {
                assert_relative_eq!(ratio, 1.0, epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn test_e85_afr_batch() {
    let table = flat_table(80.0);
    let agg = CorrectionAggregator::for_table(&table, FuelType::E85);
    // Measured 5% lean of target, in E85 AFR
    let batch = samples(&[(2500.0, 60.0, 9.765, 9.765 * 1.05)]);
    let mut binned = BinnedSamples::new();
    agg.bin_batch(&batch, &mut binned).unwrap();

    let ratios: Vec<f64> = binned.values().flatten().copied().collect();
    assert_eq!(ratios.len(), 1);
    assert_relative_eq!(ratios[0], 1.05, epsilon = 1e-12);
}

#[test]
fn test_channel_tags_override_heuristic() {
    let table = flat_table(80.0);
    let agg = CorrectionAggregator::for_table(&table, FuelType::Gasoline);
    let mapping = ChannelMapping::default();

    // Values look like Lambda, but both channels are tagged AFR: 1.0 AFR is
    // far outside the plausible window after conversion
    let tagged = source_with_kind("tagged", &[(2500.0, 60.0, 1.0, 1.0)], ChannelKind::Afr)
        .correction_samples(&mapping)
        .unwrap();
    let mut binned = BinnedSamples::new();
    let report = agg.bin_batch(&tagged, &mut binned).unwrap();
    assert_eq!(report.scale, MixtureScale::Afr);
    assert_eq!(report.skipped_range, 1);

    let untagged = source_with_kind("raw", &[(2500.0, 60.0, 1.0, 1.0)], ChannelKind::Raw)
        .correction_samples(&mapping)
        .unwrap();
    let report = agg.bin_batch(&untagged, &mut binned).unwrap();
    assert_eq!(report.scale, MixtureScale::Lambda);
    assert_eq!(report.binned, 1);
}

// ============================================
// Aggregation Tests
// ============================================

#[test]
fn test_cell_mean_and_hit_count() {
    let table = flat_table(50.0);
    let agg = CorrectionAggregator::for_table(&table, FuelType::Gasoline);
    let batch = samples(&[
        (4200.0, 80.0, 1.0, 1.10),
        (4900.0, 99.0, 1.0, 1.00),
        (4000.0, 76.0, 1.0, 0.96),
    ]);
    let (grids, reports) = agg
        .run(&[batch], table.values(), CorrectionOptions::new(3))
        .unwrap();

    // Load 80 on [100, 75, 50, 25, 0] is bin 0, rpm 4000-4999 is bin 3
    assert_eq!(grids.hit_count[(0, 3)], 3);
    assert_relative_eq!(grids.correction_ratio[(0, 3)], 1.02, epsilon = 1e-12);
    assert_relative_eq!(grids.corrected[(0, 3)], 51.0, epsilon = 1e-9);
    assert_abs_diff_eq!(grids.error[(0, 3)], 2.0, epsilon = 1e-9);
    assert_eq!(reports[0].binned, 3);
}

#[test]
fn test_corrected_equals_base_times_ratio() {
    let table = flat_table(72.5);
    let agg = CorrectionAggregator::for_table(&table, FuelType::Gasoline);
    let points: Vec<(f64, f64, f64, f64)> = (0..300)
        .map(|i| {
            let rpm = 800.0 + (i * 37 % 5600) as f64;
            let load = (i * 13 % 101) as f64;
            let measured = 0.9 + (i % 20) as f64 * 0.01;
            (rpm, load, 1.0, measured)
        })
        .collect();
    let (grids, _) = agg
        .run(&[samples(&points)], table.values(), CorrectionOptions::new(2))
        .unwrap();

    for ((r, c), &ratio) in grids.correction_ratio.cells() {
        assert_relative_eq!(grids.corrected[(r, c)], table.values()[(r, c)] * ratio);
    }
    let total: u32 = grids.hit_count.as_slice().iter().sum();
    assert_eq!(total, 300);
}

#[test]
fn test_length_mismatch_is_error() {
    let table = flat_table(50.0);
    let agg = CorrectionAggregator::for_table(&table, FuelType::Gasoline);
    let batch = CorrectionSamples {
        rpm: vec![1000.0, 2000.0],
        load: vec![50.0],
        target: vec![1.0, 1.0],
        measured: vec![1.0, 1.0],
        scale_hint: None,
    };
    let err = agg.bin_batch(&batch, &mut BinnedSamples::new()).unwrap_err();
    assert!(matches!(err, AnalysisError::LengthMismatch { rpm: 2, load: 1, .. }));
}

#[test]
fn test_base_shape_checked() {
    let table = flat_table(50.0);
    let agg = CorrectionAggregator::for_table(&table, FuelType::Gasoline);
    let err = agg
        .run(&[], &Grid::new(1, 1, 50.0), CorrectionOptions::new(1))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::ShapeMismatch { .. }));
}
