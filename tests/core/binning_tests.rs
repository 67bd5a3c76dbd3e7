//! Tests for axis binning and bin interpolation

use approx::assert_relative_eq;
use vetune::binning::{find_bin_index, interpolate_bin, is_descending};

// ============================================
// Ascending Axis Tests
// ============================================

#[test]
fn test_ascending_bins() {
    let axis = [0.0, 250.0, 500.0];
    assert_eq!(find_bin_index(125.0, &axis), 0);
    assert_eq!(find_bin_index(375.0, &axis), 1);
    assert_eq!(find_bin_index(250.0, &axis), 1);
}

#[test]
fn test_ascending_clamps_to_edges() {
    let axis = [0.0, 250.0, 500.0];
    assert_eq!(find_bin_index(-10.0, &axis), 0);
    assert_eq!(find_bin_index(0.0, &axis), 0);
    assert_eq!(find_bin_index(500.0, &axis), 2);
    assert_eq!(find_bin_index(9000.0, &axis), 2);
}

#[test]
fn test_every_value_maps_inside_axis() {
    let axis = [500.0, 1000.0, 2000.0, 4000.0, 8000.0];
    for i in 0..200 {
        let value = i as f64 * 50.0;
        assert!(find_bin_index(value, &axis) < axis.len());
    }
}

// ============================================
// Descending Axis Tests
// ============================================

#[test]
fn test_descending_bins() {
    let axis = [100.0, 90.0, 80.0];
    assert!(is_descending(&axis));
    assert_eq!(find_bin_index(95.0, &axis), 0);
    assert_eq!(find_bin_index(85.0, &axis), 1);
    // A breakpoint belongs to the bin it closes from below
    assert_eq!(find_bin_index(90.0, &axis), 1);
    assert_eq!(find_bin_index(90.0001, &axis), 0);
}

#[test]
fn test_descending_clamps_to_edges() {
    let axis = [100.0, 90.0, 80.0];
    assert_eq!(find_bin_index(120.0, &axis), 0);
    assert_eq!(find_bin_index(100.0, &axis), 0);
    assert_eq!(find_bin_index(80.0, &axis), 2);
    assert_eq!(find_bin_index(10.0, &axis), 2);
}

#[test]
fn test_degenerate_axes() {
    assert_eq!(find_bin_index(42.0, &[]), 0);
    assert_eq!(find_bin_index(42.0, &[10.0]), 0);
    assert!(!is_descending(&[]));
}

// ============================================
// Interpolation Tests
// ============================================

#[test]
fn test_interpolate_ascending() {
    let pos = interpolate_bin(1500.0, &[1000.0, 2000.0, 3000.0]);
    assert_eq!((pos.lower, pos.upper), (0, 1));
    assert_relative_eq!(pos.factor, 0.5);

    let pos = interpolate_bin(2750.0, &[1000.0, 2000.0, 3000.0]);
    assert_eq!((pos.lower, pos.upper), (1, 2));
    assert_relative_eq!(pos.factor, 0.75);
}

#[test]
fn test_interpolate_descending() {
    let pos = interpolate_bin(60.0, &[100.0, 50.0, 0.0]);
    assert_eq!((pos.lower, pos.upper), (0, 1));
    assert_relative_eq!(pos.factor, 0.8);
}

#[test]
fn test_interpolate_outside_range() {
    let axis = [1000.0, 2000.0, 3000.0];
    let below = interpolate_bin(500.0, &axis);
    assert_eq!((below.lower, below.upper, below.factor), (0, 0, 0.0));

    let above = interpolate_bin(3500.0, &axis);
    assert_eq!((above.lower, above.upper, above.factor), (2, 2, 0.0));
}
