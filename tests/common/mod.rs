//! Common test utilities shared across all test modules
//!
//! Fixture tables, engine profiles, synthetic sample sources and scratch
//! directories.

#![allow(dead_code)]

use std::path::PathBuf;

use vetune::engine::{CamProfile, EngineProfile, ValveConfig};
use vetune::table::{Axis, LoadType, VeTable};
use vetune::telemetry::{Channel, ChannelKind, CorrectionSamples, SampleSource};

pub const RPM_BREAKPOINTS: [f64; 6] = [1000.0, 2000.0, 3000.0, 4000.0, 5000.0, 6000.0];
pub const LOAD_BREAKPOINTS: [f64; 5] = [100.0, 75.0, 50.0, 25.0, 0.0];

pub fn rpm_axis() -> Axis {
    Axis::new(RPM_BREAKPOINTS.to_vec()).expect("valid rpm axis")
}

pub fn load_axis() -> Axis {
    Axis::new(LOAD_BREAKPOINTS.to_vec()).expect("valid load axis")
}

/// 5x6 TPS table with every cell at `ve`
pub fn flat_table(ve: f64) -> VeTable {
    VeTable::filled(rpm_axis(), load_axis(), LoadType::Tps, ve)
}

/// The three-by-three table used by the single-sample scenario
pub fn small_table(ve: f64) -> VeTable {
    VeTable::filled(
        Axis::new(vec![1000.0, 2000.0, 3000.0]).expect("valid rpm axis"),
        Axis::new(vec![100.0, 50.0, 0.0]).expect("valid load axis"),
        LoadType::Tps,
        ve,
    )
}

pub fn test_profile() -> EngineProfile {
    EngineProfile {
        name: "Test Engine".to_string(),
        displacement_cc: 1800.0,
        peak_torque_rpm: 4000.0,
        redline_rpm: 7000.0,
        valve_config: ValveConfig::FourValve,
        cam_profile: CamProfile::Stock,
        peak_ve_estimate: 100.0,
    }
}

/// Samples as `(rpm, load, target, measured)` tuples
pub fn samples(points: &[(f64, f64, f64, f64)]) -> CorrectionSamples {
    CorrectionSamples::new(
        points.iter().map(|p| p.0).collect(),
        points.iter().map(|p| p.1).collect(),
        points.iter().map(|p| p.2).collect(),
        points.iter().map(|p| p.3).collect(),
    )
    .expect("equal length series")
}

/// A log with the default channel names, Lambda tagged
pub fn lambda_source(name: &str, points: &[(f64, f64, f64, f64)]) -> SampleSource {
    source_with_kind(name, points, ChannelKind::Lambda)
}

pub fn source_with_kind(
    name: &str,
    points: &[(f64, f64, f64, f64)],
    mixture_kind: ChannelKind,
) -> SampleSource {
    SampleSource::new(
        name,
        vec![
            Channel::new(
                "Engine Speed",
                ChannelKind::EngineSpeed,
                points.iter().map(|p| p.0).collect(),
            ),
            Channel::new(
                "Throttle Position",
                ChannelKind::Percentage,
                points.iter().map(|p| p.1).collect(),
            ),
            Channel::new(
                "Target Lambda",
                mixture_kind,
                points.iter().map(|p| p.2).collect(),
            ),
            Channel::new("Lambda 1", mixture_kind, points.iter().map(|p| p.3).collect()),
        ],
    )
}

/// `count` identical samples at one operating point
pub fn repeated(point: (f64, f64, f64, f64), count: usize) -> Vec<(f64, f64, f64, f64)> {
    vec![point; count]
}

/// Fresh scratch directory under the system temp dir
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vetune_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}
