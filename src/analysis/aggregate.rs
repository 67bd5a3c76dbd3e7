//! Binning of per-sample mixture error into VE table cells.
//!
//! Each sample yields a correction ratio `measured / target` (both in
//! Lambda). Ratios are collected per `(row, col)` cell and averaged once
//! every batch has been binned.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

use super::stats::mean;
use super::AnalysisError;
use crate::binning::find_bin_index;
use crate::table::{Axis, Grid, VeTable};
use crate::telemetry::CorrectionSamples;
use crate::units::{detect_mixture_scale, is_plausible_lambda, FuelType, MixtureScale};

/// Per-cell correction ratios, keyed by `(row, col)` = `(load bin, rpm bin)`
pub type BinnedSamples = HashMap<(usize, usize), Vec<f64>>;

/// Thresholds for one correction run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CorrectionOptions {
    /// Samples a cell needs before its mean ratio is used
    pub min_samples: usize,
    /// false = bins-only: hit counts and errors, but no change to VE
    pub apply_corrections: bool,
}

impl CorrectionOptions {
    pub fn new(min_samples: usize) -> Self {
        Self {
            min_samples,
            apply_corrections: true,
        }
    }

    pub fn bins_only(mut self) -> Self {
        self.apply_corrections = false;
        self
    }
}

/// What happened to the samples of one batch
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport {
    pub samples: usize,
    pub binned: usize,
    /// Samples with a NaN in any of the four channels
    pub skipped_nan: usize,
    /// Samples whose Lambda fell outside the plausible window
    pub skipped_range: usize,
    pub scale: MixtureScale,
}

/// Shape-aligned per-cell result maps of a correction run
#[derive(Clone, Debug, PartialEq)]
pub struct CorrectionGrids {
    /// Every binned sample, regardless of the threshold
    pub hit_count: Grid<u32>,
    /// Mean error in percent, NaN where the threshold was not met
    pub error: Grid<f64>,
    pub correction_ratio: Grid<f64>,
    /// Always `base × correction_ratio`
    pub corrected: Grid<f64>,
    /// Cells whose ratio came from extrapolation
    pub extrapolated: Grid<bool>,
}

impl CorrectionGrids {
    /// Grids for a table nothing has been measured on yet
    pub fn unmeasured(base: &Grid<f64>) -> Self {
        let (rows, cols) = base.shape();
        Self {
            hit_count: Grid::new(rows, cols, 0),
            error: Grid::new(rows, cols, f64::NAN),
            correction_ratio: Grid::new(rows, cols, 1.0),
            corrected: base.clone(),
            extrapolated: Grid::new(rows, cols, false),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.corrected.shape()
    }

    /// Hit count of a cell (0 outside the grid)
    pub fn hits(&self, row: usize, col: usize) -> u32 {
        self.hit_count.get(row, col).copied().unwrap_or(0)
    }

    /// Whether the cell has enough samples to keep its measured ratio
    pub fn is_measured(&self, row: usize, col: usize, min_samples: usize) -> bool {
        self.hits(row, col) as usize >= min_samples.max(1)
    }
}

enum Classified {
    Binned { cell: (usize, usize), ratio: f64 },
    Nan,
    OutOfRange,
}

/// Bins sample batches onto a table's axes
#[derive(Clone, Copy, Debug)]
pub struct CorrectionAggregator<'a> {
    rpm_axis: &'a Axis,
    load_axis: &'a Axis,
    fuel: FuelType,
}

impl<'a> CorrectionAggregator<'a> {
    pub fn new(rpm_axis: &'a Axis, load_axis: &'a Axis, fuel: FuelType) -> Self {
        Self {
            rpm_axis,
            load_axis,
            fuel,
        }
    }

    pub fn for_table(table: &'a VeTable, fuel: FuelType) -> Self {
        Self::new(table.rpm_axis(), table.load_axis(), fuel)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.load_axis.len(), self.rpm_axis.len())
    }

    fn to_lambda(&self, value: f64, scale: MixtureScale) -> f64 {
        match scale {
            MixtureScale::Afr => self.fuel.afr_to_lambda(value),
            MixtureScale::Lambda => value,
        }
    }

    fn classify(
        &self,
        rpm: f64,
        load: f64,
        target: f64,
        measured: f64,
        scale: MixtureScale,
    ) -> Classified {
        if rpm.is_nan() || load.is_nan() || target.is_nan() || measured.is_nan() {
            return Classified::Nan;
        }

        let target = self.to_lambda(target, scale);
        let measured = self.to_lambda(measured, scale);
        if !is_plausible_lambda(target) || !is_plausible_lambda(measured) {
            return Classified::OutOfRange;
        }

        let row = find_bin_index(load, self.load_axis.values());
        let col = find_bin_index(rpm, self.rpm_axis.values());
        Classified::Binned {
            cell: (row, col),
            ratio: measured / target,
        }
    }

    /// Bin one batch into `binned`.
    ///
    /// The mixture scale is detected per batch: the channel tags decide when
    /// present, otherwise the median heuristic.
    pub fn bin_batch(
        &self,
        batch: &CorrectionSamples,
        binned: &mut BinnedSamples,
    ) -> Result<BatchReport, AnalysisError> {
        let n = batch.rpm.len();
        if batch.load.len() != n || batch.target.len() != n || batch.measured.len() != n {
            return Err(AnalysisError::LengthMismatch {
                rpm: n,
                load: batch.load.len(),
                target: batch.target.len(),
                measured: batch.measured.len(),
            });
        }

        let scale = batch
            .scale_hint
            .unwrap_or_else(|| detect_mixture_scale(&batch.target, &batch.measured));

        let classified: Vec<Classified> = (0..n)
            .into_par_iter()
            .map(|i| {
                self.classify(
                    batch.rpm[i],
                    batch.load[i],
                    batch.target[i],
                    batch.measured[i],
                    scale,
                )
            })
            .collect();

        let mut report = BatchReport {
            samples: n,
            binned: 0,
            skipped_nan: 0,
            skipped_range: 0,
            scale,
        };

        // Sequential merge keeps per-cell ratio order equal to sample order
        for c in classified {
            match c {
                Classified::Binned { cell, ratio } => {
                    binned.entry(cell).or_default().push(ratio);
                    report.binned += 1;
                }
                Classified::Nan => report.skipped_nan += 1,
                Classified::OutOfRange => report.skipped_range += 1,
            }
        }

        tracing::debug!(
            "Binned {}/{} samples ({:?}), skipped {} NaN, {} out of range",
            report.binned,
            report.samples,
            report.scale,
            report.skipped_nan,
            report.skipped_range
        );

        Ok(report)
    }

    /// Bin several batches into one set
    pub fn bin_all(
        &self,
        batches: &[CorrectionSamples],
    ) -> Result<(BinnedSamples, Vec<BatchReport>), AnalysisError> {
        let mut binned = BinnedSamples::new();
        let reports = batches
            .iter()
            .map(|batch| self.bin_batch(batch, &mut binned))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((binned, reports))
    }

    /// Turn binned ratios into correction grids over `base`
    pub fn aggregate(
        &self,
        binned: &BinnedSamples,
        base: &Grid<f64>,
        options: CorrectionOptions,
    ) -> Result<CorrectionGrids, AnalysisError> {
        if base.shape() != self.shape() {
            return Err(AnalysisError::ShapeMismatch {
                expected: self.shape(),
                got: base.shape(),
            });
        }

        let min_samples = options.min_samples.max(1);
        let mut grids = CorrectionGrids::unmeasured(base);

        for (&(row, col), ratios) in binned {
            let Some(hits) = grids.hit_count.get_mut(row, col) else {
                continue;
            };
            *hits = u32::try_from(ratios.len()).unwrap_or(u32::MAX);

            if ratios.len() < min_samples {
                continue;
            }
            let Some(mean_ratio) = mean(ratios) else {
                continue;
            };

            grids.error[(row, col)] = (mean_ratio - 1.0) * 100.0;
            if options.apply_corrections {
                grids.correction_ratio[(row, col)] = mean_ratio;
                grids.corrected[(row, col)] = base[(row, col)] * mean_ratio;
            }
        }

        Ok(grids)
    }

    /// Bin all batches and aggregate them over `base`
    pub fn run(
        &self,
        batches: &[CorrectionSamples],
        base: &Grid<f64>,
        options: CorrectionOptions,
    ) -> Result<(CorrectionGrids, Vec<BatchReport>), AnalysisError> {
        let (binned, reports) = self.bin_all(batches)?;
        let grids = self.aggregate(&binned, base, options)?;
        Ok((grids, reports))
    }
}
