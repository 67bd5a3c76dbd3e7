//! Correction run orchestration.
//!
//! [`CorrectionPipeline`] bins every active sample source over a base table,
//! summarises the result, feeds the measured cells to a fit and fills the
//! cells the logs never reached with the chosen [`Extrapolator`].

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::aggregate::{BatchReport, CorrectionAggregator, CorrectionGrids};
use super::airflow::AirflowModel;
use super::idw::{ReferencePoint, ScatteredCorrectionInterpolator};
use super::stats::{mean, FitStatistics};
use super::AnalysisError;
use crate::table::VeTable;
use crate::telemetry::{ChannelMapping, CorrectionSamples, SampleSource};
use crate::units::FuelType;

pub use super::aggregate::CorrectionOptions;

/// How under-measured cells are filled
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
pub enum ExtrapolationMode {
    /// Alpha-N shape fit, predicts VE directly
    #[strum(serialize = "shape")]
    #[serde(rename = "shape")]
    ShapeModel,
    /// Interpolated measured ratios held by the airflow model
    #[default]
    #[strum(serialize = "ratio")]
    #[serde(rename = "ratio")]
    CorrectionRatio,
    /// Standalone IDW over measured ratios
    #[strum(serialize = "idw")]
    #[serde(rename = "idw")]
    Scattered,
}

/// Result of one extrapolation query
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CellPrediction {
    /// Absolute VE%
    Ve(f64),
    /// Multiplier on the base VE
    Ratio(f64),
}

impl CellPrediction {
    /// Correction ratio relative to `base` (1.0 when a VE prediction meets a
    /// non-positive base)
    pub fn ratio_over(&self, base: f64) -> f64 {
        match *self {
            CellPrediction::Ratio(r) => r,
            CellPrediction::Ve(ve) if base > 0.0 => ve / base,
            CellPrediction::Ve(_) => 1.0,
        }
    }
}

/// Extrapolation strategy used to fill cells
#[derive(Clone, Copy, Debug)]
pub enum Extrapolator<'a> {
    ShapeModel(&'a AirflowModel),
    CorrectionRatio(&'a AirflowModel),
    Scattered(&'a ScatteredCorrectionInterpolator),
}

impl<'a> Extrapolator<'a> {
    /// Pick the strategy for `mode`
    pub fn select(
        mode: ExtrapolationMode,
        model: &'a AirflowModel,
        scattered: &'a ScatteredCorrectionInterpolator,
    ) -> Self {
        match mode {
            ExtrapolationMode::ShapeModel => Extrapolator::ShapeModel(model),
            ExtrapolationMode::CorrectionRatio => Extrapolator::CorrectionRatio(model),
            ExtrapolationMode::Scattered => Extrapolator::Scattered(scattered),
        }
    }

    pub fn mode(&self) -> ExtrapolationMode {
        match self {
            Extrapolator::ShapeModel(_) => ExtrapolationMode::ShapeModel,
            Extrapolator::CorrectionRatio(_) => ExtrapolationMode::CorrectionRatio,
            Extrapolator::Scattered(_) => ExtrapolationMode::Scattered,
        }
    }

    /// Whether the strategy has something fitted to predict from
    pub fn is_ready(&self) -> bool {
        match self {
            Extrapolator::ShapeModel(model) => model.has_shape_fit(),
            Extrapolator::CorrectionRatio(model) => model.has_ratio_fit(),
            Extrapolator::Scattered(idw) => !idw.is_empty(),
        }
    }

    pub fn predict(&self, rpm: f64, load: f64) -> CellPrediction {
        match self {
            Extrapolator::ShapeModel(model) => CellPrediction::Ve(model.predict(rpm, load)),
            Extrapolator::CorrectionRatio(model) => {
                CellPrediction::Ratio(model.predict_correction_ratio(rpm, load))
            }
            Extrapolator::Scattered(idw) => CellPrediction::Ratio(idw.predict(rpm, load)),
        }
    }
}

/// Headline numbers of a correction run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrectionSummary {
    /// Sum of all hit counts
    pub total_samples: u64,
    pub cells_with_data: usize,
    pub total_cells: usize,
    /// `cells_with_data / total_cells`
    pub coverage: f64,
    /// Largest |error| over cells with an error value
    pub max_abs_error: Option<f64>,
    /// Mean correction ratio over cells meeting the threshold
    pub mean_correction: Option<f64>,
}

impl CorrectionSummary {
    pub fn from_grids(grids: &CorrectionGrids, min_samples: usize) -> Self {
        let total_samples: u64 = grids.hit_count.as_slice().iter().map(|&h| h as u64).sum();
        let cells_with_data = grids.hit_count.as_slice().iter().filter(|&&h| h > 0).count();
        let total_cells = grids.hit_count.len();

        let max_abs_error = grids
            .error
            .as_slice()
            .iter()
            .filter(|e| !e.is_nan())
            .map(|e| e.abs())
            .reduce(f64::max);

        let measured: Vec<f64> = grids
            .correction_ratio
            .cells()
            .filter(|((r, c), _)| grids.is_measured(*r, *c, min_samples))
            .map(|(_, &ratio)| ratio)
            .collect();

        Self {
            total_samples,
            cells_with_data,
            total_cells,
            coverage: if total_cells > 0 {
                cells_with_data as f64 / total_cells as f64
            } else {
                0.0
            },
            max_abs_error,
            mean_correction: mean(&measured),
        }
    }
}

/// Grids, summary and per-batch reports of one calculate call
#[derive(Clone, Debug)]
pub struct CorrectionRun {
    pub grids: CorrectionGrids,
    pub summary: CorrectionSummary,
    pub batches: Vec<BatchReport>,
}

/// Measured cells, ready to feed a fit
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitInputs {
    pub rpm: Vec<f64>,
    pub load: Vec<f64>,
    pub base: Vec<f64>,
    pub corrected: Vec<f64>,
    /// Hit counts
    pub weights: Vec<f64>,
}

impl FitInputs {
    pub fn len(&self) -> usize {
        self.rpm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rpm.is_empty()
    }
}

/// Runs corrections against one base table
#[derive(Clone, Copy, Debug)]
pub struct CorrectionPipeline<'a> {
    table: &'a VeTable,
    fuel: FuelType,
}

impl<'a> CorrectionPipeline<'a> {
    pub fn new(table: &'a VeTable, fuel: FuelType) -> Self {
        Self { table, fuel }
    }

    pub fn table(&self) -> &VeTable {
        self.table
    }

    pub fn aggregator(&self) -> CorrectionAggregator<'a> {
        CorrectionAggregator::for_table(self.table, self.fuel)
    }

    /// Bin all batches and aggregate them over the base table
    pub fn calculate(
        &self,
        batches: &[CorrectionSamples],
        options: CorrectionOptions,
    ) -> Result<CorrectionRun, AnalysisError> {
        let (grids, reports) = self
            .aggregator()
            .run(batches, self.table.values(), options)?;
        let summary = CorrectionSummary::from_grids(&grids, options.min_samples);

        tracing::info!(
            "Corrections calculated: {} samples, {}/{} cells with data",
            summary.total_samples,
            summary.cells_with_data,
            summary.total_cells
        );

        Ok(CorrectionRun {
            grids,
            summary,
            batches: reports,
        })
    }

    /// Calculate over every active source. Sources missing a mapped channel
    /// are skipped; if none is usable the first error is returned.
    pub fn calculate_sources(
        &self,
        sources: &[SampleSource],
        mapping: &ChannelMapping,
        options: CorrectionOptions,
    ) -> Result<CorrectionRun, AnalysisError> {
        let mut batches = Vec::new();
        let mut first_error = None;

        for source in sources.iter().filter(|s| s.active) {
            match source.correction_samples(mapping) {
                Ok(batch) => batches.push(batch),
                Err(e) => {
                    tracing::warn!("Skipping log '{}': {}", source.name, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if batches.is_empty() {
            return Err(first_error.unwrap_or_else(|| {
                AnalysisError::InvalidParameter("no active sample sources".to_string())
            }));
        }

        self.calculate(&batches, options)
    }

    /// Breakpoint coordinates, base and corrected VE and hit counts of every
    /// cell meeting the threshold
    pub fn fit_inputs(&self, grids: &CorrectionGrids, min_samples: usize) -> FitInputs {
        let mut inputs = FitInputs::default();

        for ((row, col), &hits) in grids.hit_count.cells() {
            if !grids.is_measured(row, col, min_samples) {
                continue;
            }
            let (Some((rpm, load)), Some(base)) =
                (self.table.cell_coordinates(row, col), self.table.get(row, col))
            else {
                continue;
            };

            inputs.rpm.push(rpm);
            inputs.load.push(load);
            inputs.base.push(base);
            inputs.corrected.push(grids.corrected[(row, col)]);
            inputs.weights.push(hits as f64);
        }

        inputs
    }

    /// Fit the airflow shape to the measured corrected VE
    pub fn fit_shape(
        &self,
        model: &mut AirflowModel,
        grids: &CorrectionGrids,
        min_samples: usize,
    ) -> FitStatistics {
        let inputs = self.fit_inputs(grids, min_samples);
        model.fit(&inputs.rpm, &inputs.load, &inputs.corrected, Some(&inputs.weights))
    }

    /// Store the measured correction ratios on the model
    pub fn fit_ratios(
        &self,
        model: &mut AirflowModel,
        grids: &CorrectionGrids,
        min_samples: usize,
    ) -> FitStatistics {
        let inputs = self.fit_inputs(grids, min_samples);
        model.fit_correction_ratios(
            &inputs.rpm,
            &inputs.load,
            &inputs.base,
            &inputs.corrected,
            Some(&inputs.weights),
        )
    }

    /// IDW interpolator over the measured cells' ratios, weighted by hits
    pub fn scattered_interpolator(
        &self,
        grids: &CorrectionGrids,
        min_samples: usize,
    ) -> ScatteredCorrectionInterpolator {
        let inputs = self.fit_inputs(grids, min_samples);
        let points = (0..inputs.len())
            .map(|i| {
                let ratio = if inputs.base[i] > 0.0 {
                    inputs.corrected[i] / inputs.base[i]
                } else {
                    1.0
                };
                ReferencePoint::new(inputs.rpm[i], inputs.load[i], ratio)
                    .with_weight(inputs.weights[i])
            })
            .collect();
        ScatteredCorrectionInterpolator::new(points)
    }

    /// Fill every cell below `min_samples` from `extrapolator`.
    ///
    /// Filled cells get the predicted ratio, `corrected = base × ratio` and
    /// the extrapolated flag. Returns the number of cells filled. Grids are
    /// untouched when the strategy has nothing fitted.
    pub fn fill_empty_cells(
        &self,
        grids: &mut CorrectionGrids,
        min_samples: usize,
        extrapolator: &Extrapolator,
    ) -> Result<usize, AnalysisError> {
        if !extrapolator.is_ready() {
            return Err(AnalysisError::ModelNotFitted);
        }
        if grids.shape() != self.table.shape() {
            return Err(AnalysisError::ShapeMismatch {
                expected: self.table.shape(),
                got: grids.shape(),
            });
        }

        let (rows, cols) = grids.shape();
        let mut filled = 0;

        for row in 0..rows {
            for col in 0..cols {
                if grids.is_measured(row, col, min_samples) {
                    continue;
                }
                let (Some((rpm, load)), Some(base)) =
                    (self.table.cell_coordinates(row, col), self.table.get(row, col))
                else {
                    continue;
                };

                let ratio = extrapolator.predict(rpm, load).ratio_over(base);
                grids.correction_ratio[(row, col)] = ratio;
                grids.corrected[(row, col)] = base * ratio;
                grids.extrapolated[(row, col)] = true;
                filled += 1;
            }
        }

        tracing::info!(
            "Filled {} cells using {} extrapolation",
            filled,
            extrapolator.mode()
        );

        Ok(filled)
    }
}
