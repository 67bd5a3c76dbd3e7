//! Correction analysis: binning lambda error into the VE table, fitting the
//! airflow model and filling cells the logs never reached.
//!
//! Everything here is a pure computation over in-memory arrays. The flow is
//! one way:
//! - [`aggregate`] bins per-sample correction ratios into table cells
//! - [`airflow`] fits the alpha-N model (or stores measured ratios)
//! - [`idw`] interpolates measured ratios without a parametric model
//! - [`pipeline`] runs the above and fills under-measured cells

pub mod aggregate;
pub mod airflow;
pub mod idw;
pub mod optimize;
pub mod pipeline;
pub mod stats;

use thiserror::Error;

/// Errors that can occur during analysis
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A required channel is missing from the log data
    #[error("Missing required channel: {0}")]
    MissingChannel(String),

    /// Sample series of one batch have different lengths
    #[error("Channels have different lengths (rpm {rpm}, load {load}, target {target}, measured {measured})")]
    LengthMismatch {
        rpm: usize,
        load: usize,
        target: usize,
        measured: usize,
    },

    /// A grid does not match the table it belongs to
    #[error("Grid shape {got:?} does not match table shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// Extrapolation was requested before any successful fit
    #[error("No fitted model available; fit the model before filling cells")]
    ModelNotFitted,

    /// Invalid parameter configuration
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
