//! vetune - VE table correction from ECU lambda logs
//!
//! This library bins measured-vs-target mixture error from engine logs into
//! a volumetric efficiency (VE) map, and fills the cells the logs never
//! reached from an alpha-N airflow model or from interpolated corrections.
//!
//! ## Module Structure
//!
//! - [`binning`] - Axis bin lookup and linear bin interpolation
//! - [`table`] - Axes, grids, the VE table and its text format
//! - [`units`] - Fuel types, stoichiometric ratios and AFR/Lambda detection
//! - [`telemetry`] - Named channel arrays handed over by log parsers
//! - [`analysis`] - Correction aggregation, model fitting and cell filling
//!   - `aggregate` - Per-cell correction ratios and hit counts
//!   - `airflow` - Alpha-N VE model and its bounded fit
//!   - `idw` - Inverse-distance interpolation of measured ratios
//!   - `pipeline` - Calculate / fit / fill orchestration
//! - [`engine`] - Engine profiles and the profile store
//! - [`settings`] - Tuning settings persistence

pub mod analysis;
pub mod binning;
pub mod engine;
pub mod settings;
pub mod table;
pub mod telemetry;
pub mod units;
