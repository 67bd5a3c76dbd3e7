//! Tuning settings persistence.
//!
//! Remembers the user's correction thresholds and preferences between runs.
//! None of these values are read by the correction core directly; callers
//! pass them into each pipeline call.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::analysis::pipeline::{CorrectionOptions, ExtrapolationMode};
use crate::telemetry::ChannelMapping;
use crate::units::FuelType;

/// Get the config directory path for vetune
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir().map(|p| p.join("vetune"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::config_dir().map(|p| p.join("vetune"))
    }
}

/// Tuning preferences that persist across sessions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TuningSettings {
    /// Settings file version for migration support
    #[serde(default = "default_version")]
    pub version: u32,
    /// Minimum samples a cell needs before its correction is trusted
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Apply corrections (false = bins-only coverage audit)
    #[serde(default = "default_true")]
    pub apply_corrections: bool,
    #[serde(default)]
    pub fuel: FuelType,
    #[serde(default)]
    pub extrapolation: ExtrapolationMode,
    #[serde(default)]
    pub channels: ChannelMapping,
    /// Engine profile used last
    #[serde(default)]
    pub engine_profile: Option<String>,
}

fn default_version() -> u32 {
    1
}

fn default_min_samples() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for TuningSettings {
    fn default() -> Self {
        Self {
            version: 1,
            min_samples: default_min_samples(),
            apply_corrections: true,
            fuel: FuelType::default(),
            extrapolation: ExtrapolationMode::default(),
            channels: ChannelMapping::default(),
            engine_profile: None,
        }
    }
}

impl TuningSettings {
    /// Get the path to the settings JSON file
    pub fn get_settings_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join("tuning_settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        match Self::get_settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable settings {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::get_settings_path()
            .ok_or_else(|| "Could not determine config directory".to_string())?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(path, content)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }

    /// Per-call options for the correction pipeline
    pub fn correction_options(&self) -> CorrectionOptions {
        CorrectionOptions {
            min_samples: self.min_samples.max(1),
            apply_corrections: self.apply_corrections,
        }
    }
}
