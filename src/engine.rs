//! Engine profiles for the airflow model.
//!
//! A profile describes the physical engine (displacement, torque peak,
//! redline, head and cam class, expected peak VE). Profiles are kept in a
//! JSON object keyed by profile name in the user's config directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Profile store file name inside the config directory
const PROFILES_FILE: &str = "engine_configs.json";

/// Errors that can occur while validating or persisting profiles
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Invalid engine profile: {0}")]
    Invalid(String),

    #[error("Config directory not available")]
    NoConfigDir,

    #[error("Failed to access profile store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize profiles: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Valves per cylinder
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Display, EnumIter, EnumString, PartialEq, Eq, Serialize, Deserialize,
)]
pub enum ValveConfig {
    #[strum(serialize = "2V")]
    #[serde(rename = "2V")]
    TwoValve,
    #[default]
    #[strum(serialize = "4V")]
    #[serde(rename = "4V")]
    FourValve,
}

impl ValveConfig {
    /// Typical peak VE for the head design, used to prefill new profiles
    pub fn default_peak_ve(&self) -> f64 {
        match self {
            ValveConfig::TwoValve => 88.0,
            ValveConfig::FourValve => 98.0,
        }
    }
}

/// Camshaft aggressiveness class
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Display, EnumIter, EnumString, PartialEq, Eq, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CamProfile {
    #[default]
    Stock,
    Mild,
    Aggressive,
}

impl CamProfile {
    /// Fraction of peak VE left at redline. Hotter cams hold VE higher up.
    pub fn redline_factor(&self) -> f64 {
        match self {
            CamProfile::Stock => 0.80,
            CamProfile::Mild => 0.85,
            CamProfile::Aggressive => 0.90,
        }
    }
}

/// Physical engine description consumed by the airflow model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineProfile {
    pub name: String,
    pub displacement_cc: f64,
    pub peak_torque_rpm: f64,
    pub redline_rpm: f64,
    pub valve_config: ValveConfig,
    pub cam_profile: CamProfile,
    /// Expected VE% at the torque peak, wide open throttle
    pub peak_ve_estimate: f64,
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self {
            name: "New Engine".to_string(),
            displacement_cc: 2000.0,
            peak_torque_rpm: 4500.0,
            redline_rpm: 7000.0,
            valve_config: ValveConfig::FourValve,
            cam_profile: CamProfile::Stock,
            peak_ve_estimate: 95.0,
        }
    }
}

impl EngineProfile {
    /// Check the values the model divides by or anchors to
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::Invalid("name is empty".to_string()));
        }
        if !(self.peak_torque_rpm > 0.0) {
            return Err(ProfileError::Invalid(
                "peak torque RPM must be positive".to_string(),
            ));
        }
        if !(self.redline_rpm > self.peak_torque_rpm) {
            return Err(ProfileError::Invalid(
                "redline must be above the torque peak".to_string(),
            ));
        }
        if !(self.peak_ve_estimate > 0.0) {
            return Err(ProfileError::Invalid(
                "peak VE estimate must be positive".to_string(),
            ));
        }
        if !(self.displacement_cc > 0.0) {
            return Err(ProfileError::Invalid(
                "displacement must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Profile Store
// ============================================================================

/// Named engine profiles persisted as one JSON object
#[derive(Clone, Debug)]
pub struct EngineProfileStore {
    path: PathBuf,
}

impl EngineProfileStore {
    /// Store backed by an explicit file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the default config directory
    pub fn open_default() -> Result<Self, ProfileError> {
        crate::settings::config_dir()
            .map(|dir| Self::at(dir.join(PROFILES_FILE)))
            .ok_or(ProfileError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every profile. A missing or unreadable file yields an empty set;
    /// individual entries that fail to parse are skipped.
    pub fn load_all(&self) -> BTreeMap<String, EngineProfile> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };

        let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Failed to parse engine profiles {:?}: {}", self.path, e);
                return BTreeMap::new();
            }
        };

        raw.into_iter()
            .filter_map(|(name, value)| match serde_json::from_value(value) {
                Ok(profile) => Some((name, profile)),
                Err(e) => {
                    tracing::warn!("Skipping invalid engine profile '{}': {}", name, e);
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<EngineProfile> {
        self.load_all().remove(name)
    }

    /// Sorted profile names
    pub fn names(&self) -> Vec<String> {
        self.load_all().into_keys().collect()
    }

    /// Save or replace a profile under its own name
    pub fn save(&self, profile: &EngineProfile) -> Result<(), ProfileError> {
        profile.validate()?;
        let mut profiles = self.load_all();
        profiles.insert(profile.name.clone(), profile.clone());
        self.write(&profiles)?;
        tracing::info!("Saved engine profile '{}'", profile.name);
        Ok(())
    }

    /// Delete a profile. Returns false when no profile had that name.
    pub fn delete(&self, name: &str) -> Result<bool, ProfileError> {
        let mut profiles = self.load_all();
        if profiles.remove(name).is_none() {
            return Ok(false);
        }
        self.write(&profiles)?;
        tracing::info!("Deleted engine profile '{}'", name);
        Ok(true)
    }

    fn write(&self, profiles: &BTreeMap<String, EngineProfile>) -> Result<(), ProfileError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(profiles)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
