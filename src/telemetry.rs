//! In-memory telemetry handed over by the log parsers.
//!
//! A [`SampleSource`] is one loaded log: named channels of equal length, each
//! tagged with the physical type the parser reported for it. The correction
//! pipeline only needs four of them, picked through a [`ChannelMapping`].

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::analysis::AnalysisError;
use crate::units::MixtureScale;

/// Physical type reported for a channel
#[derive(AsRefStr, Clone, Copy, Debug, Default, EnumString, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    EngineSpeed,
    Percentage,
    Pressure,
    AbsPressure,
    /// Normalised mixture (1.0 = stoichiometric)
    Lambda,
    /// Air-fuel ratio
    #[strum(serialize = "AFR")]
    #[serde(rename = "AFR")]
    Afr,
    #[default]
    Raw,
}

impl ChannelKind {
    /// Mixture scale implied by the tag, if the tag decides it
    pub fn mixture_scale(&self) -> Option<MixtureScale> {
        match self {
            ChannelKind::Lambda => Some(MixtureScale::Lambda),
            ChannelKind::Afr => Some(MixtureScale::Afr),
            _ => None,
        }
    }
}

/// One named channel of samples
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default)]
    pub kind: ChannelKind,
    pub values: Vec<f64>,
}

impl Channel {
    pub fn new(name: impl Into<String>, kind: ChannelKind, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }
}

/// A loaded log contributing samples to the correction run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SampleSource {
    pub name: String,
    /// Inactive sources are kept loaded but skipped by the pipeline
    #[serde(default = "default_active")]
    pub active: bool,
    pub channels: Vec<Channel>,
}

fn default_active() -> bool {
    true
}

impl SampleSource {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        Self {
            name: name.into(),
            active: true,
            channels,
        }
    }

    /// Find a channel by name (case-insensitive)
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channel(name).is_some()
    }

    fn require(&self, name: &str) -> Result<&Channel, AnalysisError> {
        self.channel(name)
            .ok_or_else(|| AnalysisError::MissingChannel(name.to_string()))
    }

    /// Pull the four correction channels out of this source
    pub fn correction_samples(
        &self,
        mapping: &ChannelMapping,
    ) -> Result<CorrectionSamples, AnalysisError> {
        let rpm = self.require(&mapping.rpm)?;
        let load = self.require(&mapping.load)?;
        let target = self.require(&mapping.target)?;
        let measured = self.require(&mapping.measured)?;

        // Both mixture channels must agree before the tag is trusted
        let scale_hint = match (target.kind.mixture_scale(), measured.kind.mixture_scale()) {
            (Some(a), Some(b)) if a == b => Some(a),
            _ => None,
        };

        CorrectionSamples::new(
            rpm.values.clone(),
            load.values.clone(),
            target.values.clone(),
            measured.values.clone(),
        )
        .map(|s| s.with_scale_hint(scale_hint))
    }
}

/// Which channels feed the correction run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapping {
    pub rpm: String,
    pub load: String,
    pub target: String,
    pub measured: String,
}

impl Default for ChannelMapping {
    fn default() -> Self {
        Self {
            rpm: "Engine Speed".to_string(),
            load: "Throttle Position".to_string(),
            target: "Target Lambda".to_string(),
            measured: "Lambda 1".to_string(),
        }
    }
}

/// One batch of aligned samples: engine speed, load, target and measured mixture
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrectionSamples {
    pub rpm: Vec<f64>,
    pub load: Vec<f64>,
    pub target: Vec<f64>,
    pub measured: Vec<f64>,
    /// Scale stated by the channel tags; `None` falls back to median detection
    pub scale_hint: Option<MixtureScale>,
}

impl CorrectionSamples {
    /// Build a batch, rejecting series of different lengths
    pub fn new(
        rpm: Vec<f64>,
        load: Vec<f64>,
        target: Vec<f64>,
        measured: Vec<f64>,
    ) -> Result<Self, AnalysisError> {
        let n = rpm.len();
        if load.len() != n || target.len() != n || measured.len() != n {
            return Err(AnalysisError::LengthMismatch {
                rpm: n,
                load: load.len(),
                target: target.len(),
                measured: measured.len(),
            });
        }

        Ok(Self {
            rpm,
            load,
            target,
            measured,
            scale_hint: None,
        })
    }

    pub fn with_scale_hint(mut self, hint: Option<MixtureScale>) -> Self {
        self.scale_hint = hint;
        self
    }

    pub fn len(&self) -> usize {
        self.rpm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rpm.is_empty()
    }
}
