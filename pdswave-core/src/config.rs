//! Analysis configuration.
//!
//! Every field has a default matching the ProtoDUNE-HD photon detector
//! setup, so a JSON file only needs the values it changes:
//!
//! ```json
//! { "features": { "charge_window": { "start": 130, "end": 180 } },
//!   "invalid_channel": "abort" }
//! ```

use crate::features::FeatureConfig;
use crate::histogram::HistogramConfig;
use crate::layout::LayoutConfig;
use crate::record::DEFAULT_CHANNEL_COUNT;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// What to do with a record whose offline channel is out of range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidChannelPolicy {
    /// Log a warning, count the record as skipped and continue.
    #[default]
    Skip,
    /// Fail the run.
    Abort,
}

/// Output image settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Draw panel titles and axis labels; without them no text is rendered.
    pub labels: bool,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 4000,
            height: 4000,
            labels: true,
        }
    }
}

/// Full analysis configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Baseline and charge windows.
    pub features: FeatureConfig,
    /// Histogram binning.
    pub histograms: HistogramConfig,
    /// Number of offline channels.
    pub channel_count: usize,
    /// Plot grid layout.
    pub layout: LayoutConfig,
    /// Handling of out-of-range offline channels.
    pub invalid_channel: InvalidChannelPolicy,
    /// Records read and processed per batch.
    pub batch_size: usize,
    /// Image settings.
    pub plot: PlotConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            histograms: HistogramConfig::default(),
            channel_count: DEFAULT_CHANNEL_COUNT,
            layout: LayoutConfig::default(),
            invalid_channel: InvalidChannelPolicy::default(),
            batch_size: 4096,
            plot: PlotConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string cannot be parsed or validated.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the invalid channel policy.
    #[must_use]
    pub fn with_invalid_channel(mut self, policy: InvalidChannelPolicy) -> Self {
        self.invalid_channel = policy;
        self
    }

    /// Set the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Validate all sections.
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.histograms.validate()?;
        if self.channel_count == 0 || self.channel_count > usize::from(u16::MAX) {
            return Err(Error::ConfigError(format!(
                "channel_count {} must be in 1..={}",
                self.channel_count,
                u16::MAX
            )));
        }
        self.layout.validate(self.channel_count)?;
        if self.batch_size == 0 {
            return Err(Error::ConfigError("batch_size must be positive".to_string()));
        }
        if self.plot.width == 0 || self.plot.height == 0 {
            return Err(Error::ConfigError("plot size must be positive".to_string()));
        }
        Ok(())
    }
}
