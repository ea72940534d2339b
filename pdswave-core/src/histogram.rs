//! Fixed-range binned counters.
//!
//! Histograms are allocated once with a fixed binning. Fills outside the
//! range are tallied but never stored in a bin. All updates are count
//! increments, so two histograms with the same binning merge by addition
//! and the result does not depend on fill order.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::record::ChannelId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Where a value lands on a binned axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bin {
    /// Below the lower edge.
    Underflow,
    /// Inside the range, at this bin index.
    Index(usize),
    /// At or above the upper edge (or NaN).
    Overflow,
}

/// Uniform binning of `[low, high)` into `bins` bins.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    /// Number of bins.
    pub bins: usize,
    /// Lower edge (inclusive).
    pub low: f64,
    /// Upper edge (exclusive).
    pub high: f64,
}

impl Binning {
    /// Creates a binning.
    #[must_use]
    pub const fn new(bins: usize, low: f64, high: f64) -> Self {
        Self { bins, low, high }
    }

    /// Checks for a non-empty, finite, increasing range.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if the binning cannot hold values.
    pub fn validate(&self) -> Result<()> {
        if self.bins == 0 {
            return Err(Error::ConfigError("binning needs at least one bin".to_string()));
        }
        if !self.low.is_finite() || !self.high.is_finite() || self.low >= self.high {
            return Err(Error::ConfigError(format!(
                "invalid binning range [{}, {})",
                self.low, self.high
            )));
        }
        Ok(())
    }

    /// Finds the bin for `x`.
    #[must_use]
    #[inline]
    pub fn locate(&self, x: f64) -> Bin {
        if x < self.low {
            Bin::Underflow
        } else if x >= self.high || x.is_nan() {
            Bin::Overflow
        } else {
            let bin = (self.bins as f64 * (x - self.low) / (self.high - self.low)) as usize;
            Bin::Index(bin.min(self.bins - 1))
        }
    }

    /// Width of one bin.
    #[must_use]
    pub fn width(&self) -> f64 {
        (self.high - self.low) / self.bins as f64
    }

    /// Lower edge of bin `index`.
    #[must_use]
    pub fn lower_edge(&self, index: usize) -> f64 {
        self.low + index as f64 * self.width()
    }

    /// Center of bin `index`.
    #[must_use]
    pub fn center(&self, index: usize) -> f64 {
        self.lower_edge(index) + 0.5 * self.width()
    }
}

/// One-dimensional histogram.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram1D {
    binning: Binning,
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
}

impl Histogram1D {
    /// Create an empty histogram.
    #[must_use]
    pub fn new(binning: Binning) -> Self {
        Self {
            binning,
            counts: vec![0; binning.bins],
            underflow: 0,
            overflow: 0,
        }
    }

    /// Rebuild a histogram from stored counts.
    ///
    /// # Errors
    /// Returns an error if `counts` does not match the binning.
    pub fn from_parts(
        binning: Binning,
        counts: Vec<u64>,
        underflow: u64,
        overflow: u64,
    ) -> Result<Self> {
        binning.validate()?;
        if counts.len() != binning.bins {
            return Err(Error::BinningMismatch(format!(
                "{} counts for {} bins",
                counts.len(),
                binning.bins
            )));
        }
        Ok(Self {
            binning,
            counts,
            underflow,
            overflow,
        })
    }

    /// Add one entry at `x`.
    #[inline]
    pub fn fill(&mut self, x: f64) {
        match self.binning.locate(x) {
            Bin::Underflow => self.underflow += 1,
            Bin::Overflow => self.overflow += 1,
            Bin::Index(i) => self.counts[i] += 1,
        }
    }

    /// Get the count in bin `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u64> {
        self.counts.get(index).copied()
    }

    /// In-range bin counts.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Axis binning.
    #[must_use]
    pub fn binning(&self) -> Binning {
        self.binning
    }

    /// Fills below the range.
    #[must_use]
    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    /// Fills at or above the range.
    #[must_use]
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Fills that landed in a bin.
    #[must_use]
    pub fn in_range(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Every fill, including under/overflow.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.in_range() + self.underflow + self.overflow
    }

    /// Returns true if nothing was ever filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries() == 0
    }

    /// Largest bin count.
    #[must_use]
    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Mean of the in-range fills, from bin centers.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        let n = self.in_range();
        if n == 0 {
            return None;
        }
        let weighted: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(i, &c)| self.binning.center(i) * c as f64)
            .sum();
        Some(weighted / n as f64)
    }

    /// Add the counts of `other` into `self`.
    ///
    /// # Errors
    /// Returns [`Error::BinningMismatch`] if the binnings differ.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.binning != other.binning {
            return Err(Error::BinningMismatch(format!(
                "{:?} vs {:?}",
                self.binning, other.binning
            )));
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        Ok(())
    }
}

/// Two-dimensional histogram, stored row-major as `counts[ix * y_bins + iy]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram2D {
    x: Binning,
    y: Binning,
    counts: Vec<u64>,
    out_of_range: u64,
}

impl Histogram2D {
    /// Create an empty histogram.
    #[must_use]
    pub fn new(x: Binning, y: Binning) -> Self {
        Self {
            x,
            y,
            counts: vec![0; x.bins * y.bins],
            out_of_range: 0,
        }
    }

    /// Rebuild a histogram from stored counts.
    ///
    /// # Errors
    /// Returns an error if `counts` does not match the binning.
    pub fn from_parts(x: Binning, y: Binning, counts: Vec<u64>, out_of_range: u64) -> Result<Self> {
        x.validate()?;
        y.validate()?;
        if counts.len() != x.bins * y.bins {
            return Err(Error::BinningMismatch(format!(
                "{} counts for {}x{} bins",
                counts.len(),
                x.bins,
                y.bins
            )));
        }
        Ok(Self {
            x,
            y,
            counts,
            out_of_range,
        })
    }

    /// Add one entry at `(x, y)`.
    #[inline]
    pub fn fill(&mut self, x: f64, y: f64) {
        match (self.x.locate(x), self.y.locate(y)) {
            (Bin::Index(ix), Bin::Index(iy)) => self.counts[ix * self.y.bins + iy] += 1,
            _ => self.out_of_range += 1,
        }
    }

    /// Get the count in cell `(ix, iy)`.
    #[must_use]
    pub fn get(&self, ix: usize, iy: usize) -> Option<u64> {
        if ix < self.x.bins && iy < self.y.bins {
            Some(self.counts[ix * self.y.bins + iy])
        } else {
            None
        }
    }

    /// Flattened in-range counts.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// X axis binning.
    #[must_use]
    pub fn x_binning(&self) -> Binning {
        self.x
    }

    /// Y axis binning.
    #[must_use]
    pub fn y_binning(&self) -> Binning {
        self.y
    }

    /// Fills outside the range on either axis.
    #[must_use]
    pub fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    /// Every fill, including out-of-range ones.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.out_of_range
    }

    /// Returns true if nothing was ever filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries() == 0
    }

    /// Largest cell count.
    #[must_use]
    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Non-empty cells as `(ix, iy, count)`.
    pub fn nonzero_cells(&self) -> impl Iterator<Item = (usize, usize, u64)> + '_ {
        let y_bins = self.y.bins;
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(move |(i, &c)| (i / y_bins, i % y_bins, c))
    }

    /// Add the counts of `other` into `self`.
    ///
    /// # Errors
    /// Returns [`Error::BinningMismatch`] if the binnings differ.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.x != other.x || self.y != other.y {
            return Err(Error::BinningMismatch(format!(
                "{:?}x{:?} vs {:?}x{:?}",
                self.x, self.y, other.x, other.y
            )));
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        self.out_of_range += other.out_of_range;
        Ok(())
    }
}

/// Binning of the per-channel histograms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    /// Charge distribution binning (ADC counts x samples).
    pub charge: Binning,
    /// Persistence time axis (sample index).
    pub persistence_time: Binning,
    /// Persistence amplitude axis (baseline-subtracted ADC counts).
    pub persistence_amplitude: Binning,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            charge: Binning::new(200, -150.0, 2500.0),
            persistence_time: Binning::new(200, 100.0, 300.0),
            persistence_amplitude: Binning::new(360, -50.0, 310.0),
        }
    }
}

impl HistogramConfig {
    /// Validates every axis.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] naming the first bad axis.
    pub fn validate(&self) -> Result<()> {
        for (name, binning) in [
            ("charge", &self.charge),
            ("persistence_time", &self.persistence_time),
            ("persistence_amplitude", &self.persistence_amplitude),
        ] {
            binning
                .validate()
                .map_err(|e| Error::ConfigError(format!("{name}: {e}")))?;
        }
        Ok(())
    }
}

/// Charge and persistence histograms of one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelHistograms {
    pub charge: Histogram1D,
    pub persistence: Histogram2D,
}

impl ChannelHistograms {
    /// Create empty histograms.
    #[must_use]
    pub fn new(config: &HistogramConfig) -> Self {
        Self {
            charge: Histogram1D::new(config.charge),
            persistence: Histogram2D::new(config.persistence_time, config.persistence_amplitude),
        }
    }

    /// Add one charge value.
    #[inline]
    pub fn record_charge(&mut self, value: f64) {
        self.charge.fill(value);
    }

    /// Add every sample of a waveform, baseline-subtracted, to the
    /// persistence histogram.
    pub fn record_waveform<T: Copy + Into<i64>>(&mut self, samples: &[T], baseline: i32) {
        let base = i64::from(baseline);
        for (t, &s) in samples.iter().enumerate() {
            self.persistence.fill(t as f64, (s.into() - base) as f64);
        }
    }

    /// Dataset name of the charge histogram of `channel`.
    #[must_use]
    pub fn charge_name(channel: usize) -> String {
        format!("charge_channel_{channel}")
    }

    /// Dataset name of the persistence histogram of `channel`.
    #[must_use]
    pub fn persistence_name(channel: usize) -> String {
        format!("persistence_channel_{channel}")
    }
}

/// Per-channel histograms for every offline channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelHistogramSet {
    config: HistogramConfig,
    channels: Vec<ChannelHistograms>,
}

impl ChannelHistogramSet {
    /// Allocate histograms for `channel_count` channels.
    #[must_use]
    pub fn new(channel_count: usize, config: &HistogramConfig) -> Self {
        Self {
            config: config.clone(),
            channels: (0..channel_count)
                .map(|_| ChannelHistograms::new(config))
                .collect(),
        }
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if the set holds no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Binning shared by all channels.
    #[must_use]
    pub fn config(&self) -> &HistogramConfig {
        &self.config
    }

    fn slot_mut(&mut self, channel: ChannelId) -> Result<&mut ChannelHistograms> {
        let limit = self.channels.len();
        self.channels
            .get_mut(channel.index())
            .ok_or(Error::InvalidChannel {
                channel: i64::from(channel.get()),
                limit,
            })
    }

    /// Add `value` to the charge histogram of `channel`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChannel`] if the set has no such channel.
    pub fn record_charge(&mut self, channel: ChannelId, value: f64) -> Result<()> {
        self.slot_mut(channel)?.record_charge(value);
        Ok(())
    }

    /// Add one persistence entry at `(time_index, amplitude)` for `channel`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChannel`] if the set has no such channel.
    pub fn record_sample(&mut self, channel: ChannelId, time_index: usize, amplitude: f64) -> Result<()> {
        self.slot_mut(channel)?
            .persistence
            .fill(time_index as f64, amplitude);
        Ok(())
    }

    /// Add every sample of a waveform, baseline-subtracted, to the
    /// persistence histogram of `channel`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChannel`] if the set has no such channel.
    pub fn record_waveform<T: Copy + Into<i64>>(
        &mut self,
        channel: ChannelId,
        samples: &[T],
        baseline: i32,
    ) -> Result<()> {
        self.slot_mut(channel)?.record_waveform(samples, baseline);
        Ok(())
    }

    /// Histograms of channel `index`.
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&ChannelHistograms> {
        self.channels.get(index)
    }

    /// Mutable access to all channels, indexed by channel number.
    pub fn channels_mut(&mut self) -> &mut [ChannelHistograms] {
        &mut self.channels
    }

    /// Iterate `(channel, histograms)` in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ChannelHistograms)> {
        self.channels.iter().enumerate()
    }

    /// Add every channel of `other` into `self`.
    ///
    /// # Errors
    /// Returns [`Error::BinningMismatch`] if channel counts or binnings differ.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.channels.len() != other.channels.len() {
            return Err(Error::BinningMismatch(format!(
                "{} channels vs {} channels",
                self.channels.len(),
                other.channels.len()
            )));
        }
        for (mine, theirs) in self.channels.iter_mut().zip(&other.channels) {
            mine.charge.merge(&theirs.charge)?;
            mine.persistence.merge(&theirs.persistence)?;
        }
        Ok(())
    }
}
