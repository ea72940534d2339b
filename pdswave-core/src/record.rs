//! Waveform record types.
//!
//! A [`WaveformRecord`] is one self-triggered DAPHNE readout: the metadata
//! written by the decoder plus a fixed-length ADC trace.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of ADC samples in every waveform.
pub const SAMPLES_PER_WAVEFORM: usize = 1024;

/// Number of offline channels served by the default layout.
pub const DEFAULT_CHANNEL_COUNT: usize = 160;

/// A validated offline channel number.
///
/// Only constructible through [`ChannelId::new`], so every `ChannelId` is a
/// valid index into collections sized by the channel count it was checked
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(u16);

impl ChannelId {
    /// Checks `raw` against `0..channel_count`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChannel`] if `raw` is negative or not below
    /// `channel_count`.
    pub fn new(raw: i64, channel_count: usize) -> Result<Self> {
        match u16::try_from(raw) {
            Ok(value) if usize::from(value) < channel_count => Ok(Self(value)),
            _ => Err(Error::InvalidChannel {
                channel: raw,
                limit: channel_count,
            }),
        }
    }

    /// Returns the channel as a collection index.
    #[must_use]
    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Returns the raw channel number.
    #[must_use]
    #[inline]
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One decoded waveform with its readout metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveformRecord {
    /// Run number.
    pub run: i32,
    /// Event (trigger record) number.
    pub event: i32,
    /// Trigger number within the run.
    pub trigger_number: i32,
    /// Trigger timestamp (62.5 MHz ticks).
    pub timestamp: u64,
    /// Readout window start timestamp.
    pub window_begin: u64,
    /// Readout window end timestamp.
    pub window_end: u64,
    /// DAPHNE endpoint (slot).
    pub slot: i32,
    /// Readout crate.
    pub crate_id: i32,
    /// Channel number on the DAPHNE board.
    pub daphne_channel: i32,
    /// Offline (logical) channel number; not yet validated.
    pub offline_channel: i32,
    /// Timestamp of the frame carrying the waveform.
    pub frame_timestamp: u64,
    /// ADC samples, [`SAMPLES_PER_WAVEFORM`] long when produced by a reader.
    pub adc: Vec<i16>,
    /// ADC value at the trigger sample.
    pub trigger_sample_value: i32,
    /// Self-trigger threshold.
    pub threshold: i32,
    /// Baseline reported by the firmware.
    pub baseline: i32,
}

impl WaveformRecord {
    /// Creates a record carrying only a channel and its samples.
    #[must_use]
    pub fn from_samples(offline_channel: i32, adc: Vec<i16>) -> Self {
        Self {
            offline_channel,
            adc,
            ..Self::default()
        }
    }

    /// Validates the offline channel against `channel_count`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChannel`] for out-of-range channels.
    pub fn channel(&self, channel_count: usize) -> Result<ChannelId> {
        ChannelId::new(i64::from(self.offline_channel), channel_count)
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adc.len()
    }

    /// Returns true if the record has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adc.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_bounds() {
        assert_eq!(ChannelId::new(0, 160).unwrap().index(), 0);
        assert_eq!(ChannelId::new(159, 160).unwrap().index(), 159);
        assert!(ChannelId::new(160, 160).is_err());
        assert!(ChannelId::new(-1, 160).is_err());
        assert!(ChannelId::new(i64::from(u16::MAX) + 1, usize::MAX).is_err());
    }

    #[test]
    fn test_invalid_channel_message() {
        let err = ChannelId::new(200, 160).unwrap_err();
        assert_eq!(err.to_string(), "invalid offline channel 200 (expected 0..160)");
    }

    #[test]
    fn test_record_channel() {
        let record = WaveformRecord::from_samples(42, vec![0; SAMPLES_PER_WAVEFORM]);
        assert_eq!(record.channel(DEFAULT_CHANNEL_COUNT).unwrap().get(), 42);
        assert_eq!(record.len(), SAMPLES_PER_WAVEFORM);
        assert!(!record.is_empty());
        assert!(record.channel(40).is_err());
    }
}
