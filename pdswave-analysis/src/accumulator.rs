//! Record-by-record histogram accumulation.
#![allow(clippy::cast_precision_loss)]

use pdswave_core::config::{AnalysisConfig, InvalidChannelPolicy};
use pdswave_core::features::{extract_features, FeatureConfig, WaveformFeatures};
use pdswave_core::histogram::ChannelHistogramSet;
use pdswave_core::record::{ChannelId, WaveformRecord};
use pdswave_core::{Error, Result};
use rayon::prelude::*;
use serde::Serialize;

/// Record tallies for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Records whose features were histogrammed.
    pub records_processed: u64,
    /// Records dropped for an out-of-range offline channel.
    pub records_skipped: u64,
    /// Processed records per offline channel.
    pub per_channel: Vec<u64>,
}

impl RunStatistics {
    /// Create zeroed statistics for `channel_count` channels.
    #[must_use]
    pub fn new(channel_count: usize) -> Self {
        Self {
            records_processed: 0,
            records_skipped: 0,
            per_channel: vec![0; channel_count],
        }
    }

    /// Every record seen, processed or not.
    #[must_use]
    pub fn records_seen(&self) -> u64 {
        self.records_processed + self.records_skipped
    }

    /// Add the tallies of `other`.
    pub fn merge(&mut self, other: &Self) {
        self.records_processed += other.records_processed;
        self.records_skipped += other.records_skipped;
        if self.per_channel.len() < other.per_channel.len() {
            self.per_channel.resize(other.per_channel.len(), 0);
        }
        for (a, b) in self.per_channel.iter_mut().zip(&other.per_channel) {
            *a += b;
        }
    }
}

/// Fills per-channel charge and persistence histograms from waveform records.
///
/// For each record: validate the offline channel, compute the baseline and
/// charge, fill the charge once and every sample into persistence.
#[derive(Clone, Debug)]
pub struct Accumulator {
    features: FeatureConfig,
    policy: InvalidChannelPolicy,
    channel_count: usize,
    histograms: ChannelHistogramSet,
    stats: RunStatistics,
}

impl Accumulator {
    /// Create an accumulator with empty histograms.
    #[must_use]
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            features: config.features.clone(),
            policy: config.invalid_channel,
            channel_count: config.channel_count,
            histograms: ChannelHistogramSet::new(config.channel_count, &config.histograms),
            stats: RunStatistics::new(config.channel_count),
        }
    }

    /// Validate the channel of `record` under the configured policy.
    ///
    /// `Ok(None)` means the record is to be skipped.
    fn channel_of(&self, record: &WaveformRecord) -> Result<Option<ChannelId>> {
        match record.channel(self.channel_count) {
            Ok(channel) => Ok(Some(channel)),
            Err(e) => match self.policy {
                InvalidChannelPolicy::Skip => Ok(None),
                InvalidChannelPolicy::Abort => Err(e),
            },
        }
    }

    fn prepare(&self, record: &WaveformRecord) -> Result<Option<(ChannelId, WaveformFeatures)>> {
        let Some(channel) = self.channel_of(record)? else {
            return Ok(None);
        };
        let features = extract_features(&record.adc, &self.features)?;
        Ok(Some((channel, features)))
    }

    fn note_skipped(&mut self, record: &WaveformRecord) {
        log::warn!(
            "skipping record (run {}, event {}, trigger {}): offline channel {} outside 0..{}",
            record.run,
            record.event,
            record.trigger_number,
            record.offline_channel,
            self.channel_count
        );
        self.stats.records_skipped += 1;
    }

    /// Process a single record.
    ///
    /// # Errors
    /// Returns an error for an out-of-range channel under
    /// [`InvalidChannelPolicy::Abort`], or if the record is too short for
    /// the configured windows.
    pub fn process(&mut self, record: &WaveformRecord) -> Result<()> {
        let Some((channel, features)) = self.prepare(record)? else {
            self.note_skipped(record);
            return Ok(());
        };
        self.histograms.record_charge(channel, features.charge as f64)?;
        self.histograms
            .record_waveform(channel, &record.adc, features.baseline)?;
        self.stats.records_processed += 1;
        self.stats.per_channel[channel.index()] += 1;
        Ok(())
    }

    /// Process a batch of records in parallel.
    ///
    /// Features are extracted in parallel, then each channel's histograms
    /// are filled by one worker from that channel's records in batch order.
    /// On success the result is identical to calling
    /// [`Accumulator::process`] on each record in turn.
    ///
    /// # Errors
    /// Returns the error of the first failing record, in batch order. A
    /// failed batch leaves the accumulator unchanged.
    pub fn process_batch(&mut self, records: &[WaveformRecord]) -> Result<()> {
        let prepared = records
            .par_iter()
            .map(|r| self.prepare(r))
            .collect::<Vec<Result<Option<(ChannelId, WaveformFeatures)>>>>()
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let mut by_channel: Vec<Vec<(usize, WaveformFeatures)>> =
            vec![Vec::new(); self.histograms.len()];
        let mut skipped = Vec::new();
        for (idx, item) in prepared.into_iter().enumerate() {
            match item {
                Some((channel, features)) => {
                    let slot = by_channel.get_mut(channel.index()).ok_or(Error::InvalidChannel {
                        channel: i64::from(channel.get()),
                        limit: self.channel_count,
                    })?;
                    slot.push((idx, features));
                }
                None => skipped.push(idx),
            }
        }
        for idx in skipped {
            self.note_skipped(&records[idx]);
        }

        self.histograms
            .channels_mut()
            .par_iter_mut()
            .zip(by_channel.par_iter())
            .for_each(|(hists, items)| {
                for &(idx, features) in items {
                    hists.record_charge(features.charge as f64);
                    hists.record_waveform(&records[idx].adc, features.baseline);
                }
            });

        for (count, items) in self.stats.per_channel.iter_mut().zip(&by_channel) {
            *count += items.len() as u64;
            self.stats.records_processed += items.len() as u64;
        }
        log::debug!(
            "processed batch of {} records ({} processed, {} skipped so far)",
            records.len(),
            self.stats.records_processed,
            self.stats.records_skipped
        );
        Ok(())
    }

    /// Add the histograms and statistics of `other`.
    ///
    /// # Errors
    /// Returns an error if the two accumulators use different binning.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        self.histograms.merge(&other.histograms)?;
        self.stats.merge(&other.stats);
        Ok(())
    }

    /// Accumulated histograms.
    #[must_use]
    pub fn histograms(&self) -> &ChannelHistogramSet {
        &self.histograms
    }

    /// Record tallies so far.
    #[must_use]
    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    /// Consume the accumulator.
    #[must_use]
    pub fn into_parts(self) -> (ChannelHistogramSet, RunStatistics) {
        (self.histograms, self.stats)
    }
}

/// Run an accumulator over a stream of record batches.
///
/// The stream yields `Result` so that reader errors end the run.
///
/// # Errors
/// Returns the first reader or processing error.
pub fn accumulate<I, E>(batches: I, config: &AnalysisConfig) -> std::result::Result<Accumulator, E>
where
    I: IntoIterator<Item = std::result::Result<Vec<WaveformRecord>, E>>,
    E: From<Error>,
{
    let mut acc = Accumulator::new(config);
    for batch in batches {
        acc.process_batch(&batch?)?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdswave_core::record::SAMPLES_PER_WAVEFORM;

    fn pulse(channel: i32, base: i16, height: i16) -> WaveformRecord {
        let mut adc = vec![base; SAMPLES_PER_WAVEFORM];
        for s in &mut adc[134..170] {
            *s = base + height;
        }
        WaveformRecord::from_samples(channel, adc)
    }

    #[test]
    fn test_process_fills_charge_and_persistence() {
        let config = AnalysisConfig::default();
        let mut acc = Accumulator::new(&config);
        acc.process(&pulse(3, 1000, 10)).unwrap();

        let hists = acc.histograms().channel(3).unwrap();
        // charge 360 -> bin floor(200 * 510 / 2650) = 38
        assert_eq!(hists.charge.get(38), Some(1));
        assert_eq!(hists.charge.entries(), 1);
        assert_eq!(hists.persistence.entries(), SAMPLES_PER_WAVEFORM as u64);
        // t = 150 lies in the pulse: amplitude 10 -> iy 60
        assert_eq!(hists.persistence.get(50, 60), Some(1));
        assert_eq!(acc.stats().records_processed, 1);
        assert_eq!(acc.stats().per_channel[3], 1);
    }

    #[test]
    fn test_skip_policy_counts_invalid_channels() {
        let config = AnalysisConfig::default();
        let mut acc = Accumulator::new(&config);
        acc.process(&pulse(160, 1000, 10)).unwrap();
        acc.process(&pulse(-1, 1000, 10)).unwrap();
        assert_eq!(acc.stats().records_skipped, 2);
        assert_eq!(acc.stats().records_processed, 0);
        assert!(acc.histograms().iter().all(|(_, h)| h.charge.is_empty()));
    }

    #[test]
    fn test_abort_policy_fails() {
        let config = AnalysisConfig::default().with_invalid_channel(InvalidChannelPolicy::Abort);
        let mut acc = Accumulator::new(&config);
        let err = acc.process(&pulse(999, 1000, 10)).unwrap_err();
        assert!(matches!(err, Error::InvalidChannel { channel: 999, .. }));

        let batch = vec![pulse(1, 1000, 10), pulse(400, 1000, 10)];
        assert!(acc.process_batch(&batch).is_err());
    }

    #[test]
    fn test_short_waveform_is_an_error() {
        let config = AnalysisConfig::default();
        let mut acc = Accumulator::new(&config);
        let record = WaveformRecord::from_samples(0, vec![0; 150]);
        assert!(matches!(
            acc.process(&record),
            Err(Error::WindowOutOfRange { .. })
        ));
    }

    #[test]
    fn test_failed_batch_leaves_accumulator_unchanged() {
        let config = AnalysisConfig::default();
        let mut acc = Accumulator::new(&config);
        let batch = vec![
            pulse(1, 1000, 10),
            pulse(300, 1000, 10),
            WaveformRecord::from_samples(2, vec![0; 150]),
        ];
        let err = acc.process_batch(&batch).unwrap_err();
        assert!(matches!(err, Error::WindowOutOfRange { .. }));

        assert_eq!(acc.stats().records_processed, 0);
        assert_eq!(acc.stats().records_skipped, 0);
        assert!(acc
            .histograms()
            .iter()
            .all(|(_, h)| h.charge.is_empty() && h.persistence.entries() == 0));
    }

    #[test]
    fn test_statistics_merge() {
        let mut a = RunStatistics::new(2);
        a.records_processed = 3;
        a.per_channel[1] = 3;
        let mut b = RunStatistics::new(4);
        b.records_processed = 1;
        b.records_skipped = 2;
        b.per_channel[3] = 1;
        a.merge(&b);
        assert_eq!(a.records_seen(), 6);
        assert_eq!(a.per_channel, vec![0, 3, 0, 1]);
    }
}
