//! JSON run summary.

use crate::Result;
use pdswave_analysis::RunStatistics;
use pdswave_core::channel_map::{ChannelLocation, ChannelMap};
use pdswave_core::histogram::ChannelHistogramSet;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Summary file name for `run` inside `dir`.
#[must_use]
pub fn summary_path(dir: &Path, run: u32) -> PathBuf {
    dir.join(format!("run_{run}_summary.json"))
}

/// Per-channel line of a run summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    /// Offline channel.
    pub channel: usize,
    /// Records histogrammed for this channel.
    pub records: u64,
    /// Charge histogram entries, out-of-range fills included.
    pub charge_entries: u64,
    /// Mean of the in-range charge fills, from bin centers.
    pub mean_charge: Option<f64>,
    /// Hardware location, if mapped.
    pub location: Option<ChannelLocation>,
}

/// Totals and per-channel figures of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run number.
    pub run: u32,
    /// Input file.
    pub input: PathBuf,
    /// Records histogrammed.
    pub records_processed: u64,
    /// Records dropped for an invalid channel.
    pub records_skipped: u64,
    /// Channels with at least one charge entry.
    pub channels: Vec<ChannelSummary>,
}

impl RunSummary {
    /// Summarize a finished run.
    #[must_use]
    pub fn new(
        run: u32,
        input: &Path,
        histograms: &ChannelHistogramSet,
        stats: &RunStatistics,
        channel_map: &ChannelMap,
    ) -> Self {
        let channels = histograms
            .iter()
            .filter(|(_, h)| !h.charge.is_empty())
            .map(|(channel, h)| ChannelSummary {
                channel,
                records: stats.per_channel.get(channel).copied().unwrap_or(0),
                charge_entries: h.charge.entries(),
                mean_charge: h.charge.mean(),
                location: u32::try_from(channel)
                    .ok()
                    .and_then(|ch| channel_map.get(ch))
                    .copied(),
            })
            .collect();

        Self {
            run,
            input: input.to_path_buf(),
            records_processed: stats.records_processed,
            records_skipped: stats.records_skipped,
            channels,
        }
    }

    /// Write the summary as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Read a summary written by [`RunSummary::write_json`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
