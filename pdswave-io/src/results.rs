//! HDF5 result files holding the per-channel histograms of a run.

use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group, Location};
use ndarray::{ArrayView1, ArrayView2};
use pdswave_core::channel_map::ChannelMap;
use pdswave_core::histogram::{Binning, ChannelHistogramSet, ChannelHistograms, Histogram1D, Histogram2D};
use pdswave_core::layout::panel_title;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Result file layout version.
pub const FORMAT_VERSION: &str = "0.1";
/// Group holding the charge histograms.
pub const CHARGE_GROUP: &str = "chargehistos";
/// Group holding the persistence histograms.
pub const PERSISTENCE_GROUP: &str = "persistencehistos";

/// Result file name for `run` inside `dir`.
#[must_use]
pub fn results_path(dir: &Path, run: u32) -> PathBuf {
    dir.join(format!("run_{run}.h5"))
}

/// A histogram read back with its title.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredHistogram<H> {
    /// Panel title written with the histogram.
    pub title: String,
    /// The histogram.
    pub histogram: H,
}

/// Contents of a result file, keyed by offline channel.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredResults {
    /// Run number.
    pub run: u32,
    /// Non-empty charge histograms.
    pub charge: BTreeMap<usize, StoredHistogram<Histogram1D>>,
    /// Non-empty persistence histograms.
    pub persistence: BTreeMap<usize, StoredHistogram<Histogram2D>>,
}

/// Write every non-empty histogram of `histograms` to a new result file.
///
/// Titles carry the channel's hardware location from `channel_map`.
/// Returns the number of datasets written.
///
/// # Errors
/// Returns an error if HDF5 I/O fails.
pub fn write_results_hdf5<P: AsRef<Path>>(
    path: P,
    run: u32,
    histograms: &ChannelHistogramSet,
    channel_map: &ChannelMap,
) -> Result<usize> {
    let file = File::create(path)?;
    set_attr_str(&file, "pdswave_format_version", FORMAT_VERSION)?;
    set_attr(&file, "run", &run)?;

    let charge_group = file.create_group(CHARGE_GROUP)?;
    let persistence_group = file.create_group(PERSISTENCE_GROUP)?;

    let mut written = 0;
    for (channel, hists) in histograms.iter() {
        let location = u32::try_from(channel)
            .ok()
            .and_then(|ch| channel_map.get(ch));

        if !hists.charge.is_empty() {
            let title = panel_title(location, Some(hists.charge.entries()));
            write_charge(&charge_group, channel, &hists.charge, &title)?;
            written += 1;
        }
        if !hists.persistence.is_empty() {
            let title = panel_title(location, None);
            write_persistence(&persistence_group, channel, &hists.persistence, &title)?;
            written += 1;
        }
    }

    log::debug!("wrote {written} histogram datasets");
    Ok(written)
}

fn write_charge(group: &Group, channel: usize, hist: &Histogram1D, title: &str) -> Result<()> {
    let binning = hist.binning();
    let ds = group
        .new_dataset::<u64>()
        .shape((binning.bins,))
        .create(ChannelHistograms::charge_name(channel).as_str())?;
    ds.write(ArrayView1::from(hist.counts()))?;

    set_attr_str(&ds, "title", title)?;
    set_attr(&ds, "entries", &hist.entries())?;
    set_attr(&ds, "underflow", &hist.underflow())?;
    set_attr(&ds, "overflow", &hist.overflow())?;
    set_attr(&ds, "x_low", &binning.low)?;
    set_attr(&ds, "x_high", &binning.high)?;
    Ok(())
}

fn write_persistence(group: &Group, channel: usize, hist: &Histogram2D, title: &str) -> Result<()> {
    let (x, y) = (hist.x_binning(), hist.y_binning());
    let ds = group
        .new_dataset::<u64>()
        .shape((x.bins, y.bins))
        .chunk((x.bins, y.bins))
        .deflate(4)
        .create(ChannelHistograms::persistence_name(channel).as_str())?;
    let view = ArrayView2::from_shape((x.bins, y.bins), hist.counts())
        .map_err(|e| Error::InvalidFormat(format!("persistence shape mismatch: {e}")))?;
    ds.write(view)?;

    set_attr_str(&ds, "title", title)?;
    set_attr(&ds, "entries", &hist.entries())?;
    set_attr(&ds, "out_of_range", &hist.out_of_range())?;
    set_attr(&ds, "x_low", &x.low)?;
    set_attr(&ds, "x_high", &x.high)?;
    set_attr(&ds, "y_low", &y.low)?;
    set_attr(&ds, "y_high", &y.high)?;
    Ok(())
}

/// Read a result file back.
///
/// # Errors
/// Returns an error if HDF5 I/O fails or a dataset is malformed.
pub fn read_results_hdf5<P: AsRef<Path>>(path: P) -> Result<StoredResults> {
    let file = File::open(path)?;
    let run = file.attr("run")?.read_scalar::<u32>()?;

    let mut charge = BTreeMap::new();
    let charge_group = file.group(CHARGE_GROUP)?;
    for name in charge_group.member_names()? {
        let channel = channel_suffix(&name, "charge_channel_")?;
        let ds = charge_group.dataset(&name)?;
        let bins = match ds.shape().as_slice() {
            [bins] => *bins,
            shape => {
                return Err(Error::InvalidFormat(format!(
                    "{name} must be 1-D, found shape {shape:?}"
                )))
            }
        };
        let binning = Binning::new(bins, read_attr(&ds, "x_low")?, read_attr(&ds, "x_high")?);
        let histogram = Histogram1D::from_parts(
            binning,
            ds.read_raw::<u64>()?,
            read_attr(&ds, "underflow")?,
            read_attr(&ds, "overflow")?,
        )?;
        charge.insert(
            channel,
            StoredHistogram {
                title: read_attr_str(&ds, "title")?,
                histogram,
            },
        );
    }

    let mut persistence = BTreeMap::new();
    let persistence_group = file.group(PERSISTENCE_GROUP)?;
    for name in persistence_group.member_names()? {
        let channel = channel_suffix(&name, "persistence_channel_")?;
        let ds = persistence_group.dataset(&name)?;
        let (x_bins, y_bins) = match ds.shape().as_slice() {
            [x, y] => (*x, *y),
            shape => {
                return Err(Error::InvalidFormat(format!(
                    "{name} must be 2-D, found shape {shape:?}"
                )))
            }
        };
        let histogram = Histogram2D::from_parts(
            Binning::new(x_bins, read_attr(&ds, "x_low")?, read_attr(&ds, "x_high")?),
            Binning::new(y_bins, read_attr(&ds, "y_low")?, read_attr(&ds, "y_high")?),
            ds.read_raw::<u64>()?,
            read_attr(&ds, "out_of_range")?,
        )?;
        persistence.insert(
            channel,
            StoredHistogram {
                title: read_attr_str(&ds, "title")?,
                histogram,
            },
        );
    }

    Ok(StoredResults {
        run,
        charge,
        persistence,
    })
}

fn channel_suffix(name: &str, prefix: &str) -> Result<usize> {
    name.strip_prefix(prefix)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| Error::InvalidFormat(format!("unexpected dataset {name}")))
}

fn set_attr<T: H5Type>(location: &Location, name: &str, value: &T) -> Result<()> {
    location.new_attr::<T>().create(name)?.write_scalar(value)?;
    Ok(())
}

fn set_attr_str(location: &Location, name: &str, value: &str) -> Result<()> {
    let value = VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))?;
    set_attr(location, name, &value)
}

fn read_attr<T: H5Type>(dataset: &Dataset, name: &str) -> Result<T> {
    Ok(dataset.attr(name)?.read_scalar::<T>()?)
}

fn read_attr_str(dataset: &Dataset, name: &str) -> Result<String> {
    let value: VarLenUnicode = dataset.attr(name)?.read_scalar()?;
    Ok(value.to_string())
}
