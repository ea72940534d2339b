//! HDF5 waveform table reader and writer.
//!
//! The table lives in the group [`TABLE_GROUP`] with one dataset per
//! record field. Scalar columns are 1-D with one row per record; samples
//! are the 2-D `adc_channel` dataset of shape `[records, samples]`.

use crate::source::RecordSource;
use crate::{Error, Result};
use hdf5::types::H5Type;
use hdf5::{Dataset, File, Group};
use ndarray::{s, ArrayView1, ArrayView2};
use pdswave_core::record::{WaveformRecord, SAMPLES_PER_WAVEFORM};
use std::path::Path;

/// Group holding the waveform table.
pub const TABLE_GROUP: &str = "pdhddaphne/waveforms";

const OFFLINE_CHANNEL: &str = "OfflineChannel";
const ADC: &str = "adc_channel";
const ADC_CHUNK_ROWS: usize = 256;

/// Optional metadata columns; absent ones read as zero.
struct MetadataColumns {
    run: Option<Dataset>,
    event: Option<Dataset>,
    trigger_number: Option<Dataset>,
    timestamp: Option<Dataset>,
    window_begin: Option<Dataset>,
    window_end: Option<Dataset>,
    slot: Option<Dataset>,
    crate_id: Option<Dataset>,
    daphne_channel: Option<Dataset>,
    frame_timestamp: Option<Dataset>,
    trigger_sample_value: Option<Dataset>,
    threshold: Option<Dataset>,
    baseline: Option<Dataset>,
}

/// Batched reader over an HDF5 waveform table.
pub struct WaveformTableReader {
    rows: usize,
    samples: usize,
    offline_channel: Dataset,
    adc: Dataset,
    meta: MetadataColumns,
}

impl WaveformTableReader {
    /// Opens a waveform table and checks the column shapes.
    ///
    /// # Errors
    /// Returns an error if the file or group cannot be opened, a required
    /// column is missing, or column lengths disagree.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let group = file.group(TABLE_GROUP)?;

        let offline_channel = group.dataset(OFFLINE_CHANNEL)?;
        let rows = match offline_channel.shape().as_slice() {
            [rows] => *rows,
            shape => {
                return Err(Error::InvalidFormat(format!(
                    "{OFFLINE_CHANNEL} must be 1-D, found shape {shape:?}"
                )))
            }
        };

        let adc = group.dataset(ADC)?;
        let samples = match adc.shape().as_slice() {
            [n, samples] if *n == rows && *samples == SAMPLES_PER_WAVEFORM => *samples,
            shape => {
                return Err(Error::InvalidFormat(format!(
                    "{ADC} must have shape [{rows}, {SAMPLES_PER_WAVEFORM}], found {shape:?}"
                )))
            }
        };

        let meta = MetadataColumns {
            run: optional_column(&group, "Run", rows)?,
            event: optional_column(&group, "Event", rows)?,
            trigger_number: optional_column(&group, "TriggerNumber", rows)?,
            timestamp: optional_column(&group, "TimeStamp", rows)?,
            window_begin: optional_column(&group, "Window_begin", rows)?,
            window_end: optional_column(&group, "Window_end", rows)?,
            slot: optional_column(&group, "Slot", rows)?,
            crate_id: optional_column(&group, "Crate", rows)?,
            daphne_channel: optional_column(&group, "DaphneChannel", rows)?,
            frame_timestamp: optional_column(&group, "FrameTimestamp", rows)?,
            trigger_sample_value: optional_column(&group, "TriggerSampleValue", rows)?,
            threshold: optional_column(&group, "Threshold", rows)?,
            baseline: optional_column(&group, "Baseline", rows)?,
        };

        log::debug!("waveform table: {rows} records of {samples} samples");
        Ok(Self {
            rows,
            samples,
            offline_channel,
            adc,
            meta,
        })
    }

    /// Samples per record.
    #[must_use]
    pub fn samples_per_record(&self) -> usize {
        self.samples
    }
}

impl RecordSource for WaveformTableReader {
    fn len(&self) -> usize {
        self.rows
    }

    fn read_range(&self, start: usize, end: usize) -> Result<Vec<WaveformRecord>> {
        let end = end.min(self.rows);
        if start >= end {
            return Ok(Vec::new());
        }
        let n = end - start;

        let offline = self.offline_channel.read_slice_1d::<i32, _>(s![start..end])?;
        let adc = self.adc.read_slice_2d::<i16, _>(s![start..end, ..])?;

        let m = &self.meta;
        let run = read_column::<i32>(m.run.as_ref(), start, end)?;
        let event = read_column::<i32>(m.event.as_ref(), start, end)?;
        let trigger_number = read_column::<i32>(m.trigger_number.as_ref(), start, end)?;
        let timestamp = read_column::<u64>(m.timestamp.as_ref(), start, end)?;
        let window_begin = read_column::<u64>(m.window_begin.as_ref(), start, end)?;
        let window_end = read_column::<u64>(m.window_end.as_ref(), start, end)?;
        let slot = read_column::<i32>(m.slot.as_ref(), start, end)?;
        let crate_id = read_column::<i32>(m.crate_id.as_ref(), start, end)?;
        let daphne_channel = read_column::<i32>(m.daphne_channel.as_ref(), start, end)?;
        let frame_timestamp = read_column::<u64>(m.frame_timestamp.as_ref(), start, end)?;
        let trigger_sample_value =
            read_column::<i32>(m.trigger_sample_value.as_ref(), start, end)?;
        let threshold = read_column::<i32>(m.threshold.as_ref(), start, end)?;
        let baseline = read_column::<i32>(m.baseline.as_ref(), start, end)?;

        let mut records = Vec::with_capacity(n);
        for (i, samples) in adc.rows().into_iter().enumerate() {
            records.push(WaveformRecord {
                run: run[i],
                event: event[i],
                trigger_number: trigger_number[i],
                timestamp: timestamp[i],
                window_begin: window_begin[i],
                window_end: window_end[i],
                slot: slot[i],
                crate_id: crate_id[i],
                daphne_channel: daphne_channel[i],
                offline_channel: offline[i],
                frame_timestamp: frame_timestamp[i],
                adc: samples.to_vec(),
                trigger_sample_value: trigger_sample_value[i],
                threshold: threshold[i],
                baseline: baseline[i],
            });
        }
        Ok(records)
    }
}

fn optional_column(group: &Group, name: &str, rows: usize) -> Result<Option<Dataset>> {
    let Ok(dataset) = group.dataset(name) else {
        log::debug!("waveform table has no {name} column; reading zeros");
        return Ok(None);
    };
    if dataset.shape() != [rows] {
        return Err(Error::InvalidFormat(format!(
            "column {name} has shape {:?}, expected [{rows}]",
            dataset.shape()
        )));
    }
    Ok(Some(dataset))
}

fn read_column<T: H5Type + Default + Clone>(
    dataset: Option<&Dataset>,
    start: usize,
    end: usize,
) -> Result<Vec<T>> {
    match dataset {
        Some(dataset) => Ok(dataset.read_slice_1d::<T, _>(s![start..end])?.to_vec()),
        None => Ok(vec![T::default(); end - start]),
    }
}

/// Writes records as an HDF5 waveform table.
///
/// # Errors
/// Returns an error if HDF5 I/O fails or records differ in length.
pub fn write_waveform_table<P: AsRef<Path>>(path: P, records: &[WaveformRecord]) -> Result<()> {
    let samples = records.first().map_or(SAMPLES_PER_WAVEFORM, WaveformRecord::len);
    if let Some(bad) = records.iter().find(|r| r.len() != samples) {
        return Err(Error::InvalidFormat(format!(
            "record with {} samples in a table of {samples}",
            bad.len()
        )));
    }

    let file = File::create(path)?;
    let group = file.create_group("pdhddaphne")?.create_group("waveforms")?;

    let column_i32 = |name: &str, f: fn(&WaveformRecord) -> i32| -> Result<()> {
        let values: Vec<i32> = records.iter().map(f).collect();
        write_column(&group, name, &values)
    };
    column_i32("Run", |r| r.run)?;
    column_i32("Event", |r| r.event)?;
    column_i32("TriggerNumber", |r| r.trigger_number)?;
    column_i32("Slot", |r| r.slot)?;
    column_i32("Crate", |r| r.crate_id)?;
    column_i32("DaphneChannel", |r| r.daphne_channel)?;
    column_i32(OFFLINE_CHANNEL, |r| r.offline_channel)?;
    column_i32("TriggerSampleValue", |r| r.trigger_sample_value)?;
    column_i32("Threshold", |r| r.threshold)?;
    column_i32("Baseline", |r| r.baseline)?;

    let column_u64 = |name: &str, f: fn(&WaveformRecord) -> u64| -> Result<()> {
        let values: Vec<u64> = records.iter().map(f).collect();
        write_column(&group, name, &values)
    };
    column_u64("TimeStamp", |r| r.timestamp)?;
    column_u64("Window_begin", |r| r.window_begin)?;
    column_u64("Window_end", |r| r.window_end)?;
    column_u64("FrameTimestamp", |r| r.frame_timestamp)?;

    let rows = records.len();
    let mut builder = group.new_dataset::<i16>().shape((rows, samples));
    if rows > 0 && samples > 0 {
        builder = builder
            .chunk((rows.min(ADC_CHUNK_ROWS), samples))
            .deflate(4);
    }
    let adc = builder.create(ADC)?;
    if rows > 0 && samples > 0 {
        let flat: Vec<i16> = records.iter().flat_map(|r| r.adc.iter().copied()).collect();
        let view = ArrayView2::from_shape((rows, samples), flat.as_slice())
            .map_err(|e| Error::InvalidFormat(format!("adc shape mismatch: {e}")))?;
        adc.write(view)?;
    }

    log::debug!("wrote waveform table with {rows} records");
    Ok(())
}

fn write_column<T: H5Type>(group: &Group, name: &str, values: &[T]) -> Result<()> {
    let dataset = group.new_dataset::<T>().shape((values.len(),)).create(name)?;
    if !values.is_empty() {
        dataset.write(ArrayView1::from(values))?;
    }
    Ok(())
}
