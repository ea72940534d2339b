//! Record sources and input format detection.

use crate::binary::BinaryWaveformReader;
use crate::{Error, Result};
use pdswave_core::record::WaveformRecord;
use std::path::Path;

/// Random access to the waveform records of one input file.
pub trait RecordSource {
    /// Number of records in the input.
    fn len(&self) -> usize;

    /// Returns true if the input holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read records `start..end`.
    ///
    /// # Errors
    /// Returns an error if the range cannot be read or decoded.
    fn read_range(&self, start: usize, end: usize) -> Result<Vec<WaveformRecord>>;
}

/// Iterator over consecutive record batches of a [`RecordSource`].
pub struct RecordBatches<'a> {
    source: &'a dyn RecordSource,
    next: usize,
    batch_size: usize,
    failed: bool,
}

impl<'a> RecordBatches<'a> {
    /// Batches of at most `batch_size` records (at least one).
    #[must_use]
    pub fn new(source: &'a dyn RecordSource, batch_size: usize) -> Self {
        Self {
            source,
            next: 0,
            batch_size: batch_size.max(1),
            failed: false,
        }
    }
}

impl Iterator for RecordBatches<'_> {
    type Item = Result<Vec<WaveformRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.source.len();
        if self.failed || self.next >= len {
            return None;
        }
        let start = self.next;
        let end = (start + self.batch_size).min(len);
        self.next = end;
        let batch = self.source.read_range(start, end);
        self.failed = batch.is_err();
        Some(batch)
    }
}

/// Supported input formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// Per-run HDF5 waveform table (`.h5`, `.hdf5`).
    Hdf5Table,
    /// Raw single-channel dump (`.dat`, `.bin`).
    Binary,
}

impl InputFormat {
    /// Detect the format from the file extension.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedFormat`] for unknown extensions.
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "h5" | "hdf5" => Ok(Self::Hdf5Table),
            "dat" | "bin" => Ok(Self::Binary),
            _ => Err(Error::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Offline channel encoded in a dump file name as `..._ch<N>.dat`.
#[must_use]
pub fn channel_from_file_name(path: &Path) -> Option<i32> {
    let stem = path.file_stem()?.to_str()?;
    let (_, tail) = stem.rsplit_once("_ch")?;
    tail.parse().ok()
}

/// Open an input file as a record source.
///
/// Binary dumps carry no channel column; `channel` overrides the channel
/// parsed from the file name.
///
/// # Errors
/// Returns an error for unknown formats, unreadable files or a binary dump
/// whose channel is not known.
pub fn open_source(path: &Path, channel: Option<i32>) -> Result<Box<dyn RecordSource>> {
    match InputFormat::detect(path)? {
        InputFormat::Binary => {
            let channel = channel.or_else(|| channel_from_file_name(path)).ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "{}: binary dump has no channel; pass one explicitly",
                    path.display()
                ))
            })?;
            log::info!("Reading binary dump {} as channel {channel}", path.display());
            Ok(Box::new(BinaryWaveformReader::open(path, channel)?))
        }
        InputFormat::Hdf5Table => open_table(path),
    }
}

#[cfg(feature = "hdf5")]
fn open_table(path: &Path) -> Result<Box<dyn RecordSource>> {
    log::info!("Reading waveform table {}", path.display());
    Ok(Box::new(crate::table::WaveformTableReader::open(path)?))
}

#[cfg(not(feature = "hdf5"))]
fn open_table(path: &Path) -> Result<Box<dyn RecordSource>> {
    Err(Error::UnsupportedFormat(format!(
        "{}: built without HDF5 support",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting(usize);

    impl RecordSource for Counting {
        fn len(&self) -> usize {
            self.0
        }

        fn read_range(&self, start: usize, end: usize) -> Result<Vec<WaveformRecord>> {
            if start >= 5 {
                return Err(Error::InvalidFormat("broken".to_string()));
            }
            Ok((start..end)
                .map(|i| WaveformRecord::from_samples(i32::try_from(i).unwrap(), vec![0]))
                .collect())
        }
    }

    #[test]
    fn test_batches_cover_source() {
        let source = Counting(5);
        let sizes: Vec<usize> = RecordBatches::new(&source, 2)
            .map(|b| b.unwrap().len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_batches_stop_after_error() {
        let source = Counting(9);
        let results: Vec<bool> = RecordBatches::new(&source, 5).map(|b| b.is_ok()).collect();
        assert_eq!(results, vec![true, false]);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            InputFormat::detect(Path::new("run_1.H5")).unwrap(),
            InputFormat::Hdf5Table
        );
        assert_eq!(
            InputFormat::detect(Path::new("x.dat")).unwrap(),
            InputFormat::Binary
        );
        assert!(InputFormat::detect(Path::new("x.root")).is_err());
        assert!(InputFormat::detect(Path::new("noext")).is_err());
    }

    #[test]
    fn test_channel_from_file_name() {
        let path = Path::new("/data/pds_waveforms_27360_wf_ep104_ch17.dat");
        assert_eq!(channel_from_file_name(path), Some(17));
        assert_eq!(channel_from_file_name(Path::new("dump.dat")), None);
    }
}
