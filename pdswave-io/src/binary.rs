//! Memory-mapped reader for raw single-channel waveform dumps.
//!
//! A dump is a sequence of little-endian records:
//! `npts: u32, timestamp: u64, adc: [u16; npts]`. Every record must hold
//! [`SAMPLES_PER_WAVEFORM`] samples.

use crate::source::RecordSource;
use crate::{Error, Result};
use memmap2::Mmap;
use pdswave_core::record::{WaveformRecord, SAMPLES_PER_WAVEFORM};
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

const HEADER_BYTES: usize = 4 + 8;

/// Bytes per record in a dump.
pub const RECORD_BYTES: usize = HEADER_BYTES + 2 * SAMPLES_PER_WAVEFORM;

/// A memory-mapped waveform dump for one channel.
pub struct BinaryWaveformReader {
    mmap: Mmap,
    path: PathBuf,
    channel: i32,
}

impl BinaryWaveformReader {
    /// Opens a dump whose records all belong to `channel`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or its size is not a
    /// whole number of records.
    pub fn open<P: AsRef<Path>>(path: P, channel: i32) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        let path = path.as_ref().to_path_buf();
        if mmap.len() % RECORD_BYTES != 0 {
            return Err(Error::InvalidFormat(format!(
                "{}: {} bytes is not a multiple of the {RECORD_BYTES}-byte record",
                path.display(),
                mmap.len()
            )));
        }
        Ok(Self { mmap, path, channel })
    }

    /// Channel assigned to every record.
    #[must_use]
    pub fn channel(&self) -> i32 {
        self.channel
    }

    fn record_at(&self, index: usize) -> Result<WaveformRecord> {
        let offset = index * RECORD_BYTES;
        let bytes = &self.mmap[offset..offset + RECORD_BYTES];
        let (npts, rest) = bytes.split_at(4);
        let (timestamp, adc) = rest.split_at(8);

        let npts = u32::from_le_bytes([npts[0], npts[1], npts[2], npts[3]]);
        if usize::try_from(npts).ok() != Some(SAMPLES_PER_WAVEFORM) {
            return Err(Error::InvalidFormat(format!(
                "{}: record {index} has {npts} samples, expected {SAMPLES_PER_WAVEFORM}",
                self.path.display()
            )));
        }
        let mut ts = [0u8; 8];
        ts.copy_from_slice(timestamp);

        let samples = adc
            .chunks_exact(2)
            .map(|pair| {
                let raw = u16::from_le_bytes([pair[0], pair[1]]);
                i16::try_from(raw).map_err(|_| {
                    Error::InvalidFormat(format!(
                        "{}: record {index} sample {raw} exceeds the ADC range",
                        self.path.display()
                    ))
                })
            })
            .collect::<Result<Vec<i16>>>()?;

        let mut record = WaveformRecord::from_samples(self.channel, samples);
        record.timestamp = u64::from_le_bytes(ts);
        Ok(record)
    }
}

impl RecordSource for BinaryWaveformReader {
    fn len(&self) -> usize {
        self.mmap.len() / RECORD_BYTES
    }

    fn read_range(&self, start: usize, end: usize) -> Result<Vec<WaveformRecord>> {
        let end = end.min(self.len());
        if start >= end {
            return Ok(Vec::new());
        }
        (start..end)
            .into_par_iter()
            .map(|i| self.record_at(i))
            .collect()
    }
}

/// Encode records in the dump layout. Only the timestamp and samples are kept.
///
/// # Errors
/// Returns an error if a record does not hold exactly
/// [`SAMPLES_PER_WAVEFORM`] non-negative samples.
pub fn encode_dump(records: &[WaveformRecord]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(records.len() * RECORD_BYTES);
    for record in records {
        if record.adc.len() != SAMPLES_PER_WAVEFORM {
            return Err(Error::InvalidFormat(format!(
                "record has {} samples, expected {SAMPLES_PER_WAVEFORM}",
                record.adc.len()
            )));
        }
        let npts = u32::try_from(SAMPLES_PER_WAVEFORM)
            .map_err(|_| Error::InvalidFormat("record too long".to_string()))?;
        out.extend_from_slice(&npts.to_le_bytes());
        out.extend_from_slice(&record.timestamp.to_le_bytes());
        for &s in &record.adc {
            let raw = u16::try_from(s)
                .map_err(|_| Error::InvalidFormat(format!("negative sample {s}")))?;
            out.extend_from_slice(&raw.to_le_bytes());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RecordBatches;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(ts: u64, level: i16) -> WaveformRecord {
        let mut r = WaveformRecord::from_samples(0, vec![level; SAMPLES_PER_WAVEFORM]);
        r.adc[150] = level + 40;
        r.timestamp = ts;
        r
    }

    fn dump(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_dump() {
        let records = vec![record(11, 8000), record(12, 8100), record(13, 7900)];
        let file = dump(&encode_dump(&records).unwrap());

        let reader = BinaryWaveformReader::open(file.path(), 42).unwrap();
        assert_eq!(reader.len(), 3);
        let read = reader.read_range(0, 3).unwrap();
        assert_eq!(read[1].timestamp, 12);
        assert_eq!(read[1].offline_channel, 42);
        assert_eq!(read[1].adc[150], 8140);
        assert_eq!(read[2].adc[0], 7900);

        let batches: Vec<usize> = RecordBatches::new(&reader, 2)
            .map(|b| b.unwrap().len())
            .collect();
        assert_eq!(batches, vec![2, 1]);
    }

    #[test]
    fn test_empty_dump() {
        let file = dump(&[]);
        let reader = BinaryWaveformReader::open(file.path(), 0).unwrap();
        assert!(reader.is_empty());
        assert!(reader.read_range(0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_dump() {
        let mut bytes = encode_dump(&[record(1, 100)]).unwrap();
        bytes.pop();
        let file = dump(&bytes);
        assert!(matches!(
            BinaryWaveformReader::open(file.path(), 0),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_wrong_sample_count() {
        let mut bytes = encode_dump(&[record(1, 100)]).unwrap();
        bytes[0..4].copy_from_slice(&512u32.to_le_bytes());
        let file = dump(&bytes);
        let reader = BinaryWaveformReader::open(file.path(), 0).unwrap();
        let err = reader.read_range(0, 1).unwrap_err();
        assert!(err.to_string().contains("512 samples"), "{err}");
    }

    #[test]
    fn test_sample_beyond_adc_range() {
        let mut bytes = encode_dump(&[record(1, 100)]).unwrap();
        bytes[HEADER_BYTES..HEADER_BYTES + 2].copy_from_slice(&0xFFFFu16.to_le_bytes());
        let file = dump(&bytes);
        let reader = BinaryWaveformReader::open(file.path(), 0).unwrap();
        assert!(reader.read_range(0, 1).is_err());
    }
}
