//! pdswave-io: Input readers and result writers for pdswave.
//!
//! This crate provides:
//! - HDF5 waveform table reading in record batches (feature `hdf5`)
//! - Memory-mapped reading of raw single-channel waveform dumps
//! - HDF5 result files with the per-channel histograms (feature `hdf5`)
//! - Channel map file loading and the JSON run summary
//!

pub mod binary;
pub mod channel_map;
mod error;
#[cfg(feature = "hdf5")]
pub mod results;
pub mod source;
pub mod summary;
#[cfg(feature = "hdf5")]
pub mod table;

pub use binary::BinaryWaveformReader;
pub use channel_map::load_channel_map;
pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use results::{read_results_hdf5, results_path, write_results_hdf5, StoredResults};
pub use source::{open_source, InputFormat, RecordBatches, RecordSource};
pub use summary::{summary_path, ChannelSummary, RunSummary};
#[cfg(feature = "hdf5")]
pub use table::{write_waveform_table, WaveformTableReader};
