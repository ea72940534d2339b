//! pdswave-analysis: Histogram accumulation over waveform records.
//!
//! - [`Accumulator`] - per-record feature extraction and histogram filling
//! - [`RunStatistics`] - processed/skipped record tallies
//! - [`accumulate`] - drive an accumulator over a stream of record batches
//!
#![warn(missing_docs)]

mod accumulator;

pub use accumulator::{accumulate, Accumulator, RunStatistics};

// Re-export core histogram types
pub use pdswave_core::histogram::{ChannelHistogramSet, ChannelHistograms};
