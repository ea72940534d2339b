//! Error types for pdswave-core.

use thiserror::Error;

/// Result type alias for pdswave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for pdswave operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A sample window reaches past the end of the waveform.
    #[error("sample window [{start}, {end}) exceeds waveform length {len}")]
    WindowOutOfRange { start: usize, end: usize, len: usize },

    /// Offline channel outside the configured channel range.
    #[error("invalid offline channel {channel} (expected 0..{limit})")]
    InvalidChannel { channel: i64, limit: usize },

    /// Two histograms with different binning were combined.
    #[error("histogram binning mismatch: {0}")]
    BinningMismatch(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
