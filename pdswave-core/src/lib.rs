//! pdswave-core: Core types for DAPHNE photon detector waveform analysis.
//!
//! This crate provides the waveform record model, baseline and charge
//! extraction, fixed-range histograms, the offline channel map and the
//! detector-side plot layout.
//!

pub mod channel_map;
pub mod config;
pub mod error;
pub mod features;
pub mod histogram;
pub mod layout;
pub mod record;

pub use channel_map::{ChannelLocation, ChannelMap, ParsedChannelMap};
pub use config::{AnalysisConfig, InvalidChannelPolicy, PlotConfig};
pub use error::{Error, Result};
pub use features::{extract_features, FeatureConfig, SampleWindow, WaveformFeatures};
pub use histogram::{
    Bin, Binning, ChannelHistogramSet, ChannelHistograms, Histogram1D, Histogram2D,
    HistogramConfig,
};
pub use layout::{panel_title, LayoutConfig, PanelCell, SideLayout};
pub use record::{ChannelId, WaveformRecord, DEFAULT_CHANNEL_COUNT, SAMPLES_PER_WAVEFORM};
