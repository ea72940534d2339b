//! Baseline and charge extraction.
//!
//! The baseline is the truncated integer mean of a leading sample window.
//! The charge is the sum of baseline-subtracted samples over an interior
//! window. Windows are half-open sample ranges and are never clipped: a
//! window past the end of the trace is an error.

use crate::record::SAMPLES_PER_WAVEFORM;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Half-open sample range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleWindow {
    /// First sample included.
    pub start: usize,
    /// First sample excluded.
    pub end: usize,
}

impl SampleWindow {
    /// Creates a window.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of samples covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the window covers no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the window out of `samples`.
    ///
    /// # Errors
    /// Returns [`Error::WindowOutOfRange`] if the window ends past the trace,
    /// or [`Error::ConfigError`] if it is inverted.
    pub fn slice<'a, T>(&self, samples: &'a [T]) -> Result<&'a [T]> {
        if self.start > self.end {
            return Err(Error::ConfigError(format!(
                "inverted sample window [{}, {})",
                self.start, self.end
            )));
        }
        samples.get(self.start..self.end).ok_or(Error::WindowOutOfRange {
            start: self.start,
            end: self.end,
            len: samples.len(),
        })
    }
}

/// Window configuration for feature extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Baseline window length; the baseline uses samples `[0, baseline_window)`.
    pub baseline_window: usize,
    /// Charge integration window.
    pub charge_window: SampleWindow,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            baseline_window: 100,
            charge_window: SampleWindow::new(134, 170),
        }
    }
}

impl FeatureConfig {
    /// Set the baseline window length.
    #[must_use]
    pub fn with_baseline_window(mut self, len: usize) -> Self {
        self.baseline_window = len;
        self
    }

    /// Set the charge window.
    #[must_use]
    pub fn with_charge_window(mut self, start: usize, end: usize) -> Self {
        self.charge_window = SampleWindow::new(start, end);
        self
    }

    /// Checks both windows against the fixed waveform length.
    ///
    /// # Errors
    /// Returns an error if a window is empty, inverted or out of range.
    pub fn validate(&self) -> Result<()> {
        if self.baseline_window == 0 {
            return Err(Error::ConfigError(
                "baseline window must contain at least one sample".to_string(),
            ));
        }
        if self.baseline_window > SAMPLES_PER_WAVEFORM {
            return Err(Error::WindowOutOfRange {
                start: 0,
                end: self.baseline_window,
                len: SAMPLES_PER_WAVEFORM,
            });
        }
        let window = self.charge_window;
        if window.start > window.end {
            return Err(Error::ConfigError(format!(
                "inverted charge window [{}, {})",
                window.start, window.end
            )));
        }
        if window.end > SAMPLES_PER_WAVEFORM {
            return Err(Error::WindowOutOfRange {
                start: window.start,
                end: window.end,
                len: SAMPLES_PER_WAVEFORM,
            });
        }
        Ok(())
    }
}

/// Features extracted from one waveform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaveformFeatures {
    /// Integer baseline.
    pub baseline: i32,
    /// Baseline-subtracted charge.
    pub charge: i64,
}

/// Integer mean of `samples[0..window_len]`, truncated toward zero.
///
/// # Errors
/// Returns an error if `window_len` is zero or exceeds the sample count.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn baseline<T: Copy + Into<i64>>(samples: &[T], window_len: usize) -> Result<i32> {
    if window_len == 0 {
        return Err(Error::ConfigError(
            "baseline window must contain at least one sample".to_string(),
        ));
    }
    let window = SampleWindow::new(0, window_len).slice(samples)?;
    let sum: i64 = window.iter().map(|&s| s.into()).sum();
    // Mean of sample values is bounded by the sample type, which fits i32.
    Ok((sum / window_len as i64) as i32)
}

/// Sum of `sample - baseline` over `window`.
///
/// # Errors
/// Returns an error if the window is inverted or exceeds the sample count.
pub fn charge<T: Copy + Into<i64>>(samples: &[T], baseline: i32, window: SampleWindow) -> Result<i64> {
    let window = window.slice(samples)?;
    let base = i64::from(baseline);
    Ok(window.iter().map(|&s| s.into() - base).sum())
}

/// Computes baseline and charge with the configured windows.
///
/// # Errors
/// Returns an error if either window does not fit the samples.
pub fn extract_features<T: Copy + Into<i64>>(
    samples: &[T],
    config: &FeatureConfig,
) -> Result<WaveformFeatures> {
    let baseline = baseline(samples, config.baseline_window)?;
    let charge = charge(samples, baseline, config.charge_window)?;
    Ok(WaveformFeatures { baseline, charge })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Vec<i16> {
        (0..SAMPLES_PER_WAVEFORM)
            .map(|i| i16::try_from(i % 50).unwrap())
            .collect()
    }

    #[test]
    fn test_baseline_is_integer_mean() {
        let samples: Vec<i16> = vec![10, 11, 12, 14];
        // 47 / 4 = 11.75 -> 11
        assert_eq!(baseline(&samples, 4).unwrap(), 11);
        assert_eq!(baseline(&samples, 2).unwrap(), 10);
    }

    #[test]
    fn test_baseline_truncates_toward_zero() {
        let samples: Vec<i16> = vec![-3, -4];
        // -7 / 2 = -3.5 -> -3
        assert_eq!(baseline(&samples, 2).unwrap(), -3);
    }

    #[test]
    fn test_baseline_window_out_of_range() {
        let samples = vec![0i16; 50];
        let err = baseline(&samples, 100).unwrap_err();
        assert!(matches!(
            err,
            Error::WindowOutOfRange {
                start: 0,
                end: 100,
                len: 50
            }
        ));
        assert!(baseline(&samples, 0).is_err());
    }

    #[test]
    fn test_charge_subtracts_baseline() {
        let samples: Vec<i16> = vec![100, 100, 110, 130, 120, 100];
        let q = charge(&samples, 100, SampleWindow::new(2, 5)).unwrap();
        assert_eq!(q, 10 + 30 + 20);
    }

    #[test]
    fn test_charge_empty_window_is_zero() {
        let samples = ramp();
        assert_eq!(charge(&samples, 7, SampleWindow::new(20, 20)).unwrap(), 0);
    }

    #[test]
    fn test_charge_window_errors() {
        let samples = vec![0i16; 200];
        assert!(matches!(
            charge(&samples, 0, SampleWindow::new(150, 201)),
            Err(Error::WindowOutOfRange { .. })
        ));
        assert!(matches!(
            charge(&samples, 0, SampleWindow::new(10, 5)),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_charge_ignores_samples_outside_window() {
        let samples = ramp();
        let window = SampleWindow::new(134, 170);
        let reference = charge(&samples, 5, window).unwrap();

        let shifted: Vec<i16> = samples
            .iter()
            .enumerate()
            .map(|(i, &s)| if (134..170).contains(&i) { s } else { s + 500 })
            .collect();
        assert_eq!(charge(&shifted, 5, window).unwrap(), reference);
    }

    #[test]
    fn test_extract_features_defaults() {
        let mut samples = vec![1000i16; SAMPLES_PER_WAVEFORM];
        for s in &mut samples[134..170] {
            *s = 1010;
        }
        let features = extract_features(&samples, &FeatureConfig::default()).unwrap();
        assert_eq!(features.baseline, 1000);
        assert_eq!(features.charge, 36 * 10);
    }

    #[test]
    fn test_extract_features_unsigned_samples() {
        let samples = vec![8000u16; SAMPLES_PER_WAVEFORM];
        let features = extract_features(&samples, &FeatureConfig::default()).unwrap();
        assert_eq!(features.baseline, 8000);
        assert_eq!(features.charge, 0);
    }

    #[test]
    fn test_feature_config_validate() {
        assert!(FeatureConfig::default().validate().is_ok());
        assert!(FeatureConfig::default()
            .with_baseline_window(0)
            .validate()
            .is_err());
        assert!(FeatureConfig::default()
            .with_baseline_window(2000)
            .validate()
            .is_err());
        assert!(FeatureConfig::default()
            .with_charge_window(170, 134)
            .validate()
            .is_err());
        assert!(FeatureConfig::default()
            .with_charge_window(1000, 1025)
            .validate()
            .is_err());
    }
}
