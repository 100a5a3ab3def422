pub mod config;
pub mod dsp;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod profile;
pub mod report;
pub mod sink;
pub mod spectrum;
pub mod stoi;

pub use crate::config::{LmsConfig, PipelineConfig, PipelinePreset, ShapingStep};
pub use crate::error::{EnhanceError, Result};
pub use crate::pipeline::{Pipeline, PipelineOutput, PipelineState};
pub use crate::profile::{Ear, EarProfile, HearingProfile, TuningGain, STANDARD_FREQUENCIES};
pub use crate::report::{Metrics, ProcessingReport, QualityReporter, StereoBalance};
pub use crate::sink::{CsvReportSink, ReportSink};
pub use crate::stoi::StoiEstimator;

use crate::dsp::utils::mono_fold;

// =============================================================================
// CANONICAL DATA STRUCTURES
// =============================================================================

/// Two-channel audio at a fixed sample rate.
///
/// Once normalized, `left.len() == right.len()`. Amplitude is not clamped;
/// clipping is left to whoever writes the result out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioBuffer {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Build a normalized buffer from decoded channels. One channel is
    /// duplicated to pseudo-stereo; channels past the second are dropped.
    pub fn from_channels(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(EnhanceError::Load("sample rate must be positive".into()));
        }
        let (left, right) = match channels.len() {
            0 => return Err(EnhanceError::Load("input has no audio channels".into())),
            1 => {
                let mono = channels.remove(0);
                (mono.clone(), mono)
            }
            _ => {
                channels.truncate(2);
                let right = channels.remove(1);
                let left = channels.remove(0);
                (left, right)
            }
        };
        Ok(Self::stereo(left, right, sample_rate))
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Self {
        let mut buf = Self {
            left,
            right,
            sample_rate,
        };
        buf.normalize();
        buf
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::stereo(samples.clone(), samples, sample_rate)
    }

    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::stereo(vec![0.0; len], vec![0.0; len], sample_rate)
    }

    /// Zero-pad the shorter channel on the right. Idempotent.
    pub fn normalize(&mut self) {
        let n = self.left.len().max(self.right.len());
        self.left.resize(n, 0.0);
        self.right.resize(n, 0.0);
    }

    pub fn is_normalized(&self) -> bool {
        self.left.len() == self.right.len()
    }

    /// Frames per channel (the longer channel if not normalized).
    pub fn len(&self) -> usize {
        self.left.len().max(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Per-sample channel mean.
    pub fn mono_fold(&self) -> Vec<f32> {
        mono_fold(&self.left, &self.right)
    }

    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(&self.right)
            .fold(0.0f32, |m, v| m.max(v.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_is_duplicated() {
        let buf = AudioBuffer::from_channels(vec![vec![0.1, 0.2, 0.3]], 16000).unwrap();
        assert_eq!(buf.left, buf.right);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_extra_channels_dropped() {
        let buf =
            AudioBuffer::from_channels(vec![vec![1.0], vec![2.0], vec![3.0]], 48000).unwrap();
        assert_eq!(buf.left, vec![1.0]);
        assert_eq!(buf.right, vec![2.0]);
    }

    #[test]
    fn test_unequal_channels_are_padded() {
        let buf = AudioBuffer::stereo(vec![1.0, 2.0, 3.0], vec![4.0], 16000);
        assert!(buf.is_normalized());
        assert_eq!(buf.right, vec![4.0, 0.0, 0.0]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut once = AudioBuffer {
            left: vec![0.5; 7],
            right: vec![0.25; 3],
            sample_rate: 8000,
        };
        once.normalize();
        let mut twice = once.clone();
        twice.normalize();
        assert_eq!(once, twice);
        assert_eq!(once.left.len(), once.right.len());
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            AudioBuffer::from_channels(vec![], 16000),
            Err(EnhanceError::Load(_))
        ));
        assert!(matches!(
            AudioBuffer::from_channels(vec![vec![0.0]], 0),
            Err(EnhanceError::Load(_))
        ));
    }

    #[test]
    fn test_mono_fold_and_duration() {
        let buf = AudioBuffer::stereo(vec![1.0, 0.0], vec![0.0, 1.0], 2);
        assert_eq!(buf.mono_fold(), vec![0.5, 0.5]);
        assert_eq!(buf.duration_secs(), 1.0);
        assert_eq!(buf.peak(), 1.0);
    }
}
