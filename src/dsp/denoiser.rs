//! Spectral Noise Reduction (offline)
//!
//! # Perceptual Contract
//! - **Target Source**: Recorded speech with a stationary noise bed (hiss, hum, fan).
//! - **Intended Effect**: Pull down bins where the noise estimate dominates.
//! - **Failure Modes**:
//!   - Musical noise from the threshold strategy on dense material.
//!   - Speech thinning if the noise-learning window contains speech.
//! - **Will Not Do**:
//!   - Track non-stationary noise (the noise profile is learned once).
//!
//! # Strategies
//! 1. **MMSE gain**: a Wiener-style gain `|X|^2 / (|X|^2 + N + eps)` per bin,
//!    where `N` is the mean power spectrum of the leading noise window.
//! 2. **Magnitude threshold**: bins below the median magnitude of the whole
//!    spectrogram are zeroed; phase is kept.
//!
//! Both reconstruct to the exact input length.

use crate::dsp::stft::{Spectrogram, Stft};
use crate::dsp::utils::median;
use crate::error::Result;
use log::debug;
use serde::{Deserialize, Serialize};

// Keeps the Wiener gain defined when signal and noise power are both zero.
const MMSE_EPS: f32 = 1e-8;

pub const DEFAULT_NOISE_ESTIMATION_SECS: f32 = 1.0;

/// A noise-suppression strategy over one time-domain channel.
pub trait NoiseReducer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns a denoised copy of `signal`, same length.
    fn reduce(&self, signal: &[f32], sample_rate: u32) -> Result<Vec<f32>>;
}

/// Which noise reducer the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum NoiseReduction {
    Mmse {
        /// Leading seconds used to learn the noise spectrum.
        noise_estimation_secs: f32,
        /// Estimate and reconstruct on the mono fold, then duplicate to both channels.
        mono_fold: bool,
    },
    MagnitudeThreshold,
}

impl Default for NoiseReduction {
    fn default() -> Self {
        NoiseReduction::Mmse {
            noise_estimation_secs: DEFAULT_NOISE_ESTIMATION_SECS,
            mono_fold: false,
        }
    }
}

impl NoiseReduction {
    pub fn build(&self) -> Box<dyn NoiseReducer> {
        match *self {
            NoiseReduction::Mmse {
                noise_estimation_secs,
                ..
            } => Box::new(MmseDenoiser::new(noise_estimation_secs)),
            NoiseReduction::MagnitudeThreshold => Box::new(ThresholdDenoiser::new()),
        }
    }

    pub fn folds_to_mono(&self) -> bool {
        matches!(self, NoiseReduction::Mmse { mono_fold: true, .. })
    }
}

// -----------------------------------------------------------------------------
// MMSE
// -----------------------------------------------------------------------------

pub struct MmseDenoiser {
    stft: Stft,
    noise_estimation_secs: f32,
}

impl MmseDenoiser {
    pub fn new(noise_estimation_secs: f32) -> Self {
        Self {
            stft: Stft::default(),
            noise_estimation_secs: noise_estimation_secs.max(0.0),
        }
    }

    /// Number of leading samples used for the noise estimate: at least one,
    /// never more than the signal.
    pub fn noise_window_len(&self, signal_len: usize, sample_rate: u32) -> usize {
        let n = (self.noise_estimation_secs * sample_rate as f32) as usize;
        n.max(1).min(signal_len)
    }

    /// Mean power spectrum of the leading noise window.
    pub fn estimate_noise_psd(&self, signal: &[f32], sample_rate: u32) -> Vec<f32> {
        let len = self.noise_window_len(signal.len(), sample_rate);
        let spec = self.stft.analyze(&signal[..len]);

        let mut psd = vec![0.0f32; spec.bins];
        for frame in &spec.frames {
            for (p, c) in psd.iter_mut().zip(frame) {
                *p += c.norm_sqr();
            }
        }
        let frames = spec.num_frames().max(1) as f32;
        for p in &mut psd {
            *p /= frames;
        }
        psd
    }
}

impl NoiseReducer for MmseDenoiser {
    fn name(&self) -> &'static str {
        "mmse"
    }

    fn reduce(&self, signal: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        if signal.is_empty() {
            return Ok(Vec::new());
        }

        let noise = self.estimate_noise_psd(signal, sample_rate);
        let mut spec = self.stft.analyze(signal);

        for frame in &mut spec.frames {
            for (c, &n) in frame.iter_mut().zip(&noise) {
                let p = c.norm_sqr();
                *c *= p / (p + n + MMSE_EPS);
            }
        }

        debug!(
            "mmse: {} frames, noise window {} samples",
            spec.num_frames(),
            self.noise_window_len(signal.len(), sample_rate)
        );
        self.stft.synthesize(&spec, signal.len())
    }
}

// -----------------------------------------------------------------------------
// Magnitude threshold
// -----------------------------------------------------------------------------

pub struct ThresholdDenoiser {
    stft: Stft,
}

impl Default for ThresholdDenoiser {
    fn default() -> Self {
        Self::new()
    }
}

impl ThresholdDenoiser {
    pub fn new() -> Self {
        Self {
            stft: Stft::default(),
        }
    }
}

impl NoiseReducer for ThresholdDenoiser {
    fn name(&self) -> &'static str {
        "magnitude_threshold"
    }

    fn reduce(&self, signal: &[f32], _sample_rate: u32) -> Result<Vec<f32>> {
        if signal.is_empty() {
            return Ok(Vec::new());
        }

        let mut spec = self.stft.analyze(signal);
        self.apply_threshold(&mut spec);
        self.stft.synthesize(&spec, signal.len())
    }
}

impl ThresholdDenoiser {
    /// Zero every bin whose magnitude is below the median over the whole
    /// spectrogram. Bins at or above it keep magnitude and phase. Returns the
    /// median.
    pub fn apply_threshold(&self, spec: &mut Spectrogram) -> f32 {
        let all: Vec<f32> = spec.magnitudes().into_iter().flatten().collect();
        let threshold = median(&all);

        let mut zeroed = 0usize;
        for frame in &mut spec.frames {
            for c in frame.iter_mut() {
                if c.norm() < threshold {
                    *c = Default::default();
                    zeroed += 1;
                }
            }
        }

        debug!(
            "threshold: median magnitude {:.3e}, zeroed {} of {} bins",
            threshold,
            zeroed,
            all.len()
        );
        threshold
    }
}
