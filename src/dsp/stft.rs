//! Short-Time Fourier Transform (offline)
//!
//! Whole-recording analysis and resynthesis used by the noise reducers, the
//! audiogram stage, the quality metrics and the spectrum export.
//!
//! # Framing
//! - Periodic Hann window, `n_fft` = 2048 and hop = 512 by default
//! - Frames are centered: the signal is zero-padded by `n_fft / 2` on both
//!   sides, so frame `t` is centered on sample `t * hop`
//! - Resynthesis is weighted overlap-add normalized by the summed squared
//!   window, then trimmed (or zero-padded) to the requested length

use crate::dsp::utils::make_hann_window;
use crate::error::{EnhanceError, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

pub const DEFAULT_N_FFT: usize = 2048;
pub const DEFAULT_HOP: usize = DEFAULT_N_FFT / 4;

// Overlap-add normalization floor.
const WSUM_EPS: f32 = 1e-10;

/// Frame-major complex spectrogram holding the non-negative frequency bins.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub frames: Vec<Vec<Complex<f32>>>,
    pub bins: usize,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Magnitude of every bin of every frame.
    pub fn magnitudes(&self) -> Vec<Vec<f32>> {
        self.frames
            .iter()
            .map(|f| f.iter().map(|c| c.norm()).collect())
            .collect()
    }

    /// Scale each frame's bins by a per-bin gain, leaving phase untouched.
    pub fn apply_bin_gains(&mut self, gains: &[f32]) -> Result<()> {
        if gains.len() != self.bins {
            return Err(EnhanceError::Transform(format!(
                "gain curve has {} bins, spectrogram has {}",
                gains.len(),
                self.bins
            )));
        }
        for frame in &mut self.frames {
            for (c, &g) in frame.iter_mut().zip(gains) {
                *c *= g;
            }
        }
        Ok(())
    }
}

pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
}

impl Default for Stft {
    fn default() -> Self {
        Self::build(DEFAULT_N_FFT, DEFAULT_HOP)
    }
}

impl Stft {
    /// `n_fft` must be even and at least 2; `hop` must be in `1..=n_fft`.
    pub fn new(n_fft: usize, hop: usize) -> Result<Self> {
        if n_fft < 2 || n_fft % 2 != 0 {
            return Err(EnhanceError::Transform(format!(
                "n_fft must be even and >= 2, got {}",
                n_fft
            )));
        }
        if hop == 0 || hop > n_fft {
            return Err(EnhanceError::Transform(format!(
                "hop must be in 1..={}, got {}",
                n_fft, hop
            )));
        }
        Ok(Self::build(n_fft, hop))
    }

    fn build(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            n_fft,
            hop,
            window: make_hann_window(n_fft),
            fft: planner.plan_fft_forward(n_fft),
            ifft: planner.plan_fft_inverse(n_fft),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Bin center frequencies, linearly spaced from 0 Hz to Nyquist.
    pub fn frequencies(&self, sample_rate: u32) -> Vec<f32> {
        let nyquist = sample_rate as f32 / 2.0;
        let last = (self.bins() - 1) as f32;
        (0..self.bins())
            .map(|i| nyquist * i as f32 / last)
            .collect()
    }

    pub fn num_frames(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    pub fn analyze(&self, signal: &[f32]) -> Spectrogram {
        let n = self.n_fft;
        let half = n / 2;
        let bins = self.bins();
        let frames_len = self.num_frames(signal.len());

        let mut padded = vec![0.0f32; signal.len() + n];
        padded[half..half + signal.len()].copy_from_slice(signal);

        let mut scratch = vec![Complex::default(); self.fft.get_inplace_scratch_len()];
        let mut buf = vec![Complex::default(); n];
        let mut frames = Vec::with_capacity(frames_len);

        for t in 0..frames_len {
            let start = t * self.hop;
            for i in 0..n {
                buf[i] = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.fft.process_with_scratch(&mut buf, &mut scratch);
            frames.push(buf[..bins].to_vec());
        }

        Spectrogram { frames, bins }
    }

    /// Inverse transform back to exactly `length` samples.
    pub fn synthesize(&self, spec: &Spectrogram, length: usize) -> Result<Vec<f32>> {
        let n = self.n_fft;
        let half = n / 2;
        let bins = self.bins();

        if spec.bins != bins {
            return Err(EnhanceError::Transform(format!(
                "spectrogram has {} bins, expected {} for n_fft={}",
                spec.bins, bins, n
            )));
        }
        if spec.frames.is_empty() {
            return Ok(vec![0.0; length]);
        }

        let total = n + self.hop * (spec.frames.len() - 1);
        let mut out = vec![0.0f32; total];
        let mut wsum = vec![0.0f32; total];

        let mut scratch = vec![Complex::default(); self.ifft.get_inplace_scratch_len()];
        let mut buf = vec![Complex::default(); n];
        let norm = 1.0 / n as f32;

        for (t, frame) in spec.frames.iter().enumerate() {
            if frame.len() != bins {
                return Err(EnhanceError::Transform(format!(
                    "frame {} has {} bins, expected {}",
                    t,
                    frame.len(),
                    bins
                )));
            }

            // Hermitian spectrum for a real inverse; DC and Nyquist are real.
            buf[0] = Complex::new(frame[0].re, 0.0);
            buf[half] = Complex::new(frame[half].re, 0.0);
            for i in 1..half {
                buf[i] = frame[i];
                buf[n - i] = frame[i].conj();
            }

            self.ifft.process_with_scratch(&mut buf, &mut scratch);

            let start = t * self.hop;
            for i in 0..n {
                let w = self.window[i];
                out[start + i] += buf[i].re * norm * w;
                wsum[start + i] += w * w;
            }
        }

        for (o, &w) in out.iter_mut().zip(&wsum) {
            if w > WSUM_EPS {
                *o /= w;
            }
        }

        let mut y: Vec<f32> = out.into_iter().skip(half).take(length).collect();
        y.resize(length, 0.0);
        Ok(y)
    }
}
