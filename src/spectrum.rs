//! Long-term average spectrum for plotting.
//!
//! The visualizer only reads audio and profile; it never feeds back into the
//! pipeline. This module gives it the per-channel curve to draw: mean STFT
//! magnitude per bin, in dB, up to 8 kHz, smoothed across bins.

use crate::dsp::stft::Stft;
use crate::AudioBuffer;
use serde::{Deserialize, Serialize};

pub const MAX_PLOT_HZ: f32 = 8000.0;
const DB_FLOOR: f32 = 1e-8;
const SMOOTHING_SIGMA_BINS: f32 = 2.0;
// Kernel reaches out to 4 sigma.
const KERNEL_TRUNCATE: f32 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumData {
    pub freqs: Vec<f32>,
    pub left_db: Vec<f32>,
    pub right_db: Vec<f32>,
}

impl SpectrumData {
    /// Smoothed level (dB) of the bin nearest `freq_hz` for each channel.
    pub fn level_near(&self, freq_hz: f32) -> Option<(f32, f32)> {
        let idx = self
            .freqs
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - freq_hz).abs().total_cmp(&(b.1 - freq_hz).abs()))?
            .0;
        Some((self.left_db[idx], self.right_db[idx]))
    }
}

pub fn average_spectrum(buf: &AudioBuffer) -> SpectrumData {
    average_spectrum_with(&Stft::default(), buf)
}

pub fn average_spectrum_with(stft: &Stft, buf: &AudioBuffer) -> SpectrumData {
    let freqs: Vec<f32> = stft
        .frequencies(buf.sample_rate)
        .into_iter()
        .take_while(|&f| f <= MAX_PLOT_HZ)
        .collect();
    let keep = freqs.len();

    let (left_db, right_db) = rayon::join(
        || channel_db(stft, &buf.left, keep),
        || channel_db(stft, &buf.right, keep),
    );
    SpectrumData {
        freqs,
        left_db,
        right_db,
    }
}

fn channel_db(stft: &Stft, signal: &[f32], keep: usize) -> Vec<f32> {
    let spec = stft.analyze(signal);
    let frames = spec.num_frames().max(1) as f32;

    let mut mean = vec![0.0f32; keep];
    for frame in &spec.frames {
        for (m, c) in mean.iter_mut().zip(frame) {
            *m += c.norm();
        }
    }
    let db: Vec<f32> = mean
        .iter()
        .map(|&m| 20.0 * (m / frames).max(DB_FLOOR).log10())
        .collect();
    gaussian_smooth(&db, SMOOTHING_SIGMA_BINS)
}

/// Gaussian smoothing with half-sample symmetric reflection at the edges.
pub fn gaussian_smooth(x: &[f32], sigma: f32) -> Vec<f32> {
    if x.is_empty() || sigma <= 0.0 {
        return x.to_vec();
    }
    let radius = (KERNEL_TRUNCATE * sigma + 0.5) as isize;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f32 / sigma).powi(2)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);

    let n = x.len() as isize;
    let reflect = |mut i: isize| -> usize {
        // Period 2n: d c b a | a b c d | d c b a
        let period = 2 * n;
        i = i.rem_euclid(period);
        if i >= n {
            i = period - 1 - i;
        }
        i as usize
    };

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(j, &w)| w * x[reflect(i + j as isize - radius)])
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_smoothing_keeps_constant_signal() {
        let x = vec![-20.0f32; 12];
        for v in gaussian_smooth(&x, 2.0) {
            assert!((v + 20.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_smoothing_spreads_an_impulse() {
        let mut x = vec![0.0f32; 41];
        x[20] = 1.0;
        let y = gaussian_smooth(&x, 2.0);
        let total: f32 = y.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(y[20] < 1.0 && y[20] > y[22] && y[22] > y[24]);
        assert!((y[18] - y[22]).abs() < 1e-6);
    }

    #[test]
    fn test_band_limit_and_silence_floor() {
        let buf = AudioBuffer::silence(4096, 44100);
        let s = average_spectrum(&buf);
        assert!(!s.freqs.is_empty());
        assert!(s.freqs.iter().all(|&f| f <= MAX_PLOT_HZ));
        assert_eq!(s.left_db.len(), s.freqs.len());
        for v in s.left_db.iter().chain(&s.right_db) {
            assert!((v + 160.0).abs() < 1e-2);
        }
    }

    #[test]
    fn test_tone_peak_shows_on_its_channel() {
        let sr = 16000;
        let tone: Vec<f32> = (0..16000)
            .map(|i| 0.5 * (2.0 * PI * 1000.0 * i as f32 / sr as f32).sin())
            .collect();
        let buf = AudioBuffer::stereo(tone, vec![0.0; 16000], sr);
        let s = average_spectrum(&buf);

        let (l_peak, r_peak) = s.level_near(1000.0).unwrap();
        let (l_far, _) = s.level_near(6000.0).unwrap();
        assert!(l_peak > l_far + 20.0);
        assert!(l_peak > r_peak + 100.0);
    }
}
