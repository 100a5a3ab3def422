//! Short-Time Objective Intelligibility (STOI)
//!
//! Correlates the one-third-octave band envelopes of a clean reference and a
//! processed signal over 384 ms segments and averages the result; 1.0 means
//! the envelopes match.
//!
//! # Framing
//! - Analysis frames last 25.6 ms with 50% overlap (256 samples at 10 kHz)
//!   and are taken at the input rate directly, without resampling
//! - Frames more than 40 dB below the loudest reference frame are dropped
//!   from both signals
//! - 15 bands centered from 150 Hz upward in third-octave steps
//! - Segments of 30 frames; the processed envelope is normalized to the
//!   reference energy and clipped at a -15 dB signal-to-distortion ratio

use crate::dsp::utils::make_hann_window;
use crate::report::QualityEstimator;
use anyhow::{bail, Result};
use log::debug;
use rustfft::{num_complex::Complex, FftPlanner};

const FRAME_SECS: f64 = 0.0256;
const NUM_BANDS: usize = 15;
const MIN_CENTER_HZ: f64 = 150.0;
const SEGMENT_FRAMES: usize = 30;
const DYN_RANGE_DB: f64 = 40.0;
const BETA_DB: f64 = -15.0;
const EPS: f64 = 1e-12;
// Frame level of an all-zero reference.
const SILENCE_DB: f64 = -200.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct StoiEstimator;

impl StoiEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl QualityEstimator for StoiEstimator {
    fn name(&self) -> &str {
        "stoi"
    }

    fn estimate(&self, reference: &[f32], degraded: &[f32], sample_rate: u32) -> Result<f64> {
        stoi(reference, degraded, sample_rate)
    }
}

pub fn stoi(reference: &[f32], degraded: &[f32], sample_rate: u32) -> Result<f64> {
    if sample_rate == 0 {
        bail!("sample rate must be positive");
    }
    let frame_len = ((FRAME_SECS * sample_rate as f64).round() as usize).max(2);
    let hop = frame_len / 2;
    let n_fft = (2 * frame_len).next_power_of_two();
    let nyquist = sample_rate as f64 / 2.0;

    let top_edge = MIN_CENTER_HZ * 2f64.powf((NUM_BANDS - 1) as f64 / 3.0 + 1.0 / 6.0);
    if top_edge > nyquist {
        bail!(
            "sample rate {} Hz is too low for the top band edge ({:.0} Hz)",
            sample_rate,
            top_edge
        );
    }

    let len = reference.len().min(degraded.len());
    let window: Vec<f64> = make_hann_window(frame_len)
        .into_iter()
        .map(f64::from)
        .collect();
    let starts = active_frames(&reference[..len], &window, hop);
    if starts.len() < SEGMENT_FRAMES {
        bail!(
            "{} active frames, need at least {}",
            starts.len(),
            SEGMENT_FRAMES
        );
    }

    let bands = band_bins(n_fft, sample_rate);
    let x_env = band_envelopes(reference, &starts, &window, n_fft, &bands);
    let y_env = band_envelopes(degraded, &starts, &window, n_fft, &bands);

    let clip = 1.0 + 10f64.powf(-BETA_DB / 20.0);
    let frames = starts.len();
    let mut total = 0.0f64;
    let mut count = 0usize;
    for end in SEGMENT_FRAMES..=frames {
        for b in 0..NUM_BANDS {
            let x = &x_env[b][end - SEGMENT_FRAMES..end];
            let y = &y_env[b][end - SEGMENT_FRAMES..end];
            let alpha = norm(x) / (norm(y) + EPS);
            let y_clipped: Vec<f64> = x
                .iter()
                .zip(y)
                .map(|(&xv, &yv)| (alpha * yv).min(clip * xv))
                .collect();
            total += correlation(x, &y_clipped);
            count += 1;
        }
    }

    let score = total / count as f64;
    debug!("stoi: {} frames, {} segments, score {:.4}", frames, count / NUM_BANDS, score);
    Ok(score)
}

/// Start offsets of frames within `DYN_RANGE_DB` of the loudest frame; empty
/// when the reference is silent.
fn active_frames(signal: &[f32], window: &[f64], hop: usize) -> Vec<usize> {
    let frame_len = window.len();
    if signal.len() < frame_len {
        return Vec::new();
    }
    let energies: Vec<(usize, f64)> = (0..=signal.len() - frame_len)
        .step_by(hop)
        .map(|start| {
            let e: f64 = signal[start..start + frame_len]
                .iter()
                .zip(window)
                .map(|(&s, &w)| (s as f64 * w).powi(2))
                .sum();
            (start, 20.0 * (e.sqrt() + EPS).log10())
        })
        .collect();
    let max_db = energies
        .iter()
        .map(|&(_, db)| db)
        .fold(f64::NEG_INFINITY, f64::max);
    if max_db <= SILENCE_DB {
        return Vec::new();
    }
    energies
        .into_iter()
        .filter(|&(_, db)| db > max_db - DYN_RANGE_DB)
        .map(|(start, _)| start)
        .collect()
}

/// FFT bin ranges of the third-octave bands.
fn band_bins(n_fft: usize, sample_rate: u32) -> Vec<(usize, usize)> {
    let bin_hz = sample_rate as f64 / n_fft as f64;
    (0..NUM_BANDS)
        .map(|k| {
            let center = MIN_CENTER_HZ * 2f64.powf(k as f64 / 3.0);
            let lo = (center * 2f64.powf(-1.0 / 6.0) / bin_hz).round() as usize;
            let hi = (center * 2f64.powf(1.0 / 6.0) / bin_hz).round() as usize;
            (lo, hi.max(lo + 1))
        })
        .collect()
}

/// Band envelope per frame, `[band][frame]`.
fn band_envelopes(
    signal: &[f32],
    starts: &[usize],
    window: &[f64],
    n_fft: usize,
    bands: &[(usize, usize)],
) -> Vec<Vec<f64>> {
    let fft = FftPlanner::<f64>::new().plan_fft_forward(n_fft);
    let mut buf = vec![Complex::new(0.0f64, 0.0); n_fft];
    let mut env = vec![Vec::with_capacity(starts.len()); bands.len()];

    for &start in starts {
        buf.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
        for (i, &w) in window.iter().enumerate() {
            let s = signal.get(start + i).copied().unwrap_or(0.0) as f64;
            buf[i] = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buf);
        for (band, &(lo, hi)) in env.iter_mut().zip(bands) {
            let power: f64 = buf[lo..hi].iter().map(|c| c.norm_sqr()).sum();
            band.push(power.sqrt());
        }
    }
    env
}

fn norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let mx = x.iter().sum::<f64>() / x.len() as f64;
    let my = y.iter().sum::<f64>() / y.len() as f64;
    let mut num = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    for (&a, &b) in x.iter().zip(y) {
        num += (a - mx) * (b - my);
        sx += (a - mx) * (a - mx);
        sy += (b - my) * (b - my);
    }
    num / (sx.sqrt() * sy.sqrt() + EPS)
}
