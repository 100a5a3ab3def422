//! Shaping Filters
//!
//! Fixed-coefficient tone and level stages run after noise reduction:
//!
//! - HIGH-PITCH BOOST: zero-phase Butterworth high-pass mixed back on top of
//!   the dry signal
//! - VOCAL BOOST: flat gain on both channels
//! - CAPACITOR EFFECT: one-pole low-pass smoothing
//! - FINAL VOLUME: flat gain applied after the channels are remixed

use crate::dsp::biquad::Biquad;
use crate::dsp::utils::{apply_gain, db_to_gain};
use log::warn;

pub const DEFAULT_BOOST_CUTOFF_HZ: f32 = 3000.0;
pub const DEFAULT_BOOST_DB: f32 = 5.0;
pub const DEFAULT_VOCAL_GAIN: f32 = 1.1;
pub const DEFAULT_CAPACITOR_ALPHA: f32 = 0.3;
pub const DEFAULT_FINAL_VOLUME: f32 = 1.2;

/// `original + highpass(original) * 10^(boost_db / 20)`.
///
/// Identity when `cutoff_hz / nyquist` is outside (0, 1).
pub fn high_pitch_boost(input: &[f32], sample_rate: u32, cutoff_hz: f32, boost_db: f32) -> Vec<f32> {
    let nyquist = sample_rate as f32 / 2.0;
    let normalized = cutoff_hz / nyquist;
    if !(normalized > 0.0 && normalized < 1.0) {
        warn!(
            "high-pitch boost: cutoff {} Hz is outside (0, {}) Hz, stage bypassed",
            cutoff_hz, nyquist
        );
        return input.to_vec();
    }

    let hpf = Biquad::highpass(cutoff_hz, sample_rate as f32);
    let highs = hpf.filtfilt(input);
    let g = db_to_gain(boost_db);

    input
        .iter()
        .zip(&highs)
        .map(|(&x, &h)| x + h * g)
        .collect()
}

/// Flat gain on both channels.
pub fn vocal_boost(left: &mut [f32], right: &mut [f32], gain: f32) {
    apply_gain(left, gain);
    apply_gain(right, gain);
}

/// One-pole smoother `y[n] = alpha * x[n] - (alpha - 1) * y[n - 1]`,
/// starting from rest.
pub fn capacitor_effect(input: &[f32], alpha: f32) -> Vec<f32> {
    let feedback = alpha - 1.0;
    let mut prev = 0.0f32;
    input
        .iter()
        .map(|&x| {
            let y = alpha * x - feedback * prev;
            prev = y;
            y
        })
        .collect()
}

pub fn final_volume(left: &mut [f32], right: &mut [f32], gain: f32) {
    apply_gain(left, gain);
    apply_gain(right, gain);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_boost_bypassed_for_degenerate_cutoff() {
        let x: Vec<f32> = (0..100).map(|i| i as f32 * 0.01).collect();
        // 3 kHz is above Nyquist at 4 kHz sample rate.
        assert_eq!(high_pitch_boost(&x, 4000, 3000.0, 5.0), x);
        assert_eq!(high_pitch_boost(&x, 16000, 0.0, 5.0), x);
    }

    #[test]
    fn test_boost_lifts_high_band_only() {
        let sr = 16000;
        let low: Vec<f32> = (0..8000)
            .map(|i| 0.5 * (2.0 * PI * 200.0 * i as f32 / sr as f32).sin())
            .collect();
        let high: Vec<f32> = (0..8000)
            .map(|i| 0.5 * (2.0 * PI * 6000.0 * i as f32 / sr as f32).sin())
            .collect();

        let low_out = high_pitch_boost(&low, sr, 3000.0, 5.0);
        let high_out = high_pitch_boost(&high, sr, 3000.0, 5.0);

        let peak = |x: &[f32]| x[2000..6000].iter().fold(0.0f32, |m, v| m.max(v.abs()));
        assert!((peak(&low_out) / peak(&low) - 1.0).abs() < 0.05);
        // A fully passed tone grows by 1 + 10^(5/20) ~= 2.78.
        assert!(peak(&high_out) / peak(&high) > 2.4);
        assert_eq!(low_out.len(), low.len());
    }

    #[test]
    fn test_capacitor_matches_recurrence() {
        let y = capacitor_effect(&[1.0, 1.0, 1.0], 0.3);
        assert!((y[0] - 0.3).abs() < 1e-6);
        assert!((y[1] - (0.3 + 0.7 * 0.3)).abs() < 1e-6);
        assert_eq!(y.len(), 3);
    }

    #[test]
    fn test_capacitor_converges_to_dc() {
        let y = capacitor_effect(&vec![0.8; 200], 0.3);
        assert!((y[199] - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_capacitor_length_preserved() {
        for len in [1usize, 2, 17, 1024] {
            assert_eq!(capacitor_effect(&vec![0.1; len], 0.3).len(), len);
        }
    }

    #[test]
    fn test_vocal_and_final_gain() {
        let mut l = vec![1.0, -0.5];
        let mut r = vec![0.25, 0.0];
        vocal_boost(&mut l, &mut r, 1.1);
        final_volume(&mut l, &mut r, 2.0);
        assert!((l[0] - 2.2).abs() < 1e-6);
        assert!((l[1] + 1.1).abs() < 1e-6);
        assert!((r[0] - 0.55).abs() < 1e-6);
        assert_eq!(r[1], 0.0);
    }
}
