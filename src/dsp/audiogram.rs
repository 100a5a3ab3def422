//! Audiogram Gain Synthesis
//!
//! Turns the seven sparse audiogram points of one ear into a dense per-bin
//! gain curve and applies it to that ear's channel in the STFT domain.
//!
//! # Curve Model
//! Each calibration point contributes a Gaussian bump in dB, centered on its
//! frequency with a fixed spread:
//!
//! `gain_db[k] = sum_i loss_i * gain_factor * exp(-0.5 * ((f_k - f_i) / sigma)^2)`
//!
//! Overlapping bumps interpolate between the points without steps; `sigma`
//! sets how far a band bleeds into its neighbours. The dB curve is then
//! converted to a linear magnitude multiplier.
//!
//! # Guarantees
//! - Flat profile or 0% tuning gives exactly 1.0 in every bin.
//! - Phase is untouched; output length equals input length.

use crate::dsp::stft::Stft;
use crate::dsp::utils::{bell, db_to_gain};
use crate::error::Result;
use crate::profile::{EarProfile, TuningGain};
use log::debug;

/// Spread of each calibration bump (Hz).
pub const GAIN_SPREAD_HZ: f32 = 1000.0;

/// Dense linear gain, one value per STFT bin.
#[derive(Debug, Clone, PartialEq)]
pub struct GainCurve {
    gains: Vec<f32>,
    frequencies: Vec<f32>,
}

impl GainCurve {
    /// Synthesize the curve for one ear over the given bin frequencies.
    pub fn synthesize(frequencies: &[f32], ear: &EarProfile, tuning: TuningGain) -> Self {
        let factor = tuning.gain_factor();
        let mut gain_db = vec![0.0f32; frequencies.len()];

        for (center, loss_db) in ear.points() {
            let applied = loss_db * factor;
            if applied == 0.0 {
                continue;
            }
            for (g, &f) in gain_db.iter_mut().zip(frequencies) {
                *g += applied * bell(f, center as f32, GAIN_SPREAD_HZ);
            }
        }

        Self {
            gains: gain_db.into_iter().map(db_to_gain).collect(),
            frequencies: frequencies.to_vec(),
        }
    }

    /// Curve over the bins of `stft` at `sample_rate`.
    pub fn for_stft(stft: &Stft, sample_rate: u32, ear: &EarProfile, tuning: TuningGain) -> Self {
        Self::synthesize(&stft.frequencies(sample_rate), ear, tuning)
    }

    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    pub fn len(&self) -> usize {
        self.gains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gains.is_empty()
    }

    /// Gain at the bin closest to `freq_hz`.
    pub fn gain_near(&self, freq_hz: f32) -> Option<f32> {
        self.nearest_bin(freq_hz).map(|i| self.gains[i])
    }

    pub fn nearest_bin(&self, freq_hz: f32) -> Option<usize> {
        self.frequencies
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - freq_hz).abs().total_cmp(&(b.1 - freq_hz).abs()))
            .map(|(i, _)| i)
    }

    pub fn is_identity(&self) -> bool {
        self.gains.iter().all(|&g| g == 1.0)
    }
}

/// Applies an ear's gain curve to one channel.
pub struct AudiogramEqualizer {
    stft: Stft,
}

impl Default for AudiogramEqualizer {
    fn default() -> Self {
        Self::new(Stft::default())
    }
}

impl AudiogramEqualizer {
    pub fn new(stft: Stft) -> Self {
        Self { stft }
    }

    pub fn curve(&self, sample_rate: u32, ear: &EarProfile, tuning: TuningGain) -> GainCurve {
        GainCurve::for_stft(&self.stft, sample_rate, ear, tuning)
    }

    pub fn apply(&self, signal: &[f32], curve: &GainCurve) -> Result<Vec<f32>> {
        if signal.is_empty() {
            return Ok(Vec::new());
        }
        if curve.is_identity() {
            debug!("audiogram: identity curve, channel unchanged");
            return Ok(signal.to_vec());
        }

        let mut spec = self.stft.analyze(signal);
        spec.apply_bin_gains(curve.gains())?;
        self.stft.synthesize(&spec, signal.len())
    }

    /// Synthesize and apply in one go.
    pub fn process(
        &self,
        signal: &[f32],
        sample_rate: u32,
        ear: &EarProfile,
        tuning: TuningGain,
    ) -> Result<Vec<f32>> {
        let curve = self.curve(sample_rate, ear, tuning);
        self.apply(signal, &curve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::STANDARD_FREQUENCIES;
    use std::f32::consts::PI;

    const SR: u32 = 16000;

    fn full_loss() -> EarProfile {
        EarProfile::new([10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0])
    }

    #[test]
    fn test_flat_profile_is_identity() {
        let eq = AudiogramEqualizer::default();
        for pct in [0.0, 50.0, 100.0, 250.0] {
            let curve = eq.curve(SR, &EarProfile::default(), TuningGain::from_percent(pct));
            assert_eq!(curve.len(), 1025);
            assert!(curve.gains().iter().all(|&g| (g - 1.0).abs() < 1e-6));
        }
    }

    #[test]
    fn test_zero_tuning_is_identity() {
        let eq = AudiogramEqualizer::default();
        let curve = eq.curve(SR, &full_loss(), TuningGain::from_percent(0.0));
        assert!(curve.is_identity());
    }

    #[test]
    fn test_single_point_peak_and_falloff() {
        let eq = AudiogramEqualizer::default();
        let ear = EarProfile::single(1000, 20.0).unwrap();
        let curve = eq.curve(SR, &ear, TuningGain::from_percent(100.0));

        let peak_bin = curve.nearest_bin(1000.0).unwrap();
        assert!((curve.gains()[peak_bin] - 10.0).abs() < 1e-3);

        let three_sigma_bin = curve.nearest_bin(4000.0).unwrap();
        for k in peak_bin + 1..=three_sigma_bin {
            assert!(curve.gains()[k] < curve.gains()[k - 1]);
        }
        for k in 1..=peak_bin {
            assert!(curve.gains()[k] > curve.gains()[k - 1]);
        }
        // One sigma away the boost is 20 * exp(-0.5) dB.
        let expected = db_to_gain(20.0 * (-0.5f32).exp());
        assert!((curve.gain_near(2000.0).unwrap() - expected).abs() < 1e-3);
    }

    #[test]
    fn test_contributions_accumulate() {
        let freqs: Vec<f32> = STANDARD_FREQUENCIES.iter().map(|&f| f as f32).collect();
        let mut ear = EarProfile::single(1000, 10.0).unwrap();
        ear.set(2000, 10.0).unwrap();
        let curve = GainCurve::synthesize(&freqs, &ear, TuningGain::from_percent(100.0));

        let at_1k_db = 10.0 + 10.0 * (-0.5f32).exp();
        assert!((curve.gain_near(1000.0).unwrap() - db_to_gain(at_1k_db)).abs() < 1e-3);
    }

    #[test]
    fn test_apply_boosts_tone_and_keeps_length() {
        let eq = AudiogramEqualizer::default();
        let x: Vec<f32> = (0..8000)
            .map(|i| 0.1 * (2.0 * PI * 1000.0 * i as f32 / SR as f32).sin())
            .collect();
        let ear = EarProfile::single(1000, 20.0).unwrap();
        let y = eq.process(&x, SR, &ear, TuningGain::from_percent(100.0)).unwrap();
        assert_eq!(y.len(), x.len());

        let peak = |v: &[f32]| v[2000..6000].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let ratio = peak(&y) / peak(&x);
        assert!(ratio > 9.0 && ratio < 11.0, "ratio {}", ratio);
    }

    #[test]
    fn test_apply_with_identity_curve_is_exact_copy() {
        let eq = AudiogramEqualizer::default();
        let x = vec![0.3, -0.2, 0.1];
        let y = eq
            .process(&x, SR, &full_loss(), TuningGain::from_percent(0.0))
            .unwrap();
        assert_eq!(y, x);
    }
}
