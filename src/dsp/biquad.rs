//! Biquad Filter Implementation (IIR 2nd Order)
//!
//! A standard second-order recursive filter in transposed direct form II.
//! Used by the shaping stage for the high-pitch boost, where it is run
//! forward and backward over the whole recording for zero phase.
//!
//! # Design Notes
//! - RBJ cookbook coefficients; the high-pass at Q = 1/sqrt(2) is the
//!   bilinear-transform Butterworth design
//! - No denormal offset is injected: digital silence must stay exactly zero
//!   through the offline chain

use std::f32::consts::{FRAC_1_SQRT_2, PI};

/// Q of a 2nd-order Butterworth section.
pub const BUTTERWORTH_Q: f32 = FRAC_1_SQRT_2;

// Edge padding of 3 * max(len(a), len(b)) samples.
const FILTFILT_PAD: usize = 9;

/// Biquad filter implementation (IIR 2nd order)
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
    z1: f32,
    z2: f32,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

impl Biquad {
    /// Identity filter.
    pub fn new() -> Self {
        Self {
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
            b1: 0.0,
            b2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Butterworth high-pass at `cutoff` Hz.
    pub fn highpass(cutoff: f32, sr: f32) -> Self {
        let mut f = Self::new();
        f.update_hpf(cutoff, BUTTERWORTH_Q, sr);
        f
    }

    /// Process a single sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = input * self.a0 + self.z1;
        self.z1 = input * self.a1 + self.z2 - self.b1 * out;
        self.z2 = input * self.a2 - self.b2 * out;
        out
    }

    /// Gain at DC (z = 1).
    pub fn dc_gain(&self) -> f32 {
        let den = 1.0 + self.b1 + self.b2;
        if den.abs() < 1e-12 {
            return 0.0;
        }
        (self.a0 + self.a1 + self.a2) / den
    }

    /// Load the delay line with the steady state reached after an infinitely
    /// long constant input `x0`, so filtering starts without a step transient.
    pub fn prime(&mut self, x0: f32) {
        let y = self.dc_gain() * x0;
        self.z1 = y - self.a0 * x0;
        self.z2 = self.a2 * x0 - self.b2 * y;
    }

    /// Run the filter over a whole block, starting from the current state.
    pub fn process_block(&mut self, input: &[f32]) -> Vec<f32> {
        input.iter().map(|&x| self.process(x)).collect()
    }

    pub fn update_hpf(&mut self, cutoff: f32, q: f32, sr: f32) {
        let w0 = 2.0 * PI * cutoff / sr;
        let alpha = w0.sin() / (2.0 * q.max(1e-6));
        let cw0 = w0.cos();

        let a0 = 1.0 + alpha;
        let inv_a0 = 1.0 / a0;

        self.a0 = ((1.0 + cw0) * 0.5) * inv_a0;
        self.a1 = -(1.0 + cw0) * inv_a0;
        self.a2 = ((1.0 + cw0) * 0.5) * inv_a0;
        self.b1 = (-2.0 * cw0) * inv_a0;
        self.b2 = (1.0 - alpha) * inv_a0;
    }

    /// Zero-phase filtering: forward pass, then a backward pass over the
    /// reversed result. Edges are extended by odd reflection and each pass is
    /// primed with its steady state, which keeps the ends free of transients.
    pub fn filtfilt(&self, input: &[f32]) -> Vec<f32> {
        let n = input.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = FILTFILT_PAD.min(n - 1);

        let first = input[0];
        let last = input[n - 1];
        let mut ext = Vec::with_capacity(n + 2 * pad);
        for i in (1..=pad).rev() {
            ext.push(2.0 * first - input[i]);
        }
        ext.extend_from_slice(input);
        for i in 1..=pad {
            ext.push(2.0 * last - input[n - 1 - i]);
        }

        let mut fwd = *self;
        fwd.prime(ext[0]);
        let mut y = fwd.process_block(&ext);

        y.reverse();
        let mut bwd = *self;
        bwd.prime(y[0]);
        let mut y = bwd.process_block(&y);
        y.reverse();

        y[pad..pad + n].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_passes_through() {
        let mut f = Biquad::new();
        assert_eq!(f.process(0.5), 0.5);
        assert_eq!(f.process(-0.25), -0.25);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let f = Biquad::highpass(1000.0, 16000.0);
        assert!(f.dc_gain().abs() < 1e-6);

        let out = f.filtfilt(&vec![0.3; 2000]);
        assert_eq!(out.len(), 2000);
        assert!(out.iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn test_highpass_passes_high_tone() {
        let sr = 16000.0;
        let f = Biquad::highpass(500.0, sr);
        let tone: Vec<f32> = (0..4000)
            .map(|i| (2.0 * PI * 4000.0 * i as f32 / sr).sin())
            .collect();
        let out = f.filtfilt(&tone);
        let mid_in = frame_peak(&tone[1000..3000]);
        let mid_out = frame_peak(&out[1000..3000]);
        assert!((mid_out / mid_in - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_filtfilt_short_inputs() {
        let f = Biquad::highpass(1000.0, 16000.0);
        assert!(f.filtfilt(&[]).is_empty());
        assert_eq!(f.filtfilt(&[0.1]).len(), 1);
        assert_eq!(f.filtfilt(&[0.1, 0.2, 0.3]).len(), 3);
    }

    fn frame_peak(x: &[f32]) -> f32 {
        x.iter().fold(0.0f32, |m, v| m.max(v.abs()))
    }
}
