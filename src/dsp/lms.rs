//! Adaptive Line Filter (LMS)
//!
//! Sample-by-sample least-mean-squares predictor. Each output sample is the
//! filter's prediction of the desired signal from the `order` preceding
//! input samples; the weights move along the error gradient after every step.
//!
//! # Lifecycle
//! - **Cold start**: indices below `order` have no full history and emit zero.
//! - **Adapting**: weights update every sample with step `2 * mu * e`.
//! - **Short input**: fewer samples than taps returns the input unchanged.
//!
//! With the desired signal defaulting to the input itself the filter keeps the
//! predictable (tonal, slowly varying) part of the signal.

use log::debug;

pub const DEFAULT_ORDER: usize = 32;
pub const DEFAULT_MU: f32 = 0.001;

/// Result of running the filter over a channel.
#[derive(Debug, Clone, Default)]
pub struct LmsOutput {
    pub filtered: Vec<f32>,
    /// Prediction error per sample (zero in the cold-start region).
    pub error: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct LmsFilter {
    order: usize,
    mu: f32,
    weights: Vec<f32>,
    taps: Vec<f32>,
}

impl Default for LmsFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ORDER, DEFAULT_MU)
    }
}

impl LmsFilter {
    pub fn new(order: usize, mu: f32) -> Self {
        let order = order.max(1);
        Self {
            order,
            mu,
            weights: vec![0.0; order],
            taps: vec![0.0; order],
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// One adaptation step. `history` holds the preceding samples, most recent
    /// first, and must be `order` long. Returns `(prediction, error)`.
    #[inline]
    pub fn step(&mut self, history: &[f32], desired: f32) -> (f32, f32) {
        debug_assert_eq!(history.len(), self.order);

        let mut y = 0.0f32;
        for (w, x) in self.weights.iter().zip(history) {
            y += w * x;
        }
        let e = desired - y;
        let k = 2.0 * self.mu * e;
        for (w, x) in self.weights.iter_mut().zip(history) {
            *w += k * x;
        }
        (y, e)
    }

    /// Filter a whole channel. `desired` defaults to `input`.
    pub fn filter(&mut self, input: &[f32], desired: Option<&[f32]>) -> LmsOutput {
        let n = input.len();
        if n < self.order {
            debug!("lms: {} samples < {} taps, passing through", n, self.order);
            return LmsOutput {
                filtered: input.to_vec(),
                error: vec![0.0; n],
            };
        }

        let desired = desired.unwrap_or(input);
        let mut filtered = vec![0.0f32; n];
        let mut error = vec![0.0f32; n];

        let mut taps = std::mem::take(&mut self.taps);
        for i in self.order..n {
            for (k, t) in taps.iter_mut().enumerate() {
                *t = input[i - 1 - k];
            }
            let d = desired.get(i).copied().unwrap_or(0.0);
            let (y, e) = self.step(&taps, d);
            filtered[i] = y;
            error[i] = e;
        }
        self.taps = taps;

        LmsOutput { filtered, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn mean_abs(x: &[f32]) -> f32 {
        x.iter().map(|v| v.abs()).sum::<f32>() / x.len().max(1) as f32
    }

    #[test]
    fn test_output_length_matches_input() {
        let mut lms = LmsFilter::default();
        for len in [0usize, 5, 31, 32, 33, 1000] {
            let x: Vec<f32> = (0..len).map(|i| (i as f32 * 0.1).sin()).collect();
            assert_eq!(lms.filter(&x, None).filtered.len(), len);
        }
    }

    #[test]
    fn test_zero_input_gives_zero_output() {
        let mut lms = LmsFilter::default();
        let out = lms.filter(&vec![0.0; 4096], None);
        assert!(out.filtered.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_short_input_is_passthrough() {
        let mut lms = LmsFilter::new(32, 0.001);
        let x = vec![0.5; 10];
        assert_eq!(lms.filter(&x, None).filtered, x);
    }

    #[test]
    fn test_cold_start_region_is_zero() {
        let mut lms = LmsFilter::new(8, 0.01);
        let x: Vec<f32> = (0..100).map(|i| (i as f32 * 0.3).sin()).collect();
        let out = lms.filter(&x, None);
        assert!(out.filtered[..8].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_single_step_update() {
        let mut lms = LmsFilter::new(2, 0.5);
        let (y, e) = lms.step(&[1.0, 0.0], 1.0);
        assert_eq!(y, 0.0);
        assert_eq!(e, 1.0);
        // w += 2 * 0.5 * 1.0 * x
        assert_eq!(lms.weights(), &[1.0, 0.0]);
    }

    #[test]
    fn test_filter_uses_most_recent_sample_first() {
        // order 2, mu 0.5, desired = input:
        // n=2: x=[2,1], y=0,  e=3,   w=[6,3]
        // n=3: x=[3,2], y=24, e=-20, w=[6,3]-20*[3,2]=[-54,-37]
        let mut lms = LmsFilter::new(2, 0.5);
        let out = lms.filter(&[1.0, 2.0, 3.0, 4.0], None);
        assert_eq!(out.filtered, vec![0.0, 0.0, 0.0, 24.0]);
        assert_eq!(out.error, vec![0.0, 0.0, 3.0, -20.0]);
        assert_eq!(lms.weights(), &[-54.0, -37.0]);
    }

    #[test]
    fn test_explicit_desired_signal() {
        // n=2: x=[1,0], y=0, e=d[2]=2, w=[2,0]
        // n=3: x=[1,1], y=2, e=d[3]-2=-2, w=[2,0]-2*[1,1]=[0,-2]
        let mut lms = LmsFilter::new(2, 0.5);
        let out = lms.filter(&[0.0, 1.0, 1.0, 5.0], Some(&[9.0, 9.0, 2.0, 0.0]));
        assert_eq!(out.filtered, vec![0.0, 0.0, 0.0, 2.0]);
        assert_eq!(lms.weights(), &[0.0, -2.0]);
    }

    #[test]
    fn test_pure_tone_error_decreases() {
        let sr = 16000.0;
        let x: Vec<f32> = (0..16000)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / sr).sin())
            .collect();

        let mut lms = LmsFilter::new(32, 0.01);
        let out = lms.filter(&x, None);

        let early = mean_abs(&out.error[32..1032]);
        let late = mean_abs(&out.error[15000..16000]);
        assert!(late < early * 0.5, "early {} late {}", early, late);
    }
}
