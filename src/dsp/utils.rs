use std::f32::consts::PI;

pub fn db_to_gain(db: f32) -> f32 {
    (10.0f32).powf(db / 20.0)
}

/// Gaussian bump: 1.0 at `center`, falling off with standard deviation `width`.
pub fn bell(x: f32, center: f32, width: f32) -> f32 {
    let d = (x - center) / width.max(1e-6);
    (-0.5 * d * d).exp().clamp(0.0, 1.0)
}

/// Periodic Hann window (the usual STFT analysis window).
pub fn make_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Sum of squares, accumulated in f64 so long recordings don't lose precision.
pub fn energy(x: &[f32]) -> f64 {
    x.iter().map(|&v| (v as f64) * (v as f64)).sum()
}

pub fn frame_rms(x: &[f32]) -> f32 {
    let mut s = 0.0f32;
    for &v in x {
        s += v * v;
    }
    (s / (x.len().max(1) as f32)).sqrt()
}

/// Per-sample mean of two channels. The shorter channel is treated as zero-padded.
pub fn mono_fold(left: &[f32], right: &[f32]) -> Vec<f32> {
    let n = left.len().max(right.len());
    (0..n)
        .map(|i| {
            let l = left.get(i).copied().unwrap_or(0.0);
            let r = right.get(i).copied().unwrap_or(0.0);
            0.5 * (l + r)
        })
        .collect()
}

/// Scale every sample in place.
pub fn apply_gain(x: &mut [f32], gain: f32) {
    for v in x.iter_mut() {
        *v *= gain;
    }
}

/// Median of a slice (mean of the two middle values for even lengths).
/// Returns 0.0 for an empty slice.
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut v = values.to_vec();
    let mid = v.len() / 2;
    let (lower, upper_mid, _) = v.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *upper_mid;
    if values.len() % 2 == 1 {
        upper
    } else {
        let lower_max = lower.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        0.5 * (lower_max + upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_to_gain() {
        assert!((db_to_gain(20.0) - 10.0).abs() < 1e-4);
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bell_peak_and_falloff() {
        assert!((bell(1000.0, 1000.0, 1000.0) - 1.0).abs() < 1e-6);
        let one_sigma = bell(2000.0, 1000.0, 1000.0);
        assert!((one_sigma - (-0.5f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_mono_fold_pads_shorter_channel() {
        let m = mono_fold(&[1.0, 1.0, 1.0], &[1.0]);
        assert_eq!(m, vec![1.0, 0.5, 0.5]);
    }
}
