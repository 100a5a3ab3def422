//! Objective quality report.
//!
//! Compares the untouched input with the final mix. SNR and log-spectral
//! distance run on the mono fold (channel mean) of each buffer; the stereo
//! balance runs on the enhanced pair. PESQ and STOI come from optional
//! pluggable estimators and are recorded as `None` whenever an estimator is
//! missing or fails.

use crate::dsp::stft::Stft;
use crate::dsp::utils::energy;
use crate::profile::{HearingProfile, TuningGain};
use crate::AudioBuffer;
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

// Guards the SNR ratio; also keeps a silent reference at 0 dB instead of -inf.
const SNR_EPS: f64 = 1e-10;
// Added to STFT magnitudes before the log ratio.
const LSD_EPS: f64 = 1e-9;
// Stands in for an exactly silent left channel so the balance stays finite.
const BALANCE_FLOOR: f64 = 1e-10;

const UNDEFINED: &str = "Undefined";

// =============================================================================
// METRICS
// =============================================================================

/// `10 * log10((sum(c^2) + eps) / (sum((c - e)^2) + eps))`. A shorter input is
/// treated as zero-padded.
pub fn snr_db(clean: &[f32], enhanced: &[f32]) -> f64 {
    let n = clean.len().max(enhanced.len());
    let mut signal = 0.0f64;
    let mut noise = 0.0f64;
    for i in 0..n {
        let c = clean.get(i).copied().unwrap_or(0.0) as f64;
        let e = enhanced.get(i).copied().unwrap_or(0.0) as f64;
        signal += c * c;
        noise += (c - e) * (c - e);
    }
    10.0 * ((signal + SNR_EPS) / (noise + SNR_EPS)).log10()
}

/// Mean over frames of the RMS (over bins) of the dB magnitude ratio.
pub fn log_spectral_distance(stft: &Stft, clean: &[f32], enhanced: &[f32]) -> f64 {
    let n = clean.len().max(enhanced.len());
    let mut a = clean.to_vec();
    let mut b = enhanced.to_vec();
    a.resize(n, 0.0);
    b.resize(n, 0.0);

    let sa = stft.analyze(&a);
    let sb = stft.analyze(&b);

    let mut total = 0.0f64;
    for (fa, fb) in sa.frames.iter().zip(&sb.frames) {
        let mut sq = 0.0f64;
        for (ca, cb) in fa.iter().zip(fb) {
            let ma = ca.norm() as f64 + LSD_EPS;
            let mb = cb.norm() as f64 + LSD_EPS;
            let d = 20.0 * (ma / mb).log10();
            sq += d * d;
        }
        total += (sq / sa.bins as f64).sqrt();
    }
    total / sa.num_frames().max(1) as f64
}

/// Left/right energy ratio in dB, or `Undefined` when the right channel is
/// exactly silent (which includes both channels being silent). A silent left
/// channel is floored at `BALANCE_FLOOR` so the result is always finite.
pub fn stereo_energy_balance(left: &[f32], right: &[f32]) -> StereoBalance {
    let l = energy(left);
    let r = energy(right);
    if r == 0.0 {
        return StereoBalance::Undefined;
    }
    let l = if l == 0.0 { BALANCE_FLOOR } else { l };
    StereoBalance::Db(10.0 * (l / r).log10())
}

/// Stereo balance value; serialized as a number or the string `"Undefined"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StereoBalance {
    Db(f64),
    Undefined,
}

impl StereoBalance {
    pub fn as_db(&self) -> Option<f64> {
        match self {
            StereoBalance::Db(v) => Some(*v),
            StereoBalance::Undefined => None,
        }
    }
}

impl std::fmt::Display for StereoBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StereoBalance::Db(v) => write!(f, "{}", v),
            StereoBalance::Undefined => f.write_str(UNDEFINED),
        }
    }
}

impl Serialize for StereoBalance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StereoBalance::Db(v) => serializer.serialize_f64(*v),
            StereoBalance::Undefined => serializer.serialize_str(UNDEFINED),
        }
    }
}

impl<'de> Deserialize<'de> for StereoBalance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Db(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Db(v) => Ok(StereoBalance::Db(v)),
            Raw::Text(s) if s == UNDEFINED => Ok(StereoBalance::Undefined),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "expected a number or \"{}\", got \"{}\"",
                UNDEFINED, s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub snr_before: f64,
    pub snr_after: f64,
    pub delta_snr: f64,
    pub pesq: Option<f64>,
    pub stoi: Option<f64>,
    pub lsd: f64,
    pub stereo_energy_balance_db: StereoBalance,
}

/// Immutable record of one processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub hearing_loss: HearingProfile,
    pub tuning_gain_percent: TuningGain,
    pub sample_rate: u32,
    pub latency_ms: f64,
    pub metrics: Metrics,
}

impl ProcessingReport {
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// =============================================================================
// OPTIONAL ESTIMATORS
// =============================================================================

/// An external reference-based quality estimator (PESQ, STOI, ...).
pub trait QualityEstimator: Send + Sync {
    fn name(&self) -> &str;

    fn estimate(&self, reference: &[f32], degraded: &[f32], sample_rate: u32) -> anyhow::Result<f64>;
}

// =============================================================================
// REPORTER
// =============================================================================

#[derive(Default)]
pub struct QualityReporter {
    stft: Stft,
    pesq: Option<Box<dyn QualityEstimator>>,
    stoi: Option<Box<dyn QualityEstimator>>,
}

impl QualityReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pesq(mut self, estimator: Box<dyn QualityEstimator>) -> Self {
        self.pesq = Some(estimator);
        self
    }

    pub fn with_stoi(mut self, estimator: Box<dyn QualityEstimator>) -> Self {
        self.stoi = Some(estimator);
        self
    }

    pub fn report(
        &self,
        original: &AudioBuffer,
        enhanced: &AudioBuffer,
        profile: &HearingProfile,
        tuning: TuningGain,
        latency: Duration,
    ) -> ProcessingReport {
        let sample_rate = original.sample_rate;
        if enhanced.sample_rate != sample_rate {
            warn!(
                "report: enhanced sample rate {} differs from original {}",
                enhanced.sample_rate, sample_rate
            );
        }

        let orig_mono = original.mono_fold();
        let enh_mono = enhanced.mono_fold();

        let snr_before = snr_db(&orig_mono, &orig_mono);
        let snr_after = snr_db(&orig_mono, &enh_mono);

        let metrics = Metrics {
            snr_before,
            snr_after,
            delta_snr: snr_after - snr_before,
            pesq: optional_metric(self.pesq.as_deref(), &orig_mono, &enh_mono, sample_rate),
            stoi: optional_metric(self.stoi.as_deref(), &orig_mono, &enh_mono, sample_rate),
            lsd: log_spectral_distance(&self.stft, &orig_mono, &enh_mono),
            stereo_energy_balance_db: stereo_energy_balance(&enhanced.left, &enhanced.right),
        };
        debug!("report metrics: {:?}", metrics);

        ProcessingReport {
            hearing_loss: *profile,
            tuning_gain_percent: tuning,
            sample_rate,
            latency_ms: latency.as_secs_f64() * 1000.0,
            metrics,
        }
    }
}

fn optional_metric(
    estimator: Option<&dyn QualityEstimator>,
    reference: &[f32],
    degraded: &[f32],
    sample_rate: u32,
) -> Option<f64> {
    let estimator = estimator?;
    match estimator.estimate(reference, degraded, sample_rate) {
        Ok(v) if v.is_finite() => Some(v),
        Ok(v) => {
            warn!("{} returned a non-finite score ({}), recording none", estimator.name(), v);
            None
        }
        Err(e) => {
            warn!("{} unavailable: {:#}", estimator.name(), e);
            None
        }
    }
}
