//! Offline enhancement chain.
//!
//! Stage order is fixed: noise reduction, adaptive filter, shaping, audiogram
//! EQ, final volume. `PipelineConfig` decides which stages do work; a disabled
//! stage still advances the state machine and leaves the buffer as it was.
//!
//! Left and right have no cross-channel dependency until the final mix, so
//! every per-channel stage runs the two channels through `rayon::join`.

use crate::config::{PipelineConfig, ShapingStep};
use crate::dsp::audiogram::AudiogramEqualizer;
use crate::dsp::denoiser::NoiseReducer;
use crate::dsp::lms::LmsFilter;
use crate::dsp::shaping::{capacitor_effect, final_volume, high_pitch_boost, vocal_boost};
use crate::dsp::utils::frame_rms;
use crate::error::Result;
use crate::profile::{Ear, HearingProfile, TuningGain};
use crate::report::{ProcessingReport, QualityReporter};
use crate::AudioBuffer;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Loaded,
    Denoised,
    Filtered,
    Shaped,
    Tuned,
    Finalized,
}

impl PipelineState {
    /// The next state, or `None` once finalized.
    pub fn next(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Loaded => Some(PipelineState::Denoised),
            PipelineState::Denoised => Some(PipelineState::Filtered),
            PipelineState::Filtered => Some(PipelineState::Shaped),
            PipelineState::Shaped => Some(PipelineState::Tuned),
            PipelineState::Tuned => Some(PipelineState::Finalized),
            PipelineState::Finalized => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Loaded => "loaded",
            PipelineState::Denoised => "denoised",
            PipelineState::Filtered => "filtered",
            PipelineState::Shaped => "shaped",
            PipelineState::Tuned => "tuned",
            PipelineState::Finalized => "finalized",
        }
    }
}

/// Result of one run. `original` is the normalized input, kept for the report.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub original: AudioBuffer,
    pub enhanced: AudioBuffer,
    pub latency: Duration,
    pub state: PipelineState,
}

pub struct Pipeline {
    config: PipelineConfig,
    denoiser: Option<Box<dyn NoiseReducer>>,
    equalizer: AudiogramEqualizer,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let denoiser = config.noise_reduction.as_ref().map(|nr| nr.build());
        Ok(Self {
            config,
            denoiser,
            equalizer: AudiogramEqualizer::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over `input`. Any stage failure aborts the run.
    pub fn run(
        &self,
        input: AudioBuffer,
        profile: &HearingProfile,
        tuning: TuningGain,
    ) -> Result<PipelineOutput> {
        let start = Instant::now();

        let mut original = input;
        original.normalize();
        let sample_rate = original.sample_rate;
        let mut buf = original.clone();
        let mut state = PipelineState::Loaded;
        if buf.is_empty() {
            warn!("pipeline: input has no samples, every stage will pass it through");
        }
        debug!(
            "pipeline: {} frames @ {} Hz, tuning {}, peak {:.4}",
            buf.len(),
            sample_rate,
            tuning,
            buf.peak()
        );

        self.denoise(&mut buf)?;
        state = self.advance(state);

        self.adaptive_filter(&mut buf);
        state = self.advance(state);

        self.shape(&mut buf);
        state = self.advance(state);

        self.equalize(&mut buf, profile, tuning)?;
        state = self.advance(state);

        final_volume(&mut buf.left, &mut buf.right, self.config.final_volume);
        state = self.advance(state);

        let latency = start.elapsed();
        info!(
            "pipeline done in {:.1} ms: rms in {:.4}/{:.4}, out {:.4}/{:.4}, peak out {:.4}",
            latency.as_secs_f64() * 1000.0,
            frame_rms(&original.left),
            frame_rms(&original.right),
            frame_rms(&buf.left),
            frame_rms(&buf.right),
            buf.peak()
        );

        Ok(PipelineOutput {
            original,
            enhanced: buf,
            latency,
            state,
        })
    }

    /// `run` followed by the quality report.
    pub fn process(
        &self,
        input: AudioBuffer,
        profile: &HearingProfile,
        tuning: TuningGain,
        reporter: &QualityReporter,
    ) -> Result<(PipelineOutput, ProcessingReport)> {
        let output = self.run(input, profile, tuning)?;
        let report = reporter.report(
            &output.original,
            &output.enhanced,
            profile,
            tuning,
            output.latency,
        );
        Ok((output, report))
    }

    fn advance(&self, state: PipelineState) -> PipelineState {
        let next = state.next().unwrap_or(state);
        debug!("pipeline: {} -> {}", state.name(), next.name());
        next
    }

    // -------------------------------------------------------------------------
    // Stages
    // -------------------------------------------------------------------------

    fn denoise(&self, buf: &mut AudioBuffer) -> Result<()> {
        let (Some(denoiser), Some(nr)) = (&self.denoiser, &self.config.noise_reduction) else {
            return Ok(());
        };
        let sr = buf.sample_rate;

        if nr.folds_to_mono() {
            let mono = denoiser.reduce(&buf.mono_fold(), sr)?;
            buf.left = mono.clone();
            buf.right = mono;
        } else {
            let (l, r) = rayon::join(
                || denoiser.reduce(&buf.left, sr),
                || denoiser.reduce(&buf.right, sr),
            );
            buf.left = l?;
            buf.right = r?;
        }
        buf.normalize();
        debug!("denoise: {} done", denoiser.name());
        Ok(())
    }

    fn adaptive_filter(&self, buf: &mut AudioBuffer) {
        let Some(lms) = self.config.lms else {
            return;
        };
        let run = |x: &[f32]| LmsFilter::new(lms.order, lms.mu).filter(x, None).filtered;
        let (l, r) = rayon::join(|| run(&buf.left), || run(&buf.right));
        buf.left = l;
        buf.right = r;
        buf.normalize();
    }

    fn shape(&self, buf: &mut AudioBuffer) {
        let sr = buf.sample_rate;
        for step in &self.config.shaping {
            match *step {
                ShapingStep::HighPitchBoost {
                    cutoff_hz,
                    boost_db,
                } => {
                    let (l, r) = rayon::join(
                        || high_pitch_boost(&buf.left, sr, cutoff_hz, boost_db),
                        || high_pitch_boost(&buf.right, sr, cutoff_hz, boost_db),
                    );
                    buf.left = l;
                    buf.right = r;
                }
                ShapingStep::VocalBoost { gain } => {
                    vocal_boost(&mut buf.left, &mut buf.right, gain);
                }
                ShapingStep::Capacitor { alpha } => {
                    let (l, r) = rayon::join(
                        || capacitor_effect(&buf.left, alpha),
                        || capacitor_effect(&buf.right, alpha),
                    );
                    buf.left = l;
                    buf.right = r;
                }
            }
            debug!("shaping: {}", step.name());
        }
        buf.normalize();
    }

    fn equalize(
        &self,
        buf: &mut AudioBuffer,
        profile: &HearingProfile,
        tuning: TuningGain,
    ) -> Result<()> {
        if !self.config.audiogram {
            return Ok(());
        }
        let sr = buf.sample_rate;
        let eq = &self.equalizer;
        let (l, r) = rayon::join(
            || eq.process(&buf.left, sr, profile.ear(Ear::Left), tuning),
            || eq.process(&buf.right, sr, profile.ear(Ear::Right), tuning),
        );
        buf.left = l?;
        buf.right = r?;
        buf.normalize();
        Ok(())
    }
}
