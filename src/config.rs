use crate::dsp::denoiser::{NoiseReduction, DEFAULT_NOISE_ESTIMATION_SECS};
use crate::dsp::lms::{DEFAULT_MU, DEFAULT_ORDER};
use crate::dsp::shaping::{
    DEFAULT_BOOST_CUTOFF_HZ, DEFAULT_BOOST_DB, DEFAULT_CAPACITOR_ALPHA, DEFAULT_FINAL_VOLUME,
    DEFAULT_VOCAL_GAIN,
};
use crate::error::{EnhanceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// STAGE CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmsConfig {
    pub order: usize,
    pub mu: f32,
}

impl Default for LmsConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            mu: DEFAULT_MU,
        }
    }
}

/// One step of the shaping stage. Steps run in the order they are listed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapingStep {
    HighPitchBoost { cutoff_hz: f32, boost_db: f32 },
    VocalBoost { gain: f32 },
    Capacitor { alpha: f32 },
}

impl ShapingStep {
    pub fn name(&self) -> &'static str {
        match self {
            ShapingStep::HighPitchBoost { .. } => "high_pitch_boost",
            ShapingStep::VocalBoost { .. } => "vocal_boost",
            ShapingStep::Capacitor { .. } => "capacitor",
        }
    }

    pub fn high_pitch_boost() -> Self {
        ShapingStep::HighPitchBoost {
            cutoff_hz: DEFAULT_BOOST_CUTOFF_HZ,
            boost_db: DEFAULT_BOOST_DB,
        }
    }

    pub fn capacitor() -> Self {
        ShapingStep::Capacitor {
            alpha: DEFAULT_CAPACITOR_ALPHA,
        }
    }
}

/// Declares which stages run and with what parameters. The stage order itself
/// is fixed (denoise, adaptive filter, shaping, audiogram, final mix); a
/// disabled stage passes the buffer through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `None` skips noise reduction.
    pub noise_reduction: Option<NoiseReduction>,
    /// `None` skips the adaptive filter.
    pub lms: Option<LmsConfig>,
    pub shaping: Vec<ShapingStep>,
    pub audiogram: bool,
    pub final_volume: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelinePreset::Standard.config()
    }
}

impl PipelineConfig {
    /// Every stage disabled and unity output gain.
    pub fn passthrough() -> Self {
        Self {
            noise_reduction: None,
            lms: None,
            shaping: Vec::new(),
            audiogram: false,
            final_volume: 1.0,
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: PipelineConfig =
            serde_json::from_str(s).map_err(|e| EnhanceError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json(&s)
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(EnhanceError::InvalidConfig(msg));

        if let Some(NoiseReduction::Mmse {
            noise_estimation_secs,
            ..
        }) = self.noise_reduction
        {
            if !noise_estimation_secs.is_finite() || noise_estimation_secs < 0.0 {
                return bad(format!(
                    "noise_estimation_secs must be >= 0, got {}",
                    noise_estimation_secs
                ));
            }
        }
        if let Some(lms) = self.lms {
            if lms.order == 0 {
                return bad("lms order must be at least 1".into());
            }
            if !lms.mu.is_finite() || lms.mu < 0.0 {
                return bad(format!("lms mu must be >= 0, got {}", lms.mu));
            }
        }
        for step in &self.shaping {
            let ok = match *step {
                ShapingStep::HighPitchBoost {
                    cutoff_hz,
                    boost_db,
                } => cutoff_hz.is_finite() && boost_db.is_finite(),
                ShapingStep::VocalBoost { gain } => gain.is_finite(),
                ShapingStep::Capacitor { alpha } => alpha.is_finite(),
            };
            if !ok {
                return bad(format!("{} has a non-finite parameter", step.name()));
            }
        }
        if !self.final_volume.is_finite() {
            return bad("final_volume must be finite".into());
        }
        Ok(())
    }
}

// =============================================================================
// PIPELINE PRESETS
// =============================================================================

/// Named stage setups covering the gain ranges the chain is tuned for
/// (vocal 1.05 to 1.15, final volume 1.1 to 1.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePreset {
    #[default]
    Standard,
    Gentle,
    Clarity,
    Loud,
}

impl PipelinePreset {
    pub fn all() -> [PipelinePreset; 4] {
        [
            PipelinePreset::Standard,
            PipelinePreset::Gentle,
            PipelinePreset::Clarity,
            PipelinePreset::Loud,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelinePreset::Standard => "standard",
            PipelinePreset::Gentle => "gentle",
            PipelinePreset::Clarity => "clarity",
            PipelinePreset::Loud => "loud",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn description(&self) -> &'static str {
        match self {
            PipelinePreset::Standard => "MMSE denoise, LMS, treble boost, smoothing, audiogram EQ",
            PipelinePreset::Gentle => "Light shaping without treble boost, modest output gain",
            PipelinePreset::Clarity => "Threshold denoise and a wider treble boost for consonants",
            PipelinePreset::Loud => "Mono-folded denoise and the highest output gain",
        }
    }

    pub fn config(&self) -> PipelineConfig {
        let mmse = |mono_fold| NoiseReduction::Mmse {
            noise_estimation_secs: DEFAULT_NOISE_ESTIMATION_SECS,
            mono_fold,
        };

        match self {
            PipelinePreset::Standard => PipelineConfig {
                noise_reduction: Some(mmse(false)),
                lms: Some(LmsConfig::default()),
                shaping: vec![
                    ShapingStep::high_pitch_boost(),
                    ShapingStep::VocalBoost {
                        gain: DEFAULT_VOCAL_GAIN,
                    },
                    ShapingStep::capacitor(),
                ],
                audiogram: true,
                final_volume: DEFAULT_FINAL_VOLUME,
            },
            PipelinePreset::Gentle => PipelineConfig {
                noise_reduction: Some(mmse(false)),
                lms: Some(LmsConfig::default()),
                shaping: vec![
                    ShapingStep::VocalBoost { gain: 1.05 },
                    ShapingStep::capacitor(),
                ],
                audiogram: true,
                final_volume: 1.1,
            },
            PipelinePreset::Clarity => PipelineConfig {
                noise_reduction: Some(NoiseReduction::MagnitudeThreshold),
                lms: Some(LmsConfig::default()),
                shaping: vec![
                    ShapingStep::HighPitchBoost {
                        cutoff_hz: 2500.0,
                        boost_db: 6.0,
                    },
                    ShapingStep::VocalBoost { gain: 1.15 },
                ],
                audiogram: true,
                final_volume: 1.3,
            },
            PipelinePreset::Loud => PipelineConfig {
                noise_reduction: Some(mmse(true)),
                lms: Some(LmsConfig::default()),
                shaping: vec![
                    ShapingStep::high_pitch_boost(),
                    ShapingStep::VocalBoost { gain: 1.15 },
                    ShapingStep::capacitor(),
                ],
                audiogram: true,
                final_volume: 1.4,
            },
        }
    }
}
