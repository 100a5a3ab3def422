pub mod audiogram;
pub mod biquad;
pub mod denoiser;
pub mod lms;
pub mod shaping;
pub mod stft;
pub mod utils;

pub use audiogram::{AudiogramEqualizer, GainCurve};
pub use biquad::Biquad;
pub use denoiser::{MmseDenoiser, NoiseReducer, NoiseReduction, ThresholdDenoiser};
pub use lms::{LmsFilter, LmsOutput};
pub use stft::{Spectrogram, Stft};
