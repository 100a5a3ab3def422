//! Error types for the enhancement pipeline.
//!
//! Only decoding failures and unrecoverable transform failures abort a run.
//! Degenerate filter settings, short signals and missing optional metrics are
//! handled inside the stages and never surface here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnhanceError {
    /// Input audio could not be decoded
    #[error("Load error: {0}")]
    Load(String),

    /// Internal STFT / reconstruction failure
    #[error("Transform error: {0}")]
    Transform(String),

    /// Hearing profile or tuning gain could not be parsed
    #[error("Invalid hearing profile: {0}")]
    InvalidProfile(String),

    /// Pipeline configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, EnhanceError>;
