//! Hearing profile (audiogram) and tuning gain.
//!
//! Wire format: `{"left": {"125": 20, "1000": "35", ...}, "right": {...}}`.
//! Keys are the standard audiometric frequencies as strings, values are dB of
//! hearing loss given as numbers or numeric strings. Missing keys (or a
//! missing ear) mean 0 dB.

use crate::error::{EnhanceError, Result};
use log::warn;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Standard audiometric test frequencies (Hz).
pub const STANDARD_FREQUENCIES: [u32; 7] = [125, 250, 500, 1000, 2000, 4000, 8000];

pub const DEFAULT_TUNING_PERCENT: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ear {
    Left,
    Right,
}

impl Ear {
    pub fn name(&self) -> &'static str {
        match self {
            Ear::Left => "left",
            Ear::Right => "right",
        }
    }
}

/// Numbers arrive either as JSON numbers or as strings from form inputs.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn to_f64(&self) -> std::result::Result<f64, String> {
        match self {
            NumberOrString::Number(v) => Ok(*v),
            NumberOrString::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", s)),
        }
    }
}

// =============================================================================
// EAR PROFILE
// =============================================================================

/// Hearing loss in dB at each standard frequency, for one ear.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EarProfile {
    losses_db: [f32; 7],
}

impl EarProfile {
    pub fn new(losses_db: [f32; 7]) -> Self {
        Self { losses_db }
    }

    /// Profile with loss only at `freq_hz` (which must be a standard frequency).
    pub fn single(freq_hz: u32, loss_db: f32) -> Result<Self> {
        let mut p = Self::default();
        p.set(freq_hz, loss_db)?;
        Ok(p)
    }

    pub fn set(&mut self, freq_hz: u32, loss_db: f32) -> Result<()> {
        let idx = STANDARD_FREQUENCIES
            .iter()
            .position(|&f| f == freq_hz)
            .ok_or_else(|| {
                EnhanceError::InvalidProfile(format!(
                    "{} Hz is not a standard audiometric frequency",
                    freq_hz
                ))
            })?;
        self.losses_db[idx] = loss_db;
        Ok(())
    }

    pub fn loss_at(&self, freq_hz: u32) -> Option<f32> {
        STANDARD_FREQUENCIES
            .iter()
            .position(|&f| f == freq_hz)
            .map(|i| self.losses_db[i])
    }

    /// `(frequency, loss_db)` pairs in ascending frequency.
    pub fn points(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        STANDARD_FREQUENCIES
            .iter()
            .copied()
            .zip(self.losses_db.iter().copied())
    }

    pub fn is_flat(&self) -> bool {
        self.losses_db.iter().all(|&v| v == 0.0)
    }
}

impl Serialize for EarProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Frequency order, not the lexical order a string-keyed map would give.
        let mut m = serializer.serialize_map(Some(STANDARD_FREQUENCIES.len()))?;
        for (f, v) in self.points() {
            m.serialize_entry(&f.to_string(), &v)?;
        }
        m.end()
    }
}

impl<'de> Deserialize<'de> for EarProfile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, NumberOrString>::deserialize(deserializer)?;
        let mut profile = EarProfile::default();
        for (key, value) in raw {
            let freq: u32 = key
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("'{}' is not a frequency", key)))?;
            let db = value.to_f64().map_err(D::Error::custom)?;
            profile
                .set(freq, db as f32)
                .map_err(|e| D::Error::custom(e.to_string()))?;
        }
        Ok(profile)
    }
}

// =============================================================================
// HEARING PROFILE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HearingProfile {
    pub left: EarProfile,
    pub right: EarProfile,
}

impl HearingProfile {
    pub fn new(left: EarProfile, right: EarProfile) -> Self {
        Self { left, right }
    }

    /// Same loss table on both ears.
    pub fn symmetric(ear: EarProfile) -> Self {
        Self {
            left: ear,
            right: ear,
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| EnhanceError::InvalidProfile(e.to_string()))
    }

    pub fn ear(&self, ear: Ear) -> &EarProfile {
        match ear {
            Ear::Left => &self.left,
            Ear::Right => &self.right,
        }
    }
}

// =============================================================================
// TUNING GAIN
// =============================================================================

/// How strongly the profile is corrected, in percent. 0% is no correction,
/// 100% applies the full profile loss as boost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningGain(f32);

impl Default for TuningGain {
    fn default() -> Self {
        TuningGain(DEFAULT_TUNING_PERCENT)
    }
}

impl TuningGain {
    /// Negative and non-finite values are clamped to 0%.
    pub fn from_percent(percent: f32) -> Self {
        if !percent.is_finite() || percent < 0.0 {
            warn!("tuning gain {} is not a valid percentage, using 0%", percent);
            return TuningGain(0.0);
        }
        TuningGain(percent)
    }

    /// Parse the wire value; `None` or a blank string gives the 50% default.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(s) => s
                .parse::<f32>()
                .map(Self::from_percent)
                .map_err(|_| EnhanceError::InvalidProfile(format!("tuning gain '{}' is not a number", s))),
        }
    }

    pub fn percent(&self) -> f32 {
        self.0
    }

    /// Multiplier applied to each dB of loss.
    pub fn gain_factor(&self) -> f32 {
        self.0 / 100.0
    }
}

impl fmt::Display for TuningGain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Serialize for TuningGain {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f32(self.0)
    }
}

impl<'de> Deserialize<'de> for TuningGain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = NumberOrString::deserialize(deserializer)?;
        let v = raw.to_f64().map_err(D::Error::custom)?;
        Ok(TuningGain::from_percent(v as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_profile() {
        let p = HearingProfile::from_json(
            r#"{"left": {"125": 10, "1000": "35.5"}, "right": {"8000": 60}}"#,
        )
        .unwrap();
        assert_eq!(p.left.loss_at(125), Some(10.0));
        assert_eq!(p.left.loss_at(1000), Some(35.5));
        assert_eq!(p.left.loss_at(4000), Some(0.0));
        assert_eq!(p.right.loss_at(8000), Some(60.0));
        assert!(!p.right.is_flat());
    }

    #[test]
    fn test_missing_ear_defaults_to_flat() {
        let p = HearingProfile::from_json(r#"{"left": {"500": 20}}"#).unwrap();
        assert!(p.right.is_flat());
        assert!(HearingProfile::from_json("{}").unwrap().left.is_flat());
    }

    #[test]
    fn test_rejects_non_standard_frequency() {
        assert!(HearingProfile::from_json(r#"{"left": {"300": 20}}"#).is_err());
        assert!(HearingProfile::from_json(r#"{"left": {"1000": "loud"}}"#).is_err());
    }

    #[test]
    fn test_profile_serializes_in_frequency_order() {
        let ear = EarProfile::single(1000, 20.0).unwrap();
        let json = serde_json::to_string(&ear).unwrap();
        assert!(json.starts_with(r#"{"125":0.0,"250":0.0"#));
        assert!(json.contains(r#""1000":20.0"#));

        let back: EarProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ear);
    }

    #[test]
    fn test_tuning_gain_parsing() {
        assert_eq!(TuningGain::parse(None).unwrap().percent(), 50.0);
        assert_eq!(TuningGain::parse(Some(" ")).unwrap().percent(), 50.0);
        assert_eq!(TuningGain::parse(Some("75")).unwrap().gain_factor(), 0.75);
        assert_eq!(TuningGain::parse(Some("-10")).unwrap().percent(), 0.0);
        assert!(TuningGain::parse(Some("abc")).is_err());

        let g: TuningGain = serde_json::from_str(r#""120""#).unwrap();
        assert_eq!(g.percent(), 120.0);
        let g: TuningGain = serde_json::from_str("30").unwrap();
        assert_eq!(g.percent(), 30.0);
    }
}
