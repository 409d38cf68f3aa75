// Reward configuration: the caller-facing knobs of one generation call.
//
// `RewardConfig` is deserialized from the same camelCase JSON the game
// keeps in its settings panel. Every field has a default, so `{}` is a
// valid config; unknown keys are rejected so a typo never silently falls
// back to a default.
//
// Most knobs only shape the output (loudness tier, timbre, voicing). Three
// change which parameters reach the composer:
//   - `skip_envelope` uses the behavior-derived parameters as they are,
//   - `expert_mode` together with an explicit `reward_bpm` or
//     `dynamic_contrast` uses those explicit values instead,
//   - otherwise the safety envelope clamps everything.
// See pipeline.rs for how these resolve.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shortest and longest reward the composer will build, in seconds.
pub const MIN_REWARD_SEC: f64 = 8.0;
pub const MAX_REWARD_SEC: f64 = 45.0;
pub const DEFAULT_REWARD_SEC: f64 = 20.0;

// ---------------------------------------------------------------------------
// Option enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl VolumeLevel {
    /// Base MIDI velocity of this tier.
    pub fn velocity(self) -> f64 {
        match self {
            VolumeLevel::Low => 50.0,
            VolumeLevel::Medium => 75.0,
            VolumeLevel::High => 95.0,
        }
    }

    /// Normalized loudness an expert override stands for.
    pub fn volume(self) -> f64 {
        match self {
            VolumeLevel::Low => 0.4,
            VolumeLevel::Medium => 0.7,
            VolumeLevel::High => 0.9,
        }
    }

    /// Tier of a normalized loudness.
    pub fn from_volume(volume: f64) -> Self {
        if volume > 0.8 {
            VolumeLevel::High
        } else if volume < 0.5 {
            VolumeLevel::Low
        } else {
            VolumeLevel::Medium
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhythmDensity {
    Sparse,
    #[default]
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timbre {
    #[default]
    Soft,
    Bright,
}

impl Timbre {
    pub fn velocity_scale(self) -> f64 {
        match self {
            Timbre::Soft => 0.85,
            Timbre::Bright => 1.1,
        }
    }
}

/// Fixed chord progressions, written as roman numerals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmonyType {
    #[serde(rename = "I-V")]
    OneFive,
    #[serde(rename = "I-IV")]
    OneFour,
    #[serde(rename = "I-vi")]
    OneSix,
    #[serde(rename = "I-IV-V")]
    OneFourFive,
    #[serde(rename = "I-vi-IV-V")]
    OneSixFourFive,
}

impl HarmonyType {
    /// Progression as scale-degree indices (I = 0, IV = 3, V = 4, vi = 5).
    pub fn degrees(self) -> &'static [usize] {
        match self {
            HarmonyType::OneFive => &[0, 4],
            HarmonyType::OneFour => &[0, 3],
            HarmonyType::OneSix => &[0, 5],
            HarmonyType::OneFourFive => &[0, 3, 4, 0],
            HarmonyType::OneSixFourFive => &[0, 5, 3, 4],
        }
    }
}

/// Single-instrument voicing that replaces the style's ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentChoice {
    Piano,
    Epiano,
    Guitar,
    Strings,
}

impl InstrumentChoice {
    /// Catalog key in style.rs.
    pub fn catalog_name(self) -> &'static str {
        match self {
            InstrumentChoice::Piano => "piano",
            InstrumentChoice::Epiano => "epiano",
            InstrumentChoice::Guitar => "guitar",
            InstrumentChoice::Strings => "strings",
        }
    }
}

// ---------------------------------------------------------------------------
// RewardConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct RewardConfig {
    /// Loudness tier. `None` derives it from the resolved volume.
    pub volume_level: Option<VolumeLevel>,
    pub rhythm_density: RhythmDensity,
    pub timbre: Timbre,
    /// Replaces the style's chord progression.
    pub harmony_type: Option<HarmonyType>,
    /// Replaces the style's instruments.
    pub instrument: Option<InstrumentChoice>,
    /// `false` returns an empty sequence.
    pub reward_enabled: bool,
    /// Requested length; see `target_duration_sec`.
    pub reward_duration_sec: f64,
    /// Explicit tempo, honored only in expert mode.
    pub reward_bpm: Option<u32>,
    pub expert_mode: bool,
    /// Explicit dynamic contrast, honored only in expert mode.
    pub dynamic_contrast: Option<f64>,
    pub segment_start_sec: Option<f64>,
    pub segment_end_sec: Option<f64>,
    /// Fixed seed. `None` derives one from the trace.
    pub seed: Option<u32>,
    /// Use behavior-derived parameters without clamping.
    pub skip_envelope: bool,
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            volume_level: None,
            rhythm_density: RhythmDensity::Normal,
            timbre: Timbre::Soft,
            harmony_type: None,
            instrument: None,
            reward_enabled: true,
            reward_duration_sec: DEFAULT_REWARD_SEC,
            reward_bpm: None,
            expert_mode: false,
            dynamic_contrast: None,
            segment_start_sec: None,
            segment_end_sec: None,
            seed: None,
            skip_envelope: false,
        }
    }
}

impl RewardConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        log::debug!(target: "config", "loaded reward config from {}", path.display());
        Ok(config)
    }

    /// Requested duration clamped to the supported span. Non-finite values
    /// fall back to the default.
    pub fn target_duration_sec(&self) -> f64 {
        if self.reward_duration_sec.is_finite() {
            self.reward_duration_sec.clamp(MIN_REWARD_SEC, MAX_REWARD_SEC)
        } else {
            log::warn!(
                target: "config",
                "rewardDurationSec {} is not finite, using {DEFAULT_REWARD_SEC}",
                self.reward_duration_sec
            );
            DEFAULT_REWARD_SEC
        }
    }

    /// Whether explicit expert values bypass the envelope.
    pub fn expert_override(&self) -> bool {
        self.expert_mode && (self.reward_bpm.is_some() || self.dynamic_contrast.is_some())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let config = RewardConfig::from_json("{}").unwrap();
        assert_eq!(config, RewardConfig::default());
        assert!(config.reward_enabled);
        assert_eq!(config.target_duration_sec(), 20.0);
    }

    #[test]
    fn loads_camel_case_fields() {
        let config = RewardConfig::from_json(
            r#"{
                "volumeLevel": "high",
                "rhythmDensity": "sparse",
                "timbre": "bright",
                "harmonyType": "I-vi-IV-V",
                "instrument": "guitar",
                "rewardDurationSec": 30,
                "rewardBpm": 96,
                "expertMode": true,
                "segmentStartSec": 2.5,
                "seed": 7
            }"#,
        )
        .unwrap();
        assert_eq!(config.volume_level, Some(VolumeLevel::High));
        assert_eq!(config.rhythm_density, RhythmDensity::Sparse);
        assert_eq!(config.timbre, Timbre::Bright);
        assert_eq!(config.harmony_type, Some(HarmonyType::OneSixFourFive));
        assert_eq!(config.instrument, Some(InstrumentChoice::Guitar));
        assert_eq!(config.segment_start_sec, Some(2.5));
        assert_eq!(config.seed, Some(7));
        assert!(config.expert_override());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = RewardConfig::from_json(r#"{"rewardBPM": 90}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn duration_is_clamped() {
        let mut config = RewardConfig {
            reward_duration_sec: 3.0,
            ..RewardConfig::default()
        };
        assert_eq!(config.target_duration_sec(), MIN_REWARD_SEC);
        config.reward_duration_sec = 600.0;
        assert_eq!(config.target_duration_sec(), MAX_REWARD_SEC);
        config.reward_duration_sec = f64::NAN;
        assert_eq!(config.target_duration_sec(), DEFAULT_REWARD_SEC);
    }

    #[test]
    fn expert_mode_alone_is_not_an_override() {
        let config = RewardConfig {
            expert_mode: true,
            ..RewardConfig::default()
        };
        assert!(!config.expert_override());
        let config = RewardConfig {
            dynamic_contrast: Some(0.3),
            ..RewardConfig::default()
        };
        assert!(!config.expert_override());
    }

    #[test]
    fn volume_tiers() {
        assert_eq!(VolumeLevel::from_volume(0.9), VolumeLevel::High);
        assert_eq!(VolumeLevel::from_volume(0.8), VolumeLevel::Medium);
        assert_eq!(VolumeLevel::from_volume(0.45), VolumeLevel::Low);
    }

    #[test]
    fn harmony_degrees() {
        assert_eq!(HarmonyType::OneFourFive.degrees(), &[0, 3, 4, 0]);
        let parsed: HarmonyType = serde_json::from_str(r#""I-IV""#).unwrap();
        assert_eq!(parsed, HarmonyType::OneFour);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = RewardConfig::load(Path::new("/nonexistent/reward.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
