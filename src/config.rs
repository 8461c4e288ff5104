use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub decode: DecodeConfig,
    #[serde(default)]
    pub onset: OnsetConfig,
    #[serde(default)]
    pub tempo: TempoConfig,
    #[serde(default)]
    pub beats: BeatConfig,
    #[serde(default)]
    pub deviation: DeviationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecodeConfig {
    /// Ceiling on decode time, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f32,
    /// Clips shorter than this are rejected as insufficient
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OnsetConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TempoConfig {
    #[serde(default = "default_min_bpm")]
    pub min_bpm: f32,
    #[serde(default = "default_max_bpm")]
    pub max_bpm: f32,
    /// Centre of the log-normal tempo prior
    #[serde(default = "default_prior_center")]
    pub prior_center_bpm: f32,
    /// Standard deviation of the prior, in octaves
    #[serde(default = "default_prior_width")]
    pub prior_width_octaves: f32,
    /// Relative score difference under which two candidates count as tied
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f32,
    #[serde(default = "default_min_active_frames")]
    pub min_active_frames: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BeatConfig {
    /// Search half-width around the expected beat period, as a fraction of it
    #[serde(default = "default_tolerance_ratio")]
    pub tolerance_ratio: f32,
    /// Weight of the quadratic gap penalty
    #[serde(default = "default_tightness")]
    pub tightness: f32,
    #[serde(default = "default_min_beat_gap")]
    pub min_beat_gap_secs: f32,
    /// Edge beats weaker than this (normalised strength) are trimmed
    #[serde(default = "default_trim_threshold")]
    pub trim_threshold: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviationConfig {
    #[serde(default = "default_deviation_tolerance")]
    pub tolerance_secs: f32,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            min_duration_secs: default_min_duration(),
        }
    }
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            hop_size: default_hop_size(),
        }
    }
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: default_min_bpm(),
            max_bpm: default_max_bpm(),
            prior_center_bpm: default_prior_center(),
            prior_width_octaves: default_prior_width(),
            tie_epsilon: default_tie_epsilon(),
            min_active_frames: default_min_active_frames(),
        }
    }
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            tolerance_ratio: default_tolerance_ratio(),
            tightness: default_tightness(),
            min_beat_gap_secs: default_min_beat_gap(),
            trim_threshold: default_trim_threshold(),
        }
    }
}

impl Default for DeviationConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: default_deviation_tolerance(),
        }
    }
}

fn default_timeout_secs() -> f32 { 30.0 }
fn default_min_duration() -> f32 { 1.0 }
fn default_window_size() -> usize { 2048 }
fn default_hop_size() -> usize { 512 }
fn default_min_bpm() -> f32 { 40.0 }
fn default_max_bpm() -> f32 { 240.0 }
fn default_prior_center() -> f32 { 120.0 }
fn default_prior_width() -> f32 { 1.0 }
fn default_tie_epsilon() -> f32 { 0.01 }
fn default_min_active_frames() -> usize { 4 }
fn default_tolerance_ratio() -> f32 { 0.35 }
fn default_tightness() -> f32 { 4.0 }
fn default_min_beat_gap() -> f32 { 0.1 }
fn default_trim_threshold() -> f32 { 0.1 }
fn default_deviation_tolerance() -> f32 { 0.1 }

impl Config {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name, reason: &str| ConfigError::Invalid {
            name,
            reason: reason.to_string(),
        };

        if self.onset.window_size < 2 {
            return Err(invalid("onset.window_size", "must be at least 2"));
        }
        if self.onset.hop_size == 0 || self.onset.hop_size > self.onset.window_size {
            return Err(invalid("onset.hop_size", "must be in 1..=window_size"));
        }
        if !(self.tempo.min_bpm > 0.0 && self.tempo.min_bpm < self.tempo.max_bpm) {
            return Err(invalid("tempo.min_bpm", "must be positive and below tempo.max_bpm"));
        }
        if self.tempo.prior_center_bpm <= 0.0 || self.tempo.prior_width_octaves <= 0.0 {
            return Err(invalid("tempo.prior_center_bpm", "prior centre and width must be positive"));
        }
        if !(0.0..1.0).contains(&self.beats.tolerance_ratio) {
            return Err(invalid("beats.tolerance_ratio", "must be in [0, 1)"));
        }
        if self.beats.min_beat_gap_secs < 0.0 {
            return Err(invalid("beats.min_beat_gap_secs", "must not be negative"));
        }
        if self.deviation.tolerance_secs <= 0.0 {
            return Err(invalid("deviation.tolerance_secs", "must be positive"));
        }
        if self.decode.timeout_secs <= 0.0 {
            return Err(invalid("decode.timeout_secs", "must be positive"));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Locate a config file: `./beatcheck.toml`, then the XDG-style and
/// platform config directories.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("beatcheck.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("beatcheck").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("beatcheck").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
