//! Settings and the immutable per-session recorder config.
//!
//! `Settings` is what a TOML file or the CLI produces; `PttConfig` is the
//! validated, chord-parsed form the controller consumes. Every
//! `InvalidConfig` condition is rejected here, before a controller
//! exists.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use pushtalk_foundation::ConfigError;
use pushtalk_keyboard::KeyChord;

pub const SETTINGS_FILE: &str = "pushtalk.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PttMode {
    Hold,
    Toggle,
    Hybrid,
}

impl PttMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PttMode::Hold => "hold",
            PttMode::Toggle => "toggle",
            PttMode::Hybrid => "hybrid",
        }
    }
}

impl std::str::FromStr for PttMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hold" => Ok(PttMode::Hold),
            "toggle" => Ok(PttMode::Toggle),
            "hybrid" => Ok(PttMode::Hybrid),
            other => Err(ConfigError::Validation {
                field: "ptt.mode",
                reason: format!("unknown mode {:?} (hold|toggle|hybrid)", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub ptt: PttSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PttSettings {
    /// Routes the FallbackShim to the PTT recorder when true.
    pub enabled: bool,
    pub mode: PttMode,
    pub trigger_chord: String,
    pub cancel_key: String,
    /// Session hard cap; 0 disables.
    pub timeout_ms: u64,
    pub min_duration_ms: u64,
    /// Hybrid auto-stop threshold.
    pub silence_threshold_ms: u64,
    pub vad_aggressiveness: u8,
    /// Named input device override; host default when unset.
    pub device: Option<String>,
}

impl Default for PttSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: PttMode::Hold,
            trigger_chord: "ctrl+space".to_string(),
            cancel_key: "esc".to_string(),
            timeout_ms: 120_000,
            min_duration_ms: 500,
            silence_threshold_ms: 1_500,
            vad_aggressiveness: 2,
            device: None,
        }
    }
}

impl Settings {
    /// Load from an explicit path, or from `pushtalk.toml` in the working
    /// directory when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = Path::new(SETTINGS_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default.to_path_buf()
            }
        };
        let raw = std::fs::read_to_string(&path)?;
        let settings: Settings =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        tracing::info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }
}

/// Immutable recorder configuration for one session.
#[derive(Debug, Clone)]
pub struct PttConfig {
    pub mode: PttMode,
    pub trigger_chord: KeyChord,
    pub cancel_chord: KeyChord,
    /// Zero disables the cap.
    pub max_duration: Duration,
    pub min_duration: Duration,
    pub silence_threshold: Duration,
    pub vad_aggressiveness: u8,
}

impl PttConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vad_aggressiveness > 3 {
            return Err(ConfigError::OutOfRange {
                field: "ptt.vad_aggressiveness",
                reason: format!("{} not in 0..=3", self.vad_aggressiveness),
            });
        }
        if !self.max_duration.is_zero() && self.min_duration > self.max_duration {
            return Err(ConfigError::Validation {
                field: "ptt.min_duration_ms",
                reason: format!(
                    "min_duration ({:?}) exceeds max_duration ({:?})",
                    self.min_duration, self.max_duration
                ),
            });
        }
        Ok(())
    }
}

impl PttSettings {
    pub fn to_config(&self) -> Result<PttConfig, ConfigError> {
        let trigger_chord: KeyChord = self.trigger_chord.parse()?;
        let cancel_chord: KeyChord = self.cancel_key.parse()?;
        let config = PttConfig {
            mode: self.mode,
            trigger_chord,
            cancel_chord,
            max_duration: Duration::from_millis(self.timeout_ms),
            min_duration: Duration::from_millis(self.min_duration_ms),
            silence_threshold: Duration::from_millis(self.silence_threshold_ms),
            vad_aggressiveness: self.vad_aggressiveness,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Convert a caller-supplied duration in (possibly fractional) seconds.
/// Negative and non-finite values are rejected.
pub fn duration_from_secs(field: &'static str, seconds: f64) -> Result<Duration, ConfigError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ConfigError::OutOfRange {
            field,
            reason: format!("{} is not a valid duration in seconds", seconds),
        });
    }
    Ok(Duration::from_secs_f64(seconds))
}
