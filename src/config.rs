use crate::playback::Timing;
use crate::speech::SpeechConfig;
use crate::tone::ToneConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const APP_DIR: &str = "morseflow";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// User settings. Read-only: nothing is ever written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: Timing,
    pub tone: ToneConfig,
    pub speech: SpeechConfig,
}

impl Config {
    /// `<config dir>/morseflow/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location. A missing file gives the defaults; an
    /// unreadable or invalid one is reported and also gives the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Config::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Config::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using defaults", e);
                Config::default()
            }
        }
    }

    /// Load from an explicit path. Every failure is an error here.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.dot_ms == 0 || self.timing.dash_ms == 0 {
            return Err(ConfigError::Invalid(
                "dot and dash durations must be greater than zero".to_string(),
            ));
        }
        if !(self.tone.frequency_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "tone frequency must be positive (got {})",
                self.tone.frequency_hz
            )));
        }
        if !(0.0..=1.0).contains(&self.tone.volume) {
            return Err(ConfigError::Invalid(format!(
                "tone volume must be between 0.0 and 1.0 (got {})",
                self.tone.volume
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Serialize error: {}", e))
    }
}
