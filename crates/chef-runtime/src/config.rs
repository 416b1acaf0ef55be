//! Session configuration.

use chef_econ::combo::ComboConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

/// Timings, seeds and storage locations for one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Period of the economy/combo ticker.
    pub tick_ms: u64,
    /// Period of the background snapshot.
    pub save_ms: u64,
    /// Fixed RNG seed; random when absent.
    pub rng_seed: Option<u64>,
    /// Length of a case reveal.
    pub reveal_ms: i64,
    /// How long a successful sync stays visible.
    pub sync_success_ms: u64,
    pub combo: ComboConfig,
    /// Directory holding local snapshots.
    pub save_dir: String,
    /// Leaderboard database; sync is disabled when empty.
    pub leaderboard_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            save_ms: 5_000,
            rng_seed: None,
            reveal_ms: chef_casino::unboxing::REVEAL_DURATION_MS,
            sync_success_ms: persistence::sync::SUCCESS_DISPLAY_MS,
            combo: ComboConfig::default(),
            save_dir: persistence::default_save_dir().to_string(),
            leaderboard_url: persistence::default_sqlite_url().to_string(),
        }
    }
}

impl SessionConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let cfg: SessionConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 || self.save_ms == 0 {
            return Err(ConfigError::Invalid("tick and save periods must be > 0".into()));
        }
        if self.reveal_ms < 0 {
            return Err(ConfigError::Invalid("reveal_ms must be >= 0".into()));
        }
        self.combo
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Seconds of income per fast tick.
    pub fn tick_fraction(&self) -> f64 {
        self.tick_ms as f64 / 1000.0
    }
}
