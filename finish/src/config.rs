use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::finisher::DEFAULT_TIMEOUT;
use crate::signal::{DEFAULT_SIGNALS, Signal};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which built-in logger a [`Finisher`](crate::Finisher) built from config reports to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerKind {
    #[default]
    Default,
    Stdout,
    Tracing,
}

/// File-based finisher settings.
///
/// ```toml
/// timeout_secs = 30
/// signals = ["interrupt", "terminate", "hangup"]
/// logger = "tracing"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FinishConfig {
    pub timeout_secs: u64,
    pub signals: Vec<Signal>,
    pub logger: LoggerKind,
}

impl Default for FinishConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            signals: DEFAULT_SIGNALS.to_vec(),
            logger: LoggerKind::Default,
        }
    }
}

impl FinishConfig {
    /// Reads the config from `path`, falling back to defaults if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(?config, "Loaded finish config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
