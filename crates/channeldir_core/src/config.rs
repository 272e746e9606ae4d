//! Directory configuration loaded from YAML.
//!
//! # Invariants
//! - Missing keys fall back to defaults; unknown keys are rejected.
//! - A config returned by `load`/`from_yaml_str` has passed `validate`.

use crate::logging::{default_log_level, normalize_level, normalize_log_dir};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// Whole read-merge-write re-runs allowed after a version conflict.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 1;
pub const MAX_CONFLICT_RETRIES: u32 = 16;

#[derive(Debug)]
pub enum ConfigError {
    Load(String),
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(message) => write!(f, "configuration load error: {message}"),
            Self::Validation(message) => write!(f, "configuration validation error: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_level")]
    pub log_level: String,
    /// File logging is off when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("channeldir.db")
}

fn default_level() -> String {
    default_log_level().to_string()
}

fn default_conflict_retries() -> u32 {
    DEFAULT_CONFLICT_RETRIES
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_level(),
            log_dir: None,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

impl DirectoryConfig {
    /// Reads and validates a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            ConfigError::Load(format!("failed to read `{}`: {err}", path.display()))
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)
            .map_err(|err| ConfigError::Load(format!("failed to parse YAML: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "database_path cannot be empty".to_string(),
            ));
        }
        if self.conflict_retries > MAX_CONFLICT_RETRIES {
            return Err(ConfigError::Validation(format!(
                "conflict_retries must be at most {MAX_CONFLICT_RETRIES}, got {}",
                self.conflict_retries
            )));
        }
        normalize_level(&self.log_level)
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        if let Some(dir) = &self.log_dir {
            normalize_log_dir(&dir.to_string_lossy())
                .map_err(|err| ConfigError::Validation(err.to_string()))?;
        }
        Ok(())
    }
}
