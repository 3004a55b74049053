//! Engine configuration.
//!
//! # Responsibility
//! - Describe the area catalog and policy ceilings one deployment runs with.
//! - Load and validate configuration from JSON.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - A config that fails `validate()` is never returned by the loaders.

use crate::engine::planner::{
    PlannerSettings, DEFAULT_MIN_AVAILABLE_PEOPLE, DEFAULT_VERIFIERS_PER_TASK,
};
use crate::engine::swap::DEFAULT_MAX_PENDING_SWAP_REQUESTS;
use crate::model::area::{AreaCatalog, AreaValidationError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_ARCHIVE_AFTER_DAYS: i64 = 30;

/// Configuration loading/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Areas(AreaValidationError),
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::Areas(err) => write!(f, "invalid area catalog: {err}"),
            Self::InvalidValue { field, message } => write!(f, "invalid `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Areas(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<AreaValidationError> for ConfigError {
    fn from(value: AreaValidationError) -> Self {
        Self::Areas(value)
    }
}

/// Rotation engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Areas staffed by each rotation, in tie-break order.
    pub areas: AreaCatalog,
    /// Rotations abort below this pool size. Never lower than 2.
    pub min_available_people: usize,
    pub verifiers_per_task: usize,
    /// Anti-spam ceiling on one person's pending swap requests.
    pub max_pending_swap_requests: usize,
    /// Minimum age of a finally approved task before archival.
    pub archive_after_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            areas: AreaCatalog::default_household(),
            min_available_people: DEFAULT_MIN_AVAILABLE_PEOPLE,
            verifiers_per_task: DEFAULT_VERIFIERS_PER_TASK,
            max_pending_swap_requests: DEFAULT_MAX_PENDING_SWAP_REQUESTS,
            archive_after_days: DEFAULT_ARCHIVE_AFTER_DAYS,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.areas.validate()?;
        if self.min_available_people < DEFAULT_MIN_AVAILABLE_PEOPLE {
            return Err(ConfigError::InvalidValue {
                field: "min_available_people",
                message: format!(
                    "must be at least {DEFAULT_MIN_AVAILABLE_PEOPLE}, got {}",
                    self.min_available_people
                ),
            });
        }
        if self.verifiers_per_task == 0 {
            return Err(ConfigError::InvalidValue {
                field: "verifiers_per_task",
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_pending_swap_requests == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_pending_swap_requests",
                message: "must be at least 1".to_string(),
            });
        }
        if self.archive_after_days < 0 {
            return Err(ConfigError::InvalidValue {
                field: "archive_after_days",
                message: format!("must not be negative, got {}", self.archive_after_days),
            });
        }
        Ok(())
    }

    pub fn planner_settings(&self) -> PlannerSettings {
        PlannerSettings {
            min_available_people: self.min_available_people,
            verifiers_per_task: self.verifiers_per_task,
        }
    }
}
