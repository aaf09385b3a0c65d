//! Store configuration.
//!
//! # Responsibility
//! - Hold connection-level knobs (lock wait limit, auditor, FK enforcement).
//! - Load overrides from process environment for CLI callers.
//!
//! # Invariants
//! - `busy_timeout_ms` is the only lock-wait limit; exceeding it surfaces as
//!   `RepoError::LockTimeout`.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const ENV_BUSY_TIMEOUT_MS: &str = "ROSTER_BUSY_TIMEOUT_MS";
pub const ENV_AUDITOR: &str = "ROSTER_AUDITOR";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_AUDITOR: &str = "system";

/// Connection and session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a statement waits on a held lock before failing.
    pub busy_timeout_ms: u64,
    /// Principal written to `created_by` / `updated_by`.
    pub auditor: String,
    /// Whether `PRAGMA foreign_keys` is switched on.
    pub foreign_keys: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            auditor: DEFAULT_AUDITOR.to_string(),
            foreign_keys: true,
        }
    }
}

impl StoreConfig {
    /// Defaults overlaid with `ROSTER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StoreConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms =
                raw.trim()
                    .parse::<u64>()
                    .map_err(|err| ConfigError::InvalidValue {
                        key: ENV_BUSY_TIMEOUT_MS,
                        value: raw.clone(),
                        message: err.to_string(),
                    })?;
        }

        if let Some(raw) = lookup(ENV_AUDITOR) {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_AUDITOR,
                    value: raw.clone(),
                    message: "auditor cannot be blank".to_string(),
                });
            }
            config.auditor = trimmed.to_string();
        }

        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Configuration loading error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                key,
                value,
                message,
            } => write!(f, "invalid value `{value}` for `{key}`: {message}"),
        }
    }
}

impl Error for ConfigError {}
