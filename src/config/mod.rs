//! Tenerate configuration — endpoint, timeouts, polling bounds, policies.
//!
//! User-level config: `~/.tenerate/config.yaml`
//! Project-level config: `.tenerate/config.yaml` (overrides user, field by field)
//!
//! Resolution: defaults → user file → project file → env vars → CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::types::SCHEMA_VERSION;

pub const DEFAULT_ENDPOINT: &str = "https://suntenna.herokuapp.com/generations";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported schema version {0} (expected {expected})", expected = SCHEMA_VERSION)]
    UnsupportedSchema(u32),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// How the document identifier is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierMode {
    /// sha256 of the document URI; the endpoint is per-document.
    DocumentHash,
    /// No identifier; the endpoint is global.
    None,
}

/// What to do when the cursor is not on a function definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Do nothing.
    Ignore,
    /// Tell the user why nothing happened.
    Notify,
}

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenerateConfig {
    pub schema_version: u32,
    pub endpoint: String,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub max_poll_duration_secs: u64,
    pub identifier_mode: IdentifierMode,
    pub validation_policy: ValidationPolicy,
}

impl Default for TenerateConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            endpoint: DEFAULT_ENDPOINT.into(),
            request_timeout_secs: 15,
            poll_interval_secs: 15,
            max_poll_attempts: 40,
            max_poll_duration_secs: 600,
            identifier_mode: IdentifierMode::DocumentHash,
            validation_policy: ValidationPolicy::Ignore,
        }
    }
}

/// One config file. Every field optional so files can layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    schema_version: Option<u32>,
    endpoint: Option<String>,
    request_timeout_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    max_poll_attempts: Option<u32>,
    max_poll_duration_secs: Option<u64>,
    identifier_mode: Option<IdentifierMode>,
    validation_policy: Option<ValidationPolicy>,
}

/// Path to `~/.tenerate/`.
fn dirs_path() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|p| PathBuf::from(p).join(".tenerate"))
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME")
            .ok()
            .map(|p| PathBuf::from(p).join(".tenerate"))
    }
}

impl TenerateConfig {
    /// Load from the standard locations and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let user = dirs_path().map(|p| p.join("config.yaml"));
        let project = PathBuf::from(".tenerate/config.yaml");
        Self::load_from(user.as_deref(), Some(&project), |k| std::env::var(k).ok())
    }

    /// Load from explicit paths. Missing files are skipped; unreadable or
    /// invalid ones are errors. `env` looks up environment overrides.
    pub fn load_from(
        user: Option<&Path>,
        project: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for path in [user, project].into_iter().flatten() {
            if let Some(layer) = read_layer(path)? {
                config.merge(layer);
            }
        }
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn merge(&mut self, layer: ConfigLayer) {
        if let Some(v) = layer.schema_version {
            self.schema_version = v;
        }
        if let Some(v) = layer.endpoint {
            self.endpoint = v;
        }
        if let Some(v) = layer.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = layer.poll_interval_secs {
            self.poll_interval_secs = v;
        }
        if let Some(v) = layer.max_poll_attempts {
            self.max_poll_attempts = v;
        }
        if let Some(v) = layer.max_poll_duration_secs {
            self.max_poll_duration_secs = v;
        }
        if let Some(v) = layer.identifier_mode {
            self.identifier_mode = v;
        }
        if let Some(v) = layer.validation_policy {
            self.validation_policy = v;
        }
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(endpoint) = env("TENERATE_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(secs) = env("TENERATE_POLL_INTERVAL_SECS") {
            self.poll_interval_secs = secs.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "TENERATE_POLL_INTERVAL_SECS",
                reason: format!("{e}"),
            })?;
        }
        Ok(())
    }

    /// Check invariants. Also called after CLI overrides are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema(self.schema_version));
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.endpoint.clone()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "poll_interval_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_poll_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "max_poll_attempts",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_poll_duration(&self) -> Duration {
        Duration::from_secs(self.max_poll_duration_secs)
    }

    /// Render as YAML (for `tenerate config`).
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

fn read_layer(path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
}
