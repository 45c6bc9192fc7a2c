mod batch;
mod client;
mod logging;
mod sessions;

pub use batch::*;
pub use client::*;
pub use logging::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a TOML config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut error = |field: &str, message: String| {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message,
            })
        };

        if self.client.resolve_token().is_none() {
            error(
                "client.tracer_token",
                format!(
                    "no tracer token configured (set client.tracer_token or ${})",
                    self.client.token_env
                ),
            );
        }

        if !(self.client.base_url.starts_with("http://")
            || self.client.base_url.starts_with("https://"))
        {
            error(
                "client.base_url",
                "base_url must start with http:// or https://".into(),
            );
        }

        if self.client.chunk_size == 0 {
            error("client.chunk_size", "chunk_size must be greater than 0".into());
        }

        if let Err(e) = validate_namespace(&self.sessions.namespace) {
            error("sessions.namespace", e.to_string());
        }

        if self.sessions.inactivity_timeout_secs == 0 {
            error(
                "sessions.inactivity_timeout_secs",
                "inactivity timeout must be greater than 0".into(),
            );
        }

        if self.batch.batch_size == 0 {
            error("batch.batch_size", "batch_size must be greater than 0".into());
        }

        if self.client.timeout_ms < 1_000 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "client.timeout_ms".into(),
                message: "request timeout under one second will drop most uploads".into(),
            });
        }

        if self.batch.flush_interval_secs == 0 && self.batch.batch_size > 1 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "batch.flush_interval_secs".into(),
                message: "periodic flush disabled; records wait for a full batch or shutdown"
                    .into(),
            });
        }

        errors
    }
}
