//! Configuration for the push pipeline
//!
//! Settings come from three layers: built-in defaults, an optional JSON config
//! file, and the environment. Command-line flags are applied last by the CLI
//! runner. The resulting [`PushConfig`] is handed to the pipeline driver
//! explicitly; nothing downstream reads the environment.

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{PusherError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Shared deadline for every remote call of one push
pub const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 10;
/// Docker Engine API version the engine client is pinned to
pub const DEFAULT_ENGINE_API_VERSION: &str = "1.29";
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthConfig {
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `unix:///path`, `tcp://host:port` or `http://host:port`; local socket when unset
    pub host: Option<String>,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: None,
            api_version: DEFAULT_ENGINE_API_VERSION.to_string(),
            timeout_secs: DEFAULT_ENGINE_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// Split `major.minor` into its numeric parts
    pub fn api_version_parts(&self) -> Result<(usize, usize)> {
        let (major, minor) = self.api_version.split_once('.').ok_or_else(|| {
            PusherError::Config(format!(
                "Engine API version must look like 1.29, got '{}'",
                self.api_version
            ))
        })?;

        let parse = |part: &str| {
            part.parse::<usize>().map_err(|_| {
                PusherError::Config(format!("Invalid engine API version '{}'", self.api_version))
            })
        };

        Ok((parse(major)?, parse(minor)?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub skip_tls: bool,
    pub verify_layers: bool,
    pub auth: AuthConfig,
    pub engine: EngineConfig,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_PUSH_TIMEOUT_SECS,
            concurrency: 1,
            skip_tls: false,
            verify_layers: false,
            auth: AuthConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl PushConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PusherError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PusherError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Overlay settings from the process environment
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| env::var(key).ok())
    }

    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DOCKER_HOST") {
            self.engine.host = Some(host);
        }
        if let Some(version) = lookup("DOCKER_API_VERSION") {
            self.engine.api_version = version;
        }
        if let Some(username) = lookup("REGISTRY_USERNAME") {
            self.auth.username = Some(username);
        }
        if let Some(password) = lookup("REGISTRY_PASSWORD") {
            self.auth.password = Some(password);
        }
        if let Some(timeout) = lookup("PAPA_PUSH_TIMEOUT") {
            self.timeout_secs = timeout.parse().map_err(|_| {
                PusherError::Config(format!("PAPA_PUSH_TIMEOUT is not a number: {}", timeout))
            })?;
        }
        if let Some(concurrency) = lookup("PAPA_PUSH_CONCURRENCY") {
            self.concurrency = concurrency.parse().map_err(|_| {
                PusherError::Config(format!(
                    "PAPA_PUSH_CONCURRENCY is not a number: {}",
                    concurrency
                ))
            })?;
        }
        if let Some(skip_tls) = lookup("SKIP_TLS") {
            self.skip_tls = skip_tls == "true";
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        ValidationErrorHandler::validate_timeout(self.timeout_secs)?;
        ValidationErrorHandler::validate_credentials(&self.auth.username, &self.auth.password)?;

        if self.concurrency == 0 {
            return Err(PusherError::Validation(
                "Concurrency must be at least 1".to_string(),
            ));
        }

        self.engine.api_version_parts()?;
        Ok(())
    }
}
