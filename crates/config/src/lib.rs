//! Configuration schema and loader for the book service.
//!
//! One YAML document configures both binaries: the server reads the
//! listen address, locking and shutdown settings; the client reads the
//! address and the retry policy. Every field has a default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host the server listens on and the client connects to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long the server lets in-flight calls drain after a
    /// termination signal before forcing shutdown.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Per-record lock acquisition settings.
    #[serde(default)]
    pub locking: LockingConfig,

    /// Client-side retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Optional Prometheus metrics HTTP port.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            locking: LockingConfig::default(),
            retry: RetryConfig::default(),
            metrics_port: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockingConfig {
    /// Timed attempts before an operation reports busy.
    #[serde(default = "default_lock_max_attempts")]
    pub max_attempts: u32,

    /// Length of one attempt in milliseconds.
    #[serde(default = "default_lock_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_lock_max_attempts(),
            attempt_timeout_ms: default_lock_attempt_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, the first one included.
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    /// First backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Growth factor applied after every backoff.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

// --- Defaults ---

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8980
}
fn default_shutdown_grace_ms() -> u64 {
    5000
}
fn default_lock_max_attempts() -> u32 {
    50
}
fn default_lock_attempt_timeout_ms() -> u64 {
    100
}
fn default_retry_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    200
}
fn default_max_backoff_ms() -> u64 {
    2000
}
fn default_multiplier() -> f64 {
    2.0
}

// --- Derived values ---

impl Config {
    /// `host:port`, suitable for address resolution.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `http://host:port`, the tonic endpoint URI.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.address())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl LockingConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.locking.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "locking.max_attempts must be > 0".into(),
            ));
        }
        if self.locking.attempt_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "locking.attempt_timeout_ms must be > 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.initial_backoff_ms ({}) must be <= retry.max_backoff_ms ({})",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            )));
        }
        if !(self.retry.multiplier >= 1.0 && self.retry.multiplier.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier ({}) must be a finite number >= 1.0",
                self.retry.multiplier
            )));
        }
        Ok(())
    }
}

/// Load a `Config` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Load a `Config` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}
