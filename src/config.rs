//! Configuration management for Sjoelguard.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, SjoelguardError};
use crate::ratelimit::{PolicyOverride, PolicyRegistry};

/// Prefix for environment overrides, e.g. `SJOELGUARD__LIMITER__SWEEP_THRESHOLD=500`.
const ENV_PREFIX: &str = "SJOELGUARD";

/// Main configuration for Sjoelguard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SjoelguardConfig {
    /// Limiter engine configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Replacements for built-in policies, applied once at startup
    #[serde(default)]
    pub policies: Vec<PolicyOverride>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Limiter engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Store size above which a check triggers a sweep of expired entries
    #[serde(default = "default_sweep_threshold")]
    pub sweep_threshold: usize,

    /// Interval of the optional background sweeper, in seconds
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            sweep_threshold: default_sweep_threshold(),
            sweep_interval_secs: None,
        }
    }
}

fn default_sweep_threshold() -> usize {
    1000
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SjoelguardConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SjoelguardError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load configuration from an optional YAML file layered with
    /// `SJOELGUARD__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(SjoelguardError::Config(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            info!(path = %path.display(), "Loading configuration");
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Yaml));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
            .map_err(SjoelguardError::from)
    }

    /// Build the policy registry, applying configured overrides.
    ///
    /// Call this at startup: an override naming an unregistered policy is a
    /// configuration bug and must stop the process.
    pub fn build_registry(&self) -> Result<PolicyRegistry> {
        PolicyRegistry::with_overrides(&self.policies)
    }

    /// Interval of the background sweeper, if enabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.limiter
            .sweep_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
