//! Configuration loading for Hookline.
//!
//! The canonical configuration lives in `hookline-config.yaml` at the
//! project root. Every section and field is optional; anything missing
//! falls back to the defaults below.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `hookline-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HooklineConfig {
    /// Tick loop settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Listener-side settings.
    #[serde(default)]
    pub listeners: ListenerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where hook data is saved.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl HooklineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `HOOKLINE_SNAPSHOT_PATH` overrides `persistence.snapshot_path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.persistence.apply_env_overrides();
        Ok(config)
    }
}

/// Tick loop configuration.
///
/// A value of 0 for `max_ticks` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Real-time milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Simulated milliseconds each tick advances the world by.
    #[serde(default = "default_tick_step_ms")]
    pub tick_step_ms: u64,

    /// Maximum number of ticks before the session ends (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            tick_step_ms: default_tick_step_ms(),
            max_ticks: 0,
        }
    }
}

/// Listener-side configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerConfig {
    /// Capacity of each scripting-side signal queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG`
    /// is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// File the hook snapshot is written to and read from.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

impl PersistenceConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOOKLINE_SNAPSHOT_PATH") {
            self.snapshot_path = PathBuf::from(val);
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_tick_step_ms() -> u64 {
    100
}

const fn default_queue_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("hookline-snapshot.json")
}
