//! Configuration for the workers.
//!
//! Settings are layered with `figment`: built-in defaults, then an optional
//! TOML file, then `PROC_STATS_` prefixed environment variables. Nested keys
//! are separated with `__`, e.g. `PROC_STATS_COLLECTOR__RETENTION=120`.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    /// Port for the Prometheus exporter. The exporter is not installed when
    /// unset.
    pub metrics_port: Option<u16>,
    pub tracer: TracerConfig,
    pub collector: CollectorConfig,
}

/// Logging and trace export.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Export spans over OTLP.
    pub otlp: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
            otlp: false,
        }
    }
}

/// Process tracer settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TracerConfig {
    pub interval_ms: u64,
    pub output_path: PathBuf,
    /// Completed processes retained before the oldest are evicted.
    pub completed_capacity: usize,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            output_path: PathBuf::from("proc-tracer-data.json"),
            completed_capacity: 1000,
        }
    }
}

impl TracerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Stats collector settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub interval_ms: u64,
    pub output_path: PathBuf,
    /// Readings kept per channel.
    pub retention: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            output_path: PathBuf::from("stats-data.json"),
            retention: 60,
        }
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load and validate configuration, reading `path` as TOML if given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed("PROC_STATS_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the workers cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracer.interval_ms == 0 {
            return Err(ConfigError::Invalid("tracer.interval_ms must be > 0".into()));
        }
        if self.collector.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "collector.interval_ms must be > 0".into(),
            ));
        }
        if self.tracer.completed_capacity == 0 {
            return Err(ConfigError::Invalid(
                "tracer.completed_capacity must be > 0".into(),
            ));
        }
        if self.collector.retention == 0 {
            return Err(ConfigError::Invalid(
                "collector.retention must be > 0".into(),
            ));
        }
        Ok(())
    }
}
