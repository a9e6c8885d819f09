// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// The port the relay listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 8000;

/// What the message queue does when it is bounded and full.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// The producing collector waits until the distributor frees a slot.
    #[default]
    Block,
    /// The incoming message is discarded.
    DropNewest,
    /// The oldest pending message is evicted to make room.
    DropOldest,
}

/// Capacity settings for the broadcast queue.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct QueueConfig {
    /// Maximum number of pending messages. `0` means unbounded.
    #[serde(default)]
    pub capacity: usize,
    /// Applied only when `capacity` is non-zero.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    8878
}

/// The complete, validated server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Longest inbound line accepted, in bytes, excluding the terminator.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Upper bound on a single broadcast write to one connection.
    #[serde(with = "humantime_serde", default = "default_write_timeout")]
    pub write_timeout: Duration,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10_000
}
fn default_max_line_length() -> usize {
    crate::core::protocol::DEFAULT_MAX_LINE_LENGTH
}
fn default_write_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            max_line_length: default_max_line_length(),
            write_timeout: default_write_timeout(),
            queue: QueueConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Loads and validates a configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists. A missing file is only an error when the
    /// operator named it explicitly; otherwise the defaults are used.
    pub fn load(path: &str, explicit: bool) -> Result<Self> {
        if !explicit && !Path::new(path).exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.max_line_length == 0 {
            return Err(anyhow!("max_line_length cannot be 0"));
        }
        if self.write_timeout.is_zero() {
            return Err(anyhow!("write_timeout cannot be 0"));
        }
        if self.metrics.enabled && self.metrics.port == self.port {
            return Err(anyhow!(
                "metrics.port ({}) cannot be the same as the relay port",
                self.metrics.port
            ));
        }
        if self.queue.capacity == 0 && self.queue.overflow_policy != OverflowPolicy::Block {
            warn!(
                "queue.overflow_policy is set but queue.capacity is 0 (unbounded); the policy has no effect."
            );
        }
        Ok(())
    }
}
