//! Startup configuration.
//!
//! Values are layered with figment, lowest precedence first: built-in
//! defaults, `signal-stream.toml`, `signal-stream.yaml`, then environment
//! variables prefixed with `SIGSTREAM_` (for example
//! `SIGSTREAM_OVERFLOW_POLICY=skip`). Everything here is fixed for the
//! lifetime of the process; only the window size can change later, through
//! the pipeline's `window_size` property.

use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::constants::{files, pipeline, signal};
use crate::error::ConfigError;
use crate::types::OverflowPolicy;

/// Serde helper for Duration serialization/deserialization as milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Where blocks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    /// Generated sine tones; needs no hardware.
    Synthetic,
    /// The default input device (requires the `device` feature).
    Device,
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

/// Application configuration loaded from multiple sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Sample rate of the input signal in hertz
    pub sample_rate: f64,

    /// Number of signal channels
    pub channels: usize,

    /// Frames delivered per capture callback
    pub default_time_step: usize,

    /// Initial analysis window size in frames
    pub default_window_size: usize,

    /// Hand-off queue behaviour when the consumer falls behind
    pub overflow_policy: OverflowPolicy,

    /// Interval between queue-health reports
    #[serde(with = "duration_ms", rename = "report_interval_ms")]
    pub report_interval: Duration,

    /// HTTP server host
    pub server_host: String,

    /// HTTP server port
    pub server_port: u16,

    /// Block producer
    pub capture_source: CaptureKind,

    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: signal::DEFAULT_SAMPLE_RATE,
            channels: signal::DEFAULT_CHANNELS,
            default_time_step: signal::DEFAULT_TIME_STEP,
            default_window_size: signal::DEFAULT_WINDOW_SIZE,
            overflow_policy: OverflowPolicy::Unbounded,
            report_interval: pipeline::DEFAULT_REPORT_INTERVAL,
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            capture_source: CaptureKind::Synthetic,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

impl Config {
    /// Load configuration with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. signal-stream.yaml (if exists)
    /// 3. signal-stream.toml (if exists)
    /// 4. Built-in defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The standard provider stack used by [`Config::load`].
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(files::CONFIG_TOML))
            .merge(Yaml::file(files::CONFIG_YAML))
            .merge(Env::prefixed(files::ENV_PREFIX))
    }

    /// Extract and validate a configuration from an arbitrary provider stack.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config.validate()?;
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::Validation(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }

        if self.channels == 0 || self.channels > signal::MAX_CHANNELS {
            return Err(ConfigError::Validation(format!(
                "channels must be between 1 and {}, got {}",
                signal::MAX_CHANNELS,
                self.channels
            )));
        }

        if self.default_time_step == 0 || self.default_time_step > signal::MAX_WINDOW_SIZE {
            return Err(ConfigError::Validation(format!(
                "default_time_step must be between 1 and {}, got {}",
                signal::MAX_WINDOW_SIZE,
                self.default_time_step
            )));
        }

        if self.default_window_size == 0 || self.default_window_size > signal::MAX_WINDOW_SIZE {
            return Err(ConfigError::InvalidWindowSize {
                requested: self.default_window_size,
                max: signal::MAX_WINDOW_SIZE,
            });
        }

        if self.report_interval.is_zero() {
            return Err(ConfigError::Validation(
                "report_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.server_host.is_empty() {
            return Err(ConfigError::Validation(
                "server_host cannot be empty".to_string(),
            ));
        }

        if self.server_port == 0 {
            return Err(ConfigError::Validation(
                "server_port must be between 1 and 65535".to_string(),
            ));
        }

        Ok(())
    }

    /// Wall-clock duration of one block at the configured rate.
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.default_time_step as f64 / self.sample_rate)
    }

    /// `host:port` string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Export configuration to TOML format
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Load(format!("Failed to serialize to TOML: {}", e)))
    }

    /// Export configuration to YAML format
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Load(format!("Failed to serialize to YAML: {}", e)))
    }
}
