//! Structured logging setup.

use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry};

use crate::config::{Config, LogFormat};
use crate::error::AppError;

/// Configuration for the log subscriber.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter, used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl From<&Config> for TracingConfig {
    fn from(config: &Config) -> Self {
        Self {
            log_level: config.log_level.clone(),
            format: config.log_format,
        }
    }
}

impl TracingConfig {
    /// `RUST_LOG` if set, otherwise the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_tracing(config: &TracingConfig) -> Result<(), AppError> {
    let subscriber = Registry::default().with(config.env_filter());

    let installed = match config.format {
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .json(),
            )
            .try_init(),
    };
    installed.map_err(|e| AppError::Internal(format!("Failed to initialize tracing: {}", e)))?;

    info!(level = %config.log_level, format = ?config.format, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_follows_app_config() {
        let config = Config {
            log_level: "debug".to_string(),
            log_format: LogFormat::Json,
            ..Config::default()
        };
        let tracing = TracingConfig::from(&config);
        assert_eq!(tracing.log_level, "debug");
        assert_eq!(tracing.format, LogFormat::Json);
    }

    #[test]
    fn test_second_init_fails() {
        let config = TracingConfig::default();
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
