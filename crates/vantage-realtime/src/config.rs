//! Client configuration.
//!
//! Values come from an optional file (TOML, YAML or JSON, by extension) and
//! are overridden by `VANTAGE_`-prefixed environment variables. Nested keys
//! use a double underscore: `VANTAGE_RECONNECT__DELAY_MS=500`.

use crate::client::ClientOptions;
use crate::error::{RealtimeError, Result};
use crate::observability::LogFormat;
use crate::reconnect::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "VANTAGE";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_endpoint"))]
pub struct RealtimeConfig {
    /// Streaming endpoint.
    pub url: String,
    /// Bound on one connect attempt, in milliseconds.
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u64,
    /// Reconnect schedule.
    #[validate(nested)]
    pub reconnect: ReconnectConfig,
    /// Log level for binaries.
    pub log_level: String,
    /// Log format for binaries (`pretty` or `json`).
    pub log_format: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws".to_string(),
            connect_timeout_ms: 10_000,
            reconnect: ReconnectConfig::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Reconnect strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStrategy {
    /// Same delay every time.
    #[default]
    Fixed,
    /// Growing delay up to a cap.
    Exponential,
}

/// Reconnect configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_delays"))]
pub struct ReconnectConfig {
    /// Strategy to use.
    pub strategy: ReconnectStrategy,
    /// Fixed delay, or the first delay of the exponential strategy (ms).
    #[validate(range(min = 1))]
    pub delay_ms: u64,
    /// Cap of the exponential strategy (ms).
    pub max_delay_ms: u64,
    /// Growth factor of the exponential strategy.
    #[validate(range(min = 1.0))]
    pub multiplier: f64,
    /// Add up to 25% random jitter.
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::Fixed,
            delay_ms: 3000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: false,
        }
    }
}

fn validate_endpoint(config: &RealtimeConfig) -> std::result::Result<(), ValidationError> {
    match url::Url::parse(&config.url) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => Ok(()),
        _ => {
            let mut err = ValidationError::new("url");
            err.message = Some(format!("not a ws:// or wss:// url: {}", config.url).into());
            Err(err)
        }
    }
}

fn validate_delays(config: &ReconnectConfig) -> std::result::Result<(), ValidationError> {
    if config.max_delay_ms < config.delay_ms {
        let mut err = ValidationError::new("max_delay_ms");
        err.message = Some("max_delay_ms must not be below delay_ms".into());
        return Err(err);
    }
    Ok(())
}

impl RealtimeConfig {
    /// Load from an optional file and the `VANTAGE_` environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Load from an optional file and environment variables under `prefix`.
    pub fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: RealtimeConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(RealtimeError::from)
    }

    /// Options for [`RealtimeClient`](crate::RealtimeClient).
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            reconnect: ReconnectPolicy::from(&self.reconnect),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    /// Parsed log format.
    pub fn log_format(&self) -> LogFormat {
        LogFormat::parse(&self.log_format)
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        match config.strategy {
            ReconnectStrategy::Fixed => ReconnectPolicy::Fixed {
                delay: Duration::from_millis(config.delay_ms),
            },
            ReconnectStrategy::Exponential => ReconnectPolicy::Exponential {
                initial: Duration::from_millis(config.delay_ms),
                max: Duration::from_millis(config.max_delay_ms),
                multiplier: config.multiplier,
                jitter: config.jitter,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(extension: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(extension)
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = RealtimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.client_options(),
            ClientOptions {
                reconnect: ReconnectPolicy::fixed(Duration::from_millis(3000)),
                connect_timeout: Duration::from_millis(10_000),
            }
        );
        assert_eq!(config.log_format(), LogFormat::Pretty);
    }

    #[test]
    fn test_load_toml_file() {
        let file = write_config(
            ".toml",
            r#"
url = "wss://feeds.example.com/ws"
log_format = "json"

[reconnect]
strategy = "exponential"
delay_ms = 500
max_delay_ms = 8000
jitter = true
"#,
        );

        let config = RealtimeConfig::load_with_prefix(Some(file.path()), "VANTAGE_TEST_TOML").unwrap();
        assert_eq!(config.url, "wss://feeds.example.com/ws");
        assert_eq!(config.connect_timeout_ms, 10_000);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(
            config.client_options().reconnect,
            ReconnectPolicy::Exponential {
                initial: Duration::from_millis(500),
                max: Duration::from_millis(8000),
                multiplier: 2.0,
                jitter: true,
            }
        );
    }

    #[test]
    fn test_load_yaml_file() {
        let file = write_config(
            ".yaml",
            "url: ws://localhost:9000/ws\nreconnect:\n  delay_ms: 1000\n  max_delay_ms: 1000\n",
        );

        let config = RealtimeConfig::load_with_prefix(Some(file.path()), "VANTAGE_TEST_YAML").unwrap();
        assert_eq!(config.url, "ws://localhost:9000/ws");
        assert_eq!(config.reconnect.delay_ms, 1000);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config(".toml", "url = \"ws://file.local/ws\"\n");
        std::env::set_var("VANTAGE_TEST_ENV_URL", "ws://env.local/ws");
        std::env::set_var("VANTAGE_TEST_ENV_RECONNECT__DELAY_MS", "250");

        let config = RealtimeConfig::load_with_prefix(Some(file.path()), "VANTAGE_TEST_ENV").unwrap();

        std::env::remove_var("VANTAGE_TEST_ENV_URL");
        std::env::remove_var("VANTAGE_TEST_ENV_RECONNECT__DELAY_MS");

        assert_eq!(config.url, "ws://env.local/ws");
        assert_eq!(config.reconnect.delay_ms, 250);
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = RealtimeConfig::load_with_prefix(
            Some(Path::new("/nonexistent/vantage.toml")),
            "VANTAGE_TEST_MISSING",
        );
        assert!(matches!(result, Err(RealtimeError::Config(_))));
    }

    #[test]
    fn test_no_file_uses_defaults() {
        let config = RealtimeConfig::load_with_prefix(None, "VANTAGE_TEST_NONE").unwrap();
        assert_eq!(config, RealtimeConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RealtimeConfig {
            url: "http://example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RealtimeError::Config(_))));

        config.url = "ws://example.com/ws".to_string();
        config.connect_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.connect_timeout_ms = 1;
        config.reconnect.delay_ms = 5000;
        config.reconnect.max_delay_ms = 1000;
        assert!(config.validate().is_err());

        config.reconnect.max_delay_ms = 5000;
        config.reconnect.multiplier = 0.5;
        assert!(config.validate().is_err());

        config.reconnect.multiplier = 1.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_file_value_rejected() {
        let file = write_config(".toml", "connect_timeout_ms = 0\n");
        let result = RealtimeConfig::load_with_prefix(Some(file.path()), "VANTAGE_TEST_INVALID");
        assert!(matches!(result, Err(RealtimeError::Config(_))));
    }
}
