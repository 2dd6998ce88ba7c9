//! Configuration management for the gateway
//!
//! Supports configuration via:
//! - Environment variables (primary)
//! - Optional TOML config file (secondary)
//!
//! Environment variables take precedence over config file values.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::logger::{Level, LoggerKind};

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long in-flight requests may run after shutdown starts (default: 10)
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Bytes of non-file multipart form fields buffered per upload (default: 10MiB)
    #[serde(default = "default_max_form_memory")]
    pub max_form_memory: usize,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            request_timeout_secs: default_request_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            max_form_memory: default_max_form_memory(),
        }
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_max_form_memory() -> usize {
    10 << 20 // 10MiB
}

/// Storage backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Fixed endpoint for S3-compatible services; SDK resolution when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Signing region; AWS default chain when unset
    #[serde(default)]
    pub region: Option<String>,
}

/// Request logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Request logger implementation (default: json)
    #[serde(default)]
    pub logger_type: LoggerKind,

    /// Minimum level for both request and process logs (default: info)
    #[serde(default = "default_log_level")]
    pub level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logger_type: LoggerKind::default(),
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> Level {
    Level::Info
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - GATEWAY_CONFIG_FILE: optional path to TOML config file
    /// - GATEWAY_BIND_ADDRESS: server bind address (default: 0.0.0.0:8080)
    /// - GATEWAY_REQUEST_TIMEOUT_SECS: per-request timeout (default: 30)
    /// - GATEWAY_SHUTDOWN_GRACE_SECS: shutdown grace period (default: 10)
    /// - GATEWAY_MAX_FORM_MEMORY: buffered multipart form bytes (default: 10MiB)
    /// - GATEWAY_LOG_LEVEL: log level (default: info)
    /// - DEFAULT_LOGGER_TYPE: request logger, json|noop (default: json)
    /// - S3_BUCKET_ENDPOINT: custom storage endpoint (optional)
    /// - AWS_REGION: storage signing region (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset and empty are treated alike.
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut config = match var("GATEWAY_CONFIG_FILE") {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(addr) = var("GATEWAY_BIND_ADDRESS") {
            config.server.bind_address = addr
                .parse()
                .map_err(|_| ConfigError::invalid("GATEWAY_BIND_ADDRESS", &addr))?;
        }

        if let Some(timeout) = var("GATEWAY_REQUEST_TIMEOUT_SECS") {
            config.server.request_timeout_secs = timeout
                .parse()
                .map_err(|_| ConfigError::invalid("GATEWAY_REQUEST_TIMEOUT_SECS", &timeout))?;
        }

        if let Some(grace) = var("GATEWAY_SHUTDOWN_GRACE_SECS") {
            config.server.shutdown_grace_secs = grace
                .parse()
                .map_err(|_| ConfigError::invalid("GATEWAY_SHUTDOWN_GRACE_SECS", &grace))?;
        }

        if let Some(size) = var("GATEWAY_MAX_FORM_MEMORY") {
            config.server.max_form_memory = size
                .parse()
                .map_err(|_| ConfigError::invalid("GATEWAY_MAX_FORM_MEMORY", &size))?;
        }

        if let Some(level) = var("GATEWAY_LOG_LEVEL") {
            config.logging.level = level
                .parse()
                .map_err(|_| ConfigError::invalid("GATEWAY_LOG_LEVEL", &level))?;
        }

        if let Some(kind) = var("DEFAULT_LOGGER_TYPE") {
            config.logging.logger_type = kind
                .parse()
                .map_err(|_| ConfigError::invalid("DEFAULT_LOGGER_TYPE", &kind))?;
        }

        if let Some(endpoint) = var("S3_BUCKET_ENDPOINT") {
            config.storage.endpoint = Some(endpoint);
        }

        if let Some(region) = var("AWS_REGION") {
            config.storage.region = Some(region);
        }

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(10));
        assert_eq!(config.server.max_form_memory, 10 * 1024 * 1024);
        assert_eq!(config.logging.logger_type, LoggerKind::Json);
        assert_eq!(config.logging.level, Level::Info);
        assert!(config.storage.endpoint.is_none());
        assert!(config.storage.region.is_none());
    }

    #[test]
    fn test_environment_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GATEWAY_BIND_ADDRESS", "127.0.0.1:9000"),
            ("GATEWAY_LOG_LEVEL", "debug"),
            ("DEFAULT_LOGGER_TYPE", "noop"),
            ("S3_BUCKET_ENDPOINT", "http://minio:9000"),
            ("AWS_REGION", "eu-west-1"),
        ]))
        .unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.logging.level, Level::Debug);
        assert_eq!(config.logging.logger_type, LoggerKind::Noop);
        assert_eq!(config.storage.endpoint.as_deref(), Some("http://minio:9000"));
        assert_eq!(config.storage.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_empty_endpoint_means_default_resolution() {
        let config = Config::from_lookup(lookup(&[("S3_BUCKET_ENDPOINT", "")])).unwrap();
        assert!(config.storage.endpoint.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[("DEFAULT_LOGGER_TYPE", "syslog")])).unwrap_err();
        assert!(err.to_string().contains("DEFAULT_LOGGER_TYPE"));

        let err = Config::from_lookup(lookup(&[("GATEWAY_BIND_ADDRESS", "nowhere")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_toml_file_with_environment_precedence() {
        let path = std::env::temp_dir()
            .join(format!("gateway-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
[server]
bind_address = "127.0.0.1:7000"
request_timeout_secs = 5

[storage]
endpoint = "http://from-file:9000"

[logging]
logger_type = "zerolog"
level = "warn"
"#,
        )
        .unwrap();

        let path_str = path.to_string_lossy().to_string();
        let config = Config::from_lookup(lookup(&[
            ("GATEWAY_CONFIG_FILE", path_str.as_str()),
            ("S3_BUCKET_ENDPOINT", "http://from-env:9000"),
        ]))
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:7000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server.request_timeout_secs, 5);
        assert_eq!(config.server.shutdown_grace_secs, 10);
        assert_eq!(config.logging.logger_type, LoggerKind::Json);
        assert_eq!(config.logging.level, Level::Warn);
        assert_eq!(config.storage.endpoint.as_deref(), Some("http://from-env:9000"));
    }
}
