//! # Configuration Management
//!
//! Centralized configuration for a server instance.
//!
//! This module provides structured configuration for the listener, the wire
//! protocol limits, the worker pool, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! All fields have defaults, so a `ServerConfig::default()` is immediately
//! usable for local development.

use crate::error::{Result, WireError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use tracing::Level;

/// Default maximum frame payload size in bytes.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 4096;

/// Default cap on concurrently registered connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// Default number of dispatcher workers.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 20;

/// IP version the listener binds with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    #[default]
    V4,
    V6,
}

/// Main configuration structure for one server instance.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServerConfig {
    /// Listener configuration
    #[serde(default)]
    pub server: ListenConfig,

    /// Protocol and resource limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| WireError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| WireError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| WireError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(host) = std::env::var("WIREGATE_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("WIREGATE_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                config.server.port = val;
            }
        }

        if let Ok(max) = std::env::var("WIREGATE_MAX_CONNECTIONS") {
            if let Ok(val) = max.parse::<usize>() {
                config.limits.max_connections = val;
            }
        }

        if let Ok(size) = std::env::var("WIREGATE_MAX_PACKET_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.limits.max_packet_size = val;
            }
        }

        if let Ok(workers) = std::env::var("WIREGATE_WORKER_POOL_SIZE") {
            if let Ok(val) = workers.parse::<usize>() {
                config.limits.worker_pool_size = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.limits.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(WireError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenConfig {
    /// IP version the listener binds with
    pub ip_version: IpVersion,

    /// Bind host (e.g. "127.0.0.1")
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Server name, used for diagnostics only
    pub name: String,

    /// Server version string, used for diagnostics only
    pub version: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            ip_version: IpVersion::V4,
            host: String::from("127.0.0.1"),
            port: 8000,
            name: String::from("wiregate"),
            version: String::from(env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ListenConfig {
    /// Resolve the configured host and port to a socket address matching the
    /// configured IP version.
    ///
    /// Resolution failure is a startup fault and is surfaced to the caller.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let candidates = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| {
                WireError::ConfigError(format!(
                    "Failed to resolve {}:{}: {e}",
                    self.host, self.port
                ))
            })?;

        let wanted_v4 = self.ip_version == IpVersion::V4;
        candidates
            .into_iter()
            .find(|addr| addr.is_ipv4() == wanted_v4)
            .ok_or_else(|| {
                WireError::ConfigError(format!(
                    "No {:?} address found for {}:{}",
                    self.ip_version, self.host, self.port
                ))
            })
    }

    /// Validate listener configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.is_empty() {
            errors.push("Bind host cannot be empty".to_string());
        }

        if self.name.is_empty() {
            errors.push("Server name cannot be empty".to_string());
        }

        errors
    }
}

/// Protocol and resource limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum allowed frame payload size in bytes
    pub max_packet_size: usize,

    /// Maximum number of concurrently registered connections
    pub max_connections: usize,

    /// Number of dispatcher workers
    pub worker_pool_size: usize,

    /// Capacity of each worker's task queue
    pub worker_queue_len: usize,

    /// Capacity of each connection's outbound send queue
    pub send_queue_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            worker_queue_len: 1024,
            send_queue_len: 1024,
        }
    }
}

impl LimitsConfig {
    /// Validate limit configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_packet_size == 0 {
            errors.push("Max packet size cannot be 0".to_string());
        } else if self.max_packet_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max packet size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_packet_size
            ));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        }

        if self.worker_pool_size == 0 {
            errors.push("Worker pool size must be greater than 0".to_string());
        } else if self.worker_pool_size > 1024 {
            errors.push(format!(
                "Worker pool size very high: {} (each worker is a long-lived task)",
                self.worker_pool_size
            ));
        }

        if self.worker_queue_len == 0 {
            errors.push("Worker queue length must be greater than 0".to_string());
        }

        if self.send_queue_len == 0 {
            errors.push("Send queue length must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.limits.max_packet_size, DEFAULT_MAX_PACKET_SIZE);
        assert_eq!(config.limits.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn toml_round_trip() {
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9100
            name = "edge"

            [limits]
            max_packet_size = 8192
            worker_pool_size = 4
        "#;
        let config = ServerConfig::from_toml(toml).expect("should parse");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.limits.max_packet_size, 8192);
        assert_eq!(config.limits.worker_pool_size, 4);
        // Unspecified fields keep their defaults.
        assert_eq!(config.limits.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn zero_limits_rejected() {
        let config = ServerConfig::default_with_overrides(|c| {
            c.limits.max_packet_size = 0;
            c.limits.worker_pool_size = 0;
        });
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(config.validate_strict().is_err());
    }

    #[test]
    fn bind_addr_resolves_v4() {
        let config = ListenConfig::default();
        let addr = config.bind_addr().expect("should resolve");
        assert!(addr.is_ipv4());
        assert_eq!(addr.port(), 8000);
    }
}
