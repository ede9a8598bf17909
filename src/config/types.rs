//! Core configuration types.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults::{default_database_path, default_description, default_max_clients};
use super::modules::ModulesConfig;
use super::trust::TrustCheckConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Services configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Identity of this services server.
    pub server: ServerConfig,
    /// The single upstream link.
    pub uplink: UplinkConfig,
    /// Persistent store.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Trust-check (TC/TR) admission control.
    #[serde(default)]
    pub trust_check: TrustCheckConfig,
    /// Service modules.
    #[serde(default)]
    pub modules: ModulesConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Services server identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "services.straylight.net").
    pub name: String,
    /// Server description sent in the SERVER line.
    #[serde(default = "default_description")]
    pub description: String,
    /// P10 server numeric (2 base64 characters).
    pub numeric: String,
    /// Client capacity mask appended to the numeric in the SERVER line.
    #[serde(default = "default_max_clients")]
    pub max_clients: String,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    pub metrics_port: Option<u16>,
}

/// Upstream link configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UplinkConfig {
    /// `host:port` of the hub to connect to.
    pub address: String,
    /// Link password sent in PASS and expected back from the hub.
    pub password: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}
