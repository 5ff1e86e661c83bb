//! Configuration file parsing for the sensor and its client
//!
//! Supports multiple configuration file formats:
//! - TOML (.toml)
//! - YAML (.yaml, .yml)
//! - JSON (.json)

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Parse config content with the given format
pub fn parse_config<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T> {
    let config = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };
    Ok(config)
}

/// Load a config file, detecting the format from its extension
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }

    let format = ConfigFormat::from_path(path).ok_or_else(|| {
        Error::ConfigError(format!(
            "Unsupported config file extension: {}. Expected .toml, .yaml, .yml, or .json",
            path.display()
        ))
    })?;

    let content = std::fs::read_to_string(path)?;
    parse_config(&content, format)
}

/// Load `explicit` if given, else the first of `candidates` found in `dir`,
/// else the type's defaults
fn load_or_default<T: DeserializeOwned + Default>(
    explicit: Option<&Path>,
    dir: &Path,
    candidates: &[&str],
) -> Result<(T, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((load_config(path)?, Some(path.to_path_buf())));
    }
    for name in candidates {
        let path = dir.join(name);
        if path.exists() {
            return Ok((load_config(&path)?, Some(path)));
        }
    }
    Ok((T::default(), None))
}

/// Host/port pair of a remote HTTP service
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServiceEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_HOST, DEFAULT_AUTH_PORT)
    }
}

/// REST listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Defaults to `~/.dms/sensor.db`
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(db_path)
    }
}

/// Background scheduler timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_millis: u64,
    pub refresh_every_ticks: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_millis: DEFAULT_TICK_MILLIS,
            refresh_every_ticks: DEFAULT_REFRESH_EVERY_TICKS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// When set, logs are also written to daily-rotated files in this directory
    pub dir: Option<PathBuf>,
}

/// Sensor daemon configuration (sensor.toml/yaml/json)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SensorConfig {
    pub server: ServerConfig,
    pub auth_service: ServiceEndpoint,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

impl SensorConfig {
    /// Load from an explicit path, or search `~/.dms`, or fall back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let config: (Self, Option<PathBuf>) =
            load_or_default(explicit, &dms_home(), SENSOR_CONFIG_FILES)?;
        config.0.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tick_millis == 0 {
            return Err(Error::config("scheduler.tick_millis must be greater than 0"));
        }
        if self.scheduler.refresh_every_ticks == 0 {
            return Err(Error::config(
                "scheduler.refresh_every_ticks must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// A sensor the client can talk to
#[derive(Debug, Clone, Deserialize)]
pub struct SensorEndpoint {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl SensorEndpoint {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Operator client configuration (client.toml/yaml/json)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub auth_service: ServiceEndpoint,
    pub sensors: Vec<SensorEndpoint>,
}

impl ClientConfig {
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        load_or_default(explicit, &dms_home(), CLIENT_CONFIG_FILES)
    }

    /// Pick a sensor by name, or the first configured one
    pub fn sensor(&self, name: Option<&str>) -> Result<&SensorEndpoint> {
        match name {
            Some(name) => self
                .sensors
                .iter()
                .find(|s| s.name == name)
                .ok_or_else(|| Error::config(format!("No sensor named '{}' configured", name))),
            None => self
                .sensors
                .first()
                .ok_or_else(|| Error::config("No sensors configured")),
        }
    }
}
