//! Node Configuration
//!
//! Layered from an optional TOML file and `AQM__*` environment variables,
//! e.g. `AQM__LOG_LEVEL=debug` or `AQM__MANAGER__CAPACITY=32`.

use config::{Config, ConfigError, Environment, File, FileFormat};
use sensor_manager::{HostPorts, ManagerConfig};
use sensor_protocol::SensorInfo;
use serde::Deserialize;
use std::time::Duration;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "config/node.toml";

/// Environment variable prefix
const ENV_PREFIX: &str = "AQM";

/// Output format of measurement report lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// `sensor=<id>, measurement=<id>, value=<v>, ts=<ms>`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: ReportFormat,
    /// Skip slots without a decoded value (the `value=-1.00` sentinel lines)
    pub valid_only: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::Text,
            valid_only: true,
        }
    }
}

/// Complete node configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub log_level: String,
    /// Emit log lines as JSON
    pub log_json: bool,
    /// Delay before the sensors are first touched (ms)
    pub startup_delay_ms: u64,
    /// Time between poll passes (ms)
    pub poll_interval_ms: u64,
    /// Retry failed sensors every this many passes; 0 disables retries
    pub retry_every_passes: u64,
    pub manager: ManagerConfig,
    pub report: ReportConfig,
    pub ports: HostPorts,
    pub sensors: Vec<SensorInfo>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            startup_delay_ms: 1000,
            poll_interval_ms: 1000,
            retry_every_passes: 30,
            manager: ManagerConfig::default(),
            report: ReportConfig::default(),
            ports: HostPorts::default(),
            sensors: Vec::new(),
        }
    }
}

impl NodeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

/// Load the configuration file (if present) and apply environment overrides
pub fn load_config(path: Option<&str>) -> Result<NodeConfig, ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);
    Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(environment())
        .build()?
        .try_deserialize()
}

/// Parse a TOML document, without environment overrides
pub fn parse_config(toml: &str) -> Result<NodeConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}
