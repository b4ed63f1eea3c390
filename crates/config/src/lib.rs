//! flowd Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid configuration: NetFlow on 127.0.0.1:2055, info
//! logging, metrics every minute.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use flowd_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[netflow]\nport = 9995").unwrap();
//! assert_eq!(config.netflow.bind_address(), "127.0.0.1:9995");
//! ```
//!
//! # Example Full Config
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "console"
//!
//! [metrics]
//! enabled = true
//! interval = "60s"
//!
//! [netflow]
//! address = "0.0.0.0"
//! port = 2055
//! num_workers = 8
//! backlog = 1000
//! packet_size = 2048
//! pool_size = 1000
//! recv_buffer_size = 4194304
//! prefill_pool = true
//! ```

mod error;
mod logging;
mod metrics;
mod netflow;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use metrics::MetricsConfig;
pub use netflow::NetflowConfig;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Metrics reporting configuration
    pub metrics: MetricsConfig,

    /// NetFlow v5 source
    pub netflow: NetflowConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
