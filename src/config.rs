//! Configuration System using Figment
//!
//! Strongly-typed configuration for an acquisition session. Configuration is loaded from:
//! 1. `config/print_daq.toml` (or an explicit path)
//! 2. Environment variables prefixed with `PRINT_DAQ_`, nested keys separated by `__`
//!
//! Every section has defaults, so an empty file (or no file at all) yields a usable
//! configuration pointing at the default printer address.
//!
//! # Example
//! ```no_run
//! use print_daq::config::AcquisitionConfig;
//!
//! let config = AcquisitionConfig::load()?;
//! println!("Printer: {}", config.printer.status_base_url());
//! # Ok::<(), print_daq::error::DaqError>(())
//! ```

use crate::error::{AppResult, DaqError};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/print_daq.toml";

/// Top-level acquisition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Printer endpoints and sensor name
    pub printer: PrinterConfig,
    /// Status polling cadence
    pub status: StatusConfig,
    /// Rolling feature window
    pub features: FeatureConfig,
    /// Output file locations
    pub output: OutputConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "print_daq".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Printer (Moonraker) connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Hostname or IP address of the printer host
    pub host: String,
    /// Moonraker port
    pub port: u16,
    /// Accelerometer name as declared in the printer configuration
    pub sensor: String,
    /// Explicit REST base URL, overriding `host`/`port`
    pub status_url: Option<String>,
    /// Explicit WebSocket URL, overriding `host`/`port`
    pub stream_url: Option<String>,
    /// Timeout for a single status request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Delay before the sample stream is opened
    #[serde(with = "humantime_serde")]
    pub connect_delay: Duration,
    /// Run against a simulated printer instead of real hardware
    pub mock: bool,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            host: "192.168.50.10".to_string(),
            port: 7125,
            sensor: "adxl345".to_string(),
            status_url: None,
            stream_url: None,
            request_timeout: Duration::from_secs(3),
            connect_delay: Duration::from_secs(1),
            mock: false,
        }
    }
}

impl PrinterConfig {
    /// Base URL of the REST API used for status polling.
    pub fn status_base_url(&self) -> String {
        self.status_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }

    /// URL of the WebSocket that carries accelerometer samples.
    pub fn stream_endpoint(&self) -> String {
        self.stream_url
            .clone()
            .unwrap_or_else(|| format!("ws://{}:{}/klippysocket", self.host, self.port))
    }
}

/// Status polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Delay between successful polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Delay after a failed poll
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

/// Rolling statistics configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Number of most recent samples kept per axis
    pub window_length: usize,
    /// Accepted samples between two feature computations
    pub step_size: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_length: 1000,
            step_size: 200,
        }
    }
}

impl FeatureConfig {
    /// Minimum window fill before features are emitted.
    pub fn min_fill(&self) -> usize {
        self.window_length / 2
    }
}

/// Output file configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory that receives the CSV files
    pub dir: PathBuf,
    /// Session name used as file prefix
    pub session_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            session_name: "print".to_string(),
        }
    }
}

impl OutputConfig {
    /// Raw accelerometer log path.
    pub fn raw_path(&self) -> PathBuf {
        self.dir.join(format!("{}_raw.csv", self.session_name))
    }

    /// Rolling feature log path.
    pub fn features_path(&self) -> PathBuf {
        self.dir.join(format!("{}_features.csv", self.session_name))
    }

    /// Status audit log path.
    pub fn status_path(&self) -> PathBuf {
        self.dir.join(format!("{}_status.csv", self.session_name))
    }
}

impl AcquisitionConfig {
    /// Load configuration from `config/print_daq.toml` and environment variables
    ///
    /// Environment variables can override configuration with prefix `PRINT_DAQ_`.
    /// Example: `PRINT_DAQ_STATUS__POLL_INTERVAL=500ms`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::figment(path.as_ref()).extract().map_err(DaqError::from)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AcquisitionConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PRINT_DAQ_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.printer.port == 0 {
            return Err(DaqError::Configuration(
                "Printer port must be greater than 0".to_string(),
            ));
        }
        if self.printer.sensor.trim().is_empty() {
            return Err(DaqError::Configuration(
                "Sensor name cannot be empty".to_string(),
            ));
        }

        if self.status.poll_interval.is_zero() || self.status.retry_backoff.is_zero() {
            return Err(DaqError::Configuration(
                "Status poll_interval and retry_backoff must be non-zero".to_string(),
            ));
        }

        if self.features.window_length < 2 {
            return Err(DaqError::Configuration(format!(
                "Invalid window_length {}. Must be at least 2",
                self.features.window_length
            )));
        }
        if self.features.step_size == 0 {
            return Err(DaqError::Configuration(
                "step_size must be greater than 0".to_string(),
            ));
        }

        if self.output.session_name.trim().is_empty() {
            return Err(DaqError::Configuration(
                "Session name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
