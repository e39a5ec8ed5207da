//! Tool configuration
//!
//! Both tools run with built-in defaults. An optional TOML file can override
//! any subset of keys, and command-line flags override the file.
//!
//! ```toml
//! [bluetooth]
//! address = "00:1A:7D:DA:71:13"
//! scan_attempts = 20
//!
//! [capture]
//! device = "/dev/ttyACM0"
//! max_file_size_mb = 10
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Peripheral the orchestrator manages unless told otherwise
pub const DEFAULT_DEVICE_ADDRESS: &str = "00:1A:7D:DA:71:13";

/// Serial console of the peripheral
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyACM0";

/// Complete configuration for both tools
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bluetooth: BluetoothConfig,
    pub capture: CaptureConfig,
}

/// Connection orchestrator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Device address (e.g., 00:1A:7D:DA:71:13)
    pub address: String,
    /// Bluetooth control utility
    pub ctl_program: String,
    /// Scan loop bound
    pub scan_attempts: u32,
    /// Timeout passed to each external scan call
    pub scan_timeout_secs: u64,
    /// Pause after a scan that did not see the device
    pub scan_pause_secs: u64,
    /// Pair/bond loop bound
    pub pair_attempts: u32,
    /// Timeout passed to each external pair call
    pub pair_timeout_secs: u64,
    /// Pause between pair attempts
    pub pair_retry_secs: u64,
    /// Connect loop bound
    pub connect_attempts: u32,
    /// Pause between connect attempts
    pub connect_retry_secs: u64,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_DEVICE_ADDRESS.to_string(),
            ctl_program: "bluetoothctl".to_string(),
            scan_attempts: 20,
            scan_timeout_secs: 5,
            scan_pause_secs: 1,
            pair_attempts: 10,
            pair_timeout_secs: 10,
            pair_retry_secs: 2,
            connect_attempts: 3,
            connect_retry_secs: 2,
        }
    }
}

impl BluetoothConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn scan_pause(&self) -> Duration {
        Duration::from_secs(self.scan_pause_secs)
    }

    pub fn pair_timeout(&self) -> Duration {
        Duration::from_secs(self.pair_timeout_secs)
    }

    pub fn pair_retry(&self) -> Duration {
        Duration::from_secs(self.pair_retry_secs)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs)
    }
}

/// Which program feeds the capture loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReaderPreference {
    /// tio if present (offering to install it), otherwise cat
    #[default]
    Auto,
    Tio,
    Cat,
    /// In-process reader, requires the `serial` feature
    Native,
}

/// Log capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Serial character device
    pub device: PathBuf,
    /// Directory receiving the log files
    pub log_dir: PathBuf,
    /// Log file name prefix
    pub file_prefix: String,
    /// Rotate once the active file reaches this many whole megabytes
    pub max_file_size_mb: u64,
    /// Baud rate for readers that configure the port
    pub baud_rate: u32,
    pub reader: ReaderPreference,
    pub tio_program: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_SERIAL_DEVICE),
            log_dir: PathBuf::from("serial_logs"),
            file_prefix: "serial".to_string(),
            max_file_size_mb: 10,
            baud_rate: 115200,
            reader: ReaderPreference::Auto,
            tio_program: "tio".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                Self::parse(&content)
                    .with_context(|| format!("Invalid config file: {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse TOML configuration content
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
