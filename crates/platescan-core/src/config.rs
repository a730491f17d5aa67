//! Station configuration.
//!
//! Loads the static device configuration from a TOML file. The device key
//! may be overridden with the `PLATESCAN_DEVICE_KEY` environment variable so
//! that it does not need to live in the file.
//!
//! ```toml
//! [device]
//! device_id = "LabDevice1"
//! device_key = "c2VjcmV0"
//!
//! [hub]
//! host = "example-hub.azure-devices.net"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};

/// Environment variable overriding `device.device_key`.
pub const DEVICE_KEY_ENV: &str = "PLATESCAN_DEVICE_KEY";

/// Complete station configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub hub: HubConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub card: CardConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Device identity as registered with the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_id: String,
    /// Base64 encoded shared access key.
    pub device_key: String,
}

/// IoT Hub endpoint and channel tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: u32,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

/// Wireless credentials for the target build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

/// Scanner bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_address")]
    pub address: u8,
    #[serde(default = "default_bus_frequency")]
    pub frequency_hz: u32,
}

/// Card storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardConfig {
    #[serde(default = "default_card_block")]
    pub block: u8,
    #[serde(default = "default_removal_poll")]
    pub removal_poll_ms: u64,
}

/// Status display geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_lines")]
    pub lines: usize,
    #[serde(default = "default_display_columns")]
    pub columns: usize,
}

/// Control loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    #[serde(default = "default_loop_interval")]
    pub loop_interval_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_HUB_PORT
}
fn default_token_ttl() -> u32 {
    DEFAULT_TOKEN_TTL_MINUTES
}
fn default_reconnect_delay() -> u64 {
    DEFAULT_RECONNECT_DELAY_SECS
}
fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}
fn default_keep_alive() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}
fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}
fn default_bus_address() -> u8 {
    DEFAULT_BUS_ADDRESS
}
fn default_bus_frequency() -> u32 {
    DEFAULT_BUS_FREQUENCY_HZ
}
fn default_card_block() -> u8 {
    DEFAULT_CARD_BLOCK
}
fn default_removal_poll() -> u64 {
    DEFAULT_REMOVAL_POLL_MS
}
fn default_display_lines() -> usize {
    DEFAULT_DISPLAY_LINES
}
fn default_display_columns() -> usize {
    DEFAULT_DISPLAY_COLUMNS
}
fn default_debounce() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
fn default_loop_interval() -> u64 {
    DEFAULT_LOOP_INTERVAL_MS
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_BUS_ADDRESS,
            frequency_hz: DEFAULT_BUS_FREQUENCY_HZ,
        }
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            block: DEFAULT_CARD_BLOCK,
            removal_poll_ms: DEFAULT_REMOVAL_POLL_MS,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            lines: DEFAULT_DISPLAY_LINES,
            columns: DEFAULT_DISPLAY_COLUMNS,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            loop_interval_ms: DEFAULT_LOOP_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// `PLATESCAN_DEVICE_KEY` overrides the device key from the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or fails
    /// validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;

        if let Ok(key) = std::env::var(DEVICE_KEY_ENV) {
            tracing::info!("Using {} from environment", DEVICE_KEY_ENV);
            config.device.device_key = key;
        }

        config.validate()?;
        tracing::debug!(path = %path.display(), device_id = %config.device.device_id, "Configuration loaded");
        Ok(config)
    }

    /// Parse configuration from TOML text without validating it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not valid configuration TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingConfig` for empty required values and
    /// `Error::Config` for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.device.device_id.trim().is_empty() {
            return Err(Error::MissingConfig("device.device_id".to_string()));
        }
        if self.device.device_key.trim().is_empty() {
            return Err(Error::MissingConfig("device.device_key".to_string()));
        }
        if self.hub.host.trim().is_empty() {
            return Err(Error::MissingConfig("hub.host".to_string()));
        }
        if self.hub.token_ttl_minutes == 0 {
            return Err(Error::Config(
                "hub.token_ttl_minutes must be greater than 0".to_string(),
            ));
        }
        if self.hub.buffer_size == 0 {
            return Err(Error::Config(
                "hub.buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.bus.address > 0x7F {
            return Err(Error::Config(format!(
                "bus.address 0x{:02X} is not a 7-bit address",
                self.bus.address
            )));
        }
        // Block 0 holds the manufacturer data and every fourth block is a
        // sector trailer holding the keys.
        if self.card.block == 0 || self.card.block % 4 == 3 {
            return Err(Error::Config(format!(
                "card.block {} is not a data block",
                self.card.block
            )));
        }
        if self.display.lines == 0 || self.display.columns == 0 {
            return Err(Error::Config(
                "display must have at least one line and column".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [device]
        device_id = "LabDevice1"
        device_key = "c2VjcmV0"

        [hub]
        host = "hub.azure-devices.net"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.hub.port, 8883);
        assert_eq!(config.hub.token_ttl_minutes, 60);
        assert_eq!(config.hub.reconnect_delay_secs, 5);
        assert_eq!(config.hub.buffer_size, 1024);
        assert_eq!(config.bus.address, 0x10);
        assert_eq!(config.card.block, 4);
        assert_eq!(config.session.debounce_ms, 200);
        assert_eq!(config.display.columns, 21);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        assert!(config.validate().is_ok());

        config.device.device_id = " ".to_string();
        assert!(matches!(config.validate(), Err(Error::MissingConfig(_))));
        config.device.device_id = "LabDevice1".to_string();

        config.hub.token_ttl_minutes = 0;
        assert!(config.validate().is_err());
        config.hub.token_ttl_minutes = 60;

        config.bus.address = 0x80;
        assert!(config.validate().is_err());
        config.bus.address = 0x10;

        config.card.block = 7;
        assert!(config.validate().is_err());
        config.card.block = 0;
        assert!(config.validate().is_err());
        config.card.block = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_config_parses() {
        let config =
            Config::from_toml_str(include_str!("../../../platescan.example.toml")).unwrap();
        assert_eq!(config.bus.address, 0x10);
        assert_eq!(config.display.lines, 4);
        // Shipped without a key
        assert!(matches!(config.validate(), Err(Error::MissingConfig(_))));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = Config::from_toml_str("[device]\ndevice_id = 3");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/platescan.toml");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
