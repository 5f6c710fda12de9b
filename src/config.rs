//! Panel configuration file
//!
//! The TOML file carries the broker settings, the stored Wi-Fi credentials used by
//! the host link adapter, the connectivity timing policy and the locations of the
//! persisted state files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Main panel configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanelConfig {
    pub device: DeviceSection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub wifi: WifiSection,
    #[serde(default)]
    pub timing: ConnectivityPolicy,
    #[serde(default)]
    pub storage: StorageSection,
}

/// Device identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Unique device identifier, used as the broker client id (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Human readable name, part of every topic
    #[serde(default = "default_device_name")]
    pub name: String,
}

/// Broker section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL with scheme and optional port (`mqtt://` or `mqtts://`)
    pub broker_url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Maximum packet size accepted from the broker
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
}

/// Stored link credentials and association hints for the host link adapter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WifiSection {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// Access point identifier, `AA:BB:CC:DD:EE:FF`
    pub bssid: Option<String>,
}

impl Default for WifiSection {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            channel: default_channel(),
            bssid: None,
        }
    }
}

/// Locations of the persisted connectivity state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSection {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_link_cache_file")]
    pub link_cache_file: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            link_cache_file: default_link_cache_file(),
        }
    }
}

/// Timeouts and pacing of the connectivity state machine.
///
/// Every timeout is relative to entry into the phase that owns it. Shorter
/// liveness intervals detect failures faster at the cost of radio time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectivityPolicy {
    #[serde(default = "default_fast_link_timeout")]
    pub fast_link_timeout_ms: u64,
    #[serde(default = "default_normal_link_timeout")]
    pub normal_link_timeout_ms: u64,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_ms: u64,
    #[serde(default = "default_liveness_interval")]
    pub liveness_interval_ms: u64,
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_ms: u64,
    /// Pause after a non-retained publish or a subscribe (broker flow control)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Pause after resetting the link before the next association attempt
    #[serde(default = "default_link_reset_delay")]
    pub link_reset_delay_ms: u64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Upper bound on a single session poll wait
    #[serde(default = "default_session_poll_timeout")]
    pub session_poll_timeout_ms: u64,
}

impl Default for ConnectivityPolicy {
    fn default() -> Self {
        Self {
            fast_link_timeout_ms: default_fast_link_timeout(),
            normal_link_timeout_ms: default_normal_link_timeout(),
            session_timeout_ms: default_session_timeout(),
            liveness_interval_ms: default_liveness_interval(),
            drain_timeout_ms: default_drain_timeout(),
            settle_delay_ms: default_settle_delay(),
            link_reset_delay_ms: default_link_reset_delay(),
            tick_interval_ms: default_tick_interval(),
            session_poll_timeout_ms: default_session_poll_timeout(),
        }
    }
}

impl ConnectivityPolicy {
    pub fn fast_link_timeout(&self) -> Duration {
        Duration::from_millis(self.fast_link_timeout_ms)
    }

    pub fn normal_link_timeout(&self) -> Duration {
        Duration::from_millis(self.normal_link_timeout_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn link_reset_delay(&self) -> Duration {
        Duration::from_millis(self.link_reset_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn session_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.session_poll_timeout_ms)
    }

    /// Validate that every timeout can actually elapse
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("fast_link_timeout_ms", self.fast_link_timeout_ms),
            ("normal_link_timeout_ms", self.normal_link_timeout_ms),
            ("session_timeout_ms", self.session_timeout_ms),
            ("liveness_interval_ms", self.liveness_interval_ms),
            ("drain_timeout_ms", self.drain_timeout_ms),
            ("tick_interval_ms", self.tick_interval_ms),
            ("session_poll_timeout_ms", self.session_poll_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "[timing] {name} must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

fn default_device_name() -> String {
    "HomeButtons".to_string()
}

fn default_base_topic() -> String {
    "homebuttons".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_buffer_size() -> u32 {
    1024
}

fn default_channel() -> u8 {
    1
}

fn default_state_file() -> PathBuf {
    PathBuf::from("homebuttons-state.toml")
}

fn default_link_cache_file() -> PathBuf {
    PathBuf::from("homebuttons-link.toml")
}

fn default_fast_link_timeout() -> u64 {
    5_000
}

fn default_normal_link_timeout() -> u64 {
    20_000
}

fn default_session_timeout() -> u64 {
    10_000
}

fn default_liveness_interval() -> u64 {
    5_000
}

fn default_drain_timeout() -> u64 {
    500
}

fn default_settle_delay() -> u64 {
    10
}

fn default_link_reset_delay() -> u64 {
    500
}

fn default_tick_interval() -> u64 {
    50
}

fn default_session_poll_timeout() -> u64 {
    10
}

/// Broker settings handed verbatim to the session layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive: Duration,
    pub max_packet_size: u32,
}

impl BrokerConfig {
    /// Build the session configuration from the `[mqtt]` section and the device id
    pub fn from_section(section: &MqttSection, client_id: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(&section.broker_url)
            .map_err(|_| ConfigError::InvalidBrokerUrl(section.broker_url.clone()))?;

        let tls = match url.scheme() {
            "mqtt" | "tcp" => false,
            "mqtts" | "ssl" => true,
            _ => return Err(ConfigError::InvalidBrokerUrl(section.broker_url.clone())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::InvalidBrokerUrl(section.broker_url.clone()))?;
        let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

        // Credentials only count when both halves are present
        let (user, password) = if !section.user.is_empty() && !section.password.is_empty() {
            (Some(section.user.clone()), Some(section.password.clone()))
        } else {
            (None, None)
        };

        Ok(Self {
            host: host.to_string(),
            port,
            tls,
            user,
            password,
            client_id: client_id.to_string(),
            keep_alive: Duration::from_secs(section.keep_alive_secs),
            max_packet_size: section.buffer_size,
        })
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PanelConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: PanelConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.id)?;
        if self.device.name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "[device] name must not be empty".to_string(),
            ));
        }
        if self.mqtt.base_topic.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "[mqtt] base_topic must not be empty".to_string(),
            ));
        }
        self.broker()?;
        self.timing.validate()
    }

    pub fn broker(&self) -> Result<BrokerConfig, ConfigError> {
        BrokerConfig::from_section(&self.mqtt, &self.device.id)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
id = "hb-test-01"
name = "Hallway"

[mqtt]
broker_url = "mqtt://localhost:1883"

[wifi]
ssid = "home"
password = "secret-pass"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate device ID format
fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceId(format!(
            "Device ID '{device_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
