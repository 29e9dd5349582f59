//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `mqthing.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use mqthing_adapter_mqtt::MqttConfig;
use mqthing_adapter_virtual::VirtualConfig;
use mqthing_app::services::thing_adapter::{AdapterSettings, DescriptionLayout};
use mqthing_domain::id::MacAddress;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Thing adapter settings.
    pub adapter: AdapterConfig,
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Where the host identity comes from.
    pub identity: IdentityConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Simulated devices.
    #[serde(rename = "virtual")]
    pub virtual_devices: VirtualConfig,
}

/// Thing adapter configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Name used in logs.
    pub name: String,
    /// Interval between sensor samples, in milliseconds.
    pub poll_interval_ms: u64,
    /// How devices map onto published things.
    pub layout: LayoutConfig,
}

/// Serialized form of [`DescriptionLayout`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutConfig {
    #[default]
    PerDevice,
    Merged,
}

impl From<LayoutConfig> for DescriptionLayout {
    fn from(layout: LayoutConfig) -> Self {
        match layout {
            LayoutConfig::PerDevice => Self::PerDevice,
            LayoutConfig::Merged => Self::Merged,
        }
    }
}

/// Network identity configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Interface whose hardware address names the things. Empty picks the
    /// first non-loopback interface.
    pub interface: String,
    /// Fixed hardware address, bypassing interface lookup.
    pub mac: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `mqthing.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("mqthing.toml")?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("MQTHING_BROKER_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = var("MQTHING_BROKER_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = var("MQTHING_USERNAME") {
            self.mqtt.username = Some(val);
        }
        if let Some(val) = var("MQTHING_PASSWORD") {
            self.mqtt.password = Some(val);
        }
        if let Some(val) = var("MQTHING_INTERFACE") {
            self.identity.interface = val;
        }
        if let Some(val) = var("MQTHING_MAC") {
            self.identity.mac = Some(val);
        }
        if let Some(val) = var("MQTHING_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "broker port must be non-zero".to_string(),
            ));
        }
        if self.adapter.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll interval must be non-zero".to_string(),
            ));
        }
        self.mac_override()?;
        Ok(())
    }

    /// Parsed `[identity] mac`, if set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the address is malformed.
    pub fn mac_override(&self) -> Result<Option<MacAddress>, ConfigError> {
        self.identity
            .mac
            .as_deref()
            .map(|mac| {
                mac.parse::<MacAddress>()
                    .map_err(|err| ConfigError::Validation(err.to_string()))
            })
            .transpose()
    }

    /// Settings for the thing adapter.
    #[must_use]
    pub fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            name: self.adapter.name.clone(),
            poll_interval: Duration::from_millis(self.adapter.poll_interval_ms),
            layout: self.adapter.layout.into(),
            auth_required: self.mqtt.auth_required,
            credentials: self.mqtt.credentials(),
        }
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            name: "mqthing".to_string(),
            poll_interval_ms: 1_000,
            layout: LayoutConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "mqthingd=info,mqthing=info,rumqttc=warn".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
