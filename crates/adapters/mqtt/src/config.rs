//! MQTT broker configuration.

use std::time::Duration;

use mqthing_app::ports::Credentials;
use serde::Deserialize;

/// Configuration for the broker connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier. A random `mqthing-<uuid>` id is used when unset.
    pub client_id: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Delay before reconnecting after a connection error, in milliseconds.
    pub reconnect_delay_ms: u64,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Refuse to start unless both `username` and `password` are set.
    pub auth_required: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: None,
            keep_alive_secs: 30,
            reconnect_delay_ms: 1_000,
            username: None,
            password: None,
            auth_required: false,
        }
    }
}

impl MqttConfig {
    /// `mqtt://<host>:<port>`, the base of every advertised `href`.
    #[must_use]
    pub fn broker_uri(&self) -> String {
        format!("mqtt://{}:{}", self.broker_host, self.broker_port)
    }

    /// Credentials, when both username and password are configured.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// Configured client id, or a fresh random one.
    #[must_use]
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("mqthing-{}", uuid::Uuid::new_v4()))
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub(crate) fn options(&self, credentials: Option<&Credentials>) -> rumqttc::MqttOptions {
        let mut options =
            rumqttc::MqttOptions::new(self.client_id(), &self.broker_host, self.broker_port);
        options.set_keep_alive(Duration::from_secs(u64::from(self.keep_alive_secs)));
        if let Some(credentials) = credentials {
            options.set_credentials(&credentials.username, &credentials.password);
        }
        options
    }
}
