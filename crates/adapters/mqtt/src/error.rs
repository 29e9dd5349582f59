//! MQTT adapter error types.

use mqthing_domain::error::ThingError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The broker session is gone.
    #[error("MQTT client not connected")]
    NotConnected,

    /// Authentication is required but no credentials are configured.
    #[error("MQTT credentials missing")]
    MissingCredentials,

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),
}

impl MqttError {
    /// Convert into a [`ThingError`] for propagation across port boundaries.
    pub fn into_domain(self) -> ThingError {
        match self {
            Self::MissingCredentials => ThingError::MissingCredentials,
            other => ThingError::Transport(Box::new(other)),
        }
    }
}

impl From<MqttError> for ThingError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}

impl From<rumqttc::ClientError> for MqttError {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::Client(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_connected_error() {
        let err = MqttError::NotConnected;
        assert_eq!(err.to_string(), "MQTT client not connected");
    }

    #[test]
    fn should_convert_not_connected_to_transport_error() {
        let err: ThingError = MqttError::NotConnected.into();
        assert!(matches!(err, ThingError::Transport(_)));
    }

    #[test]
    fn should_keep_missing_credentials_distinct() {
        let err: ThingError = MqttError::MissingCredentials.into();
        assert!(matches!(err, ThingError::MissingCredentials));
    }
}
