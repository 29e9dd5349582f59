//! Broker port — connection, publishing and inbound messages.
//!
//! Connection state changes and inbound messages are not delivered through
//! callbacks. The connector hands back an unbounded channel, and the
//! adapter's run loop is the single consumer of it. The producer never waits
//! on the consumer, so a slow run loop cannot stall the broker session it is
//! publishing through.

use std::future::Future;
use std::sync::Arc;

use mqthing_domain::error::ThingError;
use tokio::sync::mpsc;

/// Delivery guarantee of a publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Qos {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

/// Something the broker connection reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// The session is (re-)established.
    Connected,
    /// The session dropped; the client keeps trying to reconnect.
    Disconnected,
    /// A message arrived on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },
}

/// Username/password pair for broker authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A live broker session.
pub trait BrokerClient: Send + Sync {
    /// Publish `payload` on `topic`.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> impl Future<Output = Result<(), ThingError>> + Send;

    /// Subscribe to a topic filter (`+` and `#` wildcards allowed).
    fn subscribe(
        &self,
        filter: &str,
        qos: Qos,
    ) -> impl Future<Output = Result<(), ThingError>> + Send;

    /// Close the session.
    fn disconnect(&self) -> impl Future<Output = Result<(), ThingError>> + Send;
}

impl<T: BrokerClient> BrokerClient for Arc<T> {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> impl Future<Output = Result<(), ThingError>> + Send {
        (**self).publish(topic, payload, qos, retain)
    }

    fn subscribe(
        &self,
        filter: &str,
        qos: Qos,
    ) -> impl Future<Output = Result<(), ThingError>> + Send {
        (**self).subscribe(filter, qos)
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), ThingError>> + Send {
        (**self).disconnect()
    }
}

/// Opens broker sessions.
pub trait BrokerConnector: Send + Sync {
    type Client: BrokerClient;

    /// URI used as the base of every `href` in published descriptions,
    /// e.g. `mqtt://broker.local:1883`.
    fn broker_uri(&self) -> String;

    /// Start a session. Returns the client and the receiving end of its
    /// event stream; [`BrokerEvent::Connected`] arrives on the stream once the
    /// broker accepted the session.
    fn connect(
        &self,
        credentials: Option<&Credentials>,
    ) -> impl Future<Output = Result<(Self::Client, mpsc::UnboundedReceiver<BrokerEvent>), ThingError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_at_least_once() {
        assert_eq!(Qos::default(), Qos::AtLeastOnce);
    }

    #[test]
    fn should_mask_password_in_debug_output() {
        let creds = Credentials {
            username: "meter".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("meter"));
        assert!(!debug.contains("hunter2"));
    }
}
