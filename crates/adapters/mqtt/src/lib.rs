//! # mqthing-adapter-mqtt
//!
//! MQTT adapter — implements the broker ports on top of `rumqttc`.
//!
//! ## Responsibilities
//! - Open a session with the configured broker and credentials
//! - Drive the `rumqttc` event loop on a background task, reconnecting after
//!   errors, and forward connection changes and inbound publishes as
//!   [`BrokerEvent`]s
//! - Publish and subscribe on behalf of the thing adapter
//!
//! ## Dependency rule
//! Same as other adapters: depends on `mqthing-app` and `mqthing-domain`.

pub mod config;
pub mod error;

pub use config::MqttConfig;
pub use error::MqttError;

use std::time::Duration;

use mqthing_app::ports::{BrokerClient, BrokerConnector, BrokerEvent, Credentials, Qos};
use mqthing_domain::error::ThingError;
use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacity of the request queue towards the event loop.
const REQUEST_CAPACITY: usize = 64;

fn to_rumqttc(qos: Qos) -> rumqttc::QoS {
    match qos {
        Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
        Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// Opens `rumqttc` sessions for a configured broker.
#[derive(Debug, Clone)]
pub struct MqttConnector {
    config: MqttConfig,
}

impl MqttConnector {
    #[must_use]
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }
}

impl BrokerConnector for MqttConnector {
    type Client = MqttBroker;

    fn broker_uri(&self) -> String {
        self.config.broker_uri()
    }

    #[tracing::instrument(skip_all, fields(broker = %self.config.broker_uri()))]
    async fn connect(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<(MqttBroker, mpsc::UnboundedReceiver<BrokerEvent>), ThingError> {
        if self.config.auth_required && credentials.is_none() {
            return Err(MqttError::MissingCredentials.into());
        }
        let options = self.config.options(credentials);
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(eventloop, tx, self.config.reconnect_delay()));
        tracing::info!("broker session started");
        Ok((MqttBroker { client, task }, rx))
    }
}

/// What the driver does with one event-loop notification.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Forward(BrokerEvent),
    Skip,
    Stop,
}

fn classify(event: Event) -> Step {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => Step::Forward(BrokerEvent::Connected),
        Event::Incoming(Packet::Publish(publish)) => Step::Forward(BrokerEvent::Message {
            topic: String::from_utf8_lossy(publish.topic.as_ref()).into_owned(),
            payload: publish.payload.to_vec(),
        }),
        Event::Outgoing(Outgoing::Disconnect) => Step::Stop,
        _ => Step::Skip,
    }
}

/// Poll the event loop until the session is closed or nobody listens.
///
/// Forwarding never waits: the adapter may itself be waiting for this loop
/// to drain its publish requests.
async fn drive(
    mut eventloop: EventLoop,
    events: mpsc::UnboundedSender<BrokerEvent>,
    retry: Duration,
) {
    let mut connected = false;
    loop {
        let event = match eventloop.poll().await {
            Ok(event) => match classify(event) {
                Step::Forward(event) => event,
                Step::Skip => continue,
                Step::Stop => {
                    tracing::debug!("disconnect sent, stopping event loop");
                    break;
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "broker connection error");
                if connected && events.send(BrokerEvent::Disconnected).is_err() {
                    break;
                }
                connected = false;
                tokio::time::sleep(retry).await;
                continue;
            }
        };
        if event == BrokerEvent::Connected {
            connected = true;
        }
        if events.send(event).is_err() {
            tracing::debug!("event receiver dropped, stopping event loop");
            break;
        }
    }
}

/// A live `rumqttc` session.
#[derive(Debug)]
pub struct MqttBroker {
    client: AsyncClient,
    task: JoinHandle<()>,
}

impl MqttBroker {
    fn ensure_running(&self) -> Result<(), MqttError> {
        if self.task.is_finished() {
            return Err(MqttError::NotConnected);
        }
        Ok(())
    }
}

impl BrokerClient for MqttBroker {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> Result<(), ThingError> {
        self.ensure_running()?;
        self.client
            .publish(topic, to_rumqttc(qos), retain, payload)
            .await
            .map_err(MqttError::from)?;
        Ok(())
    }

    async fn subscribe(&self, filter: &str, qos: Qos) -> Result<(), ThingError> {
        self.ensure_running()?;
        self.client
            .subscribe(filter, to_rumqttc(qos))
            .await
            .map_err(MqttError::from)?;
        tracing::debug!(filter, "subscribed");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ThingError> {
        self.ensure_running()?;
        self.client.disconnect().await.map_err(MqttError::from)?;
        Ok(())
    }
}

impl Drop for MqttBroker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
