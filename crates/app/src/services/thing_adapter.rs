//! Thing adapter — exposes registered devices on the broker.
//!
//! The adapter owns every [`Device`]. Broker notifications reach it as
//! [`BrokerEvent`]s on a channel, so the run loop is the only code touching
//! device state and the cached descriptions.
//!
//! ```text
//! begin() --> identity --> descriptions --> connect
//! run():  Connected --> publish descriptions, subscribe requests
//!         Message   --> start action / apply write
//!         tick      --> sample sources, publish changes and events
//! ```

use std::future::Future;
use std::time::Duration;

use mqthing_domain::action::ActionRequest;
use mqthing_domain::action::ActionStatus;
use mqthing_domain::device::Device;
use mqthing_domain::error::{ThingError, ValidationError};
use mqthing_domain::property::Property;
use mqthing_domain::schema::DescriptionContext;
use mqthing_domain::time::{self, Timestamp};
use serde_json::{Map, Value as Json};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::ports::{
    BrokerClient, BrokerConnector, BrokerEvent, Credentials, NetworkIdentity, Qos, SensorSource,
};
use crate::topics::{self, Inbound};

/// Completed action instances kept per device for queue inspection.
pub const ACTION_HISTORY: usize = 16;

/// Delivered event instances kept per device for queue inspection.
pub const EVENT_HISTORY: usize = 16;

/// How devices map onto published things.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptionLayout {
    /// One thing per device, identified as `<mac>-<device id>`.
    #[default]
    PerDevice,
    /// A single thing identified by the MAC, aggregating every device.
    Merged,
}

/// Runtime settings of a [`ThingAdapter`].
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    /// Name used in logs.
    pub name: String,
    pub poll_interval: Duration,
    pub layout: DescriptionLayout,
    /// Refuse to connect without credentials.
    pub auth_required: bool,
    pub credentials: Option<Credentials>,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            name: "mqthing".to_string(),
            poll_interval: Duration::from_secs(1),
            layout: DescriptionLayout::default(),
            auth_required: false,
            credentials: None,
        }
    }
}

/// A published thing and the devices behind it.
#[derive(Debug)]
struct Thing {
    id: String,
    description: Json,
    devices: Vec<usize>,
}

/// Publishes devices as things and serves requests addressed to them.
pub struct ThingAdapter<C: BrokerConnector, N> {
    settings: AdapterSettings,
    connector: C,
    identity: N,
    devices: Vec<Device>,
    sources: Vec<Box<dyn SensorSource>>,
    things: Vec<Thing>,
    client: Option<C::Client>,
    events: Option<mpsc::UnboundedReceiver<BrokerEvent>>,
    connected: bool,
}

impl<C: BrokerConnector, N: NetworkIdentity> ThingAdapter<C, N> {
    /// Create an adapter with no devices.
    pub fn new(connector: C, identity: N, settings: AdapterSettings) -> Self {
        Self {
            settings,
            connector,
            identity,
            devices: Vec::new(),
            sources: Vec::new(),
            things: Vec::new(),
            client: None,
            events: None,
            connected: false,
        }
    }

    /// Register a device. Devices must be registered before [`begin`](Self::begin)
    /// to be described.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateId`] when a device with the same
    /// id is already registered, or, in the merged layout, when the device
    /// shares a property, action or event id with a registered device.
    pub fn add_device(&mut self, device: Device) -> Result<(), ThingError> {
        if self.devices.iter().any(|d| d.id == device.id) {
            return Err(ValidationError::DuplicateId(device.id).into());
        }
        if self.settings.layout == DescriptionLayout::Merged
            && let Some(id) = self
                .devices
                .iter()
                .find_map(|existing| shared_affordance(existing, &device))
        {
            tracing::warn!(device = %device.id, affordance = %id, "id already used in merged description");
            return Err(ValidationError::DuplicateId(id).into());
        }
        tracing::debug!(device = %device.id, "device registered");
        self.devices.push(device);
        Ok(())
    }

    /// Register a sensor source along with the devices it discovers.
    ///
    /// # Errors
    ///
    /// Propagates discovery failures and duplicate device ids.
    pub fn add_source(&mut self, mut source: Box<dyn SensorSource>) -> Result<(), ThingError> {
        for device in source.discover()? {
            self.add_device(device)?;
        }
        tracing::info!(source = source.name(), "sensor source registered");
        self.sources.push(source);
        Ok(())
    }

    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn find_device_mut(&mut self, id: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.id == id)
    }

    /// Ids of the things built by [`begin`](Self::begin).
    pub fn thing_ids(&self) -> impl Iterator<Item = &str> {
        self.things.iter().map(|t| t.id.as_str())
    }

    /// Cached description document of a thing.
    #[must_use]
    pub fn description(&self, thing_id: &str) -> Option<&Json> {
        self.things
            .iter()
            .find(|t| t.id == thing_id)
            .map(|t| &t.description)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Resolve the identity, build every description once and open the
    /// broker session. The descriptions are published when the broker
    /// confirms the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::MissingCredentials`] without connecting when
    /// authentication is required but no credentials are configured, or the
    /// error of the identity source or the connector.
    #[tracing::instrument(skip_all, fields(adapter = %self.settings.name))]
    pub async fn begin(&mut self) -> Result<(), ThingError> {
        if self.settings.auth_required && self.settings.credentials.is_none() {
            tracing::error!("broker authentication required but no credentials configured");
            return Err(ThingError::MissingCredentials);
        }

        let mac = self.identity.mac_address()?;
        self.things = self.describe(&mac.identity());
        tracing::info!(
            mac = %mac,
            things = self.things.len(),
            devices = self.devices.len(),
            "descriptions built"
        );

        let (client, events) = self
            .connector
            .connect(self.settings.credentials.as_ref())
            .await?;
        self.client = Some(client);
        self.events = Some(events);
        Ok(())
    }

    fn describe(&self, mac: &str) -> Vec<Thing> {
        let broker_uri = self.connector.broker_uri();
        match self.settings.layout {
            DescriptionLayout::PerDevice => self
                .devices
                .iter()
                .enumerate()
                .map(|(index, device)| {
                    let id = format!("{mac}-{}", device.id);
                    let ctx = DescriptionContext {
                        broker_uri: &broker_uri,
                        thing_id: &id,
                    };
                    let description = device.serialize(&ctx);
                    Thing {
                        id,
                        description,
                        devices: vec![index],
                    }
                })
                .collect(),
            DescriptionLayout::Merged if self.devices.is_empty() => Vec::new(),
            DescriptionLayout::Merged => {
                let id = mac.to_string();
                let ctx = DescriptionContext {
                    broker_uri: &broker_uri,
                    thing_id: &id,
                };
                let mut descr = Map::new();
                for device in &self.devices {
                    device.serialize_into(&mut descr, &ctx);
                }
                vec![Thing {
                    id,
                    description: Json::Object(descr),
                    devices: (0..self.devices.len()).collect(),
                }]
            }
        }
    }

    /// Drive the adapter until `shutdown` resolves or the broker event
    /// stream ends, then close the session.
    ///
    /// # Errors
    ///
    /// Returns an error when called before [`begin`](Self::begin) or when
    /// the session cannot be closed. Failures inside the loop are logged.
    #[tracing::instrument(skip_all, fields(adapter = %self.settings.name))]
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<(), ThingError> {
        let mut events = self.events.take().ok_or_else(not_started)?;
        let period = self.settings.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::warn!("broker event stream closed");
                        break;
                    };
                    self.handle_broker_event(event).await;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.poll(time::now()).await {
                        tracing::warn!(error = %err, "poll failed");
                    }
                }
            }
        }

        self.shutdown().await
    }

    /// Close the broker session, if any.
    ///
    /// # Errors
    ///
    /// Returns the error reported by the broker client.
    pub async fn shutdown(&mut self) -> Result<(), ThingError> {
        self.connected = false;
        if let Some(client) = self.client.take() {
            client.disconnect().await?;
            tracing::info!("broker session closed");
        }
        Ok(())
    }

    /// React to one broker notification. Failures are logged.
    pub async fn handle_broker_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::Connected => {
                tracing::info!("broker connected");
                if let Err(err) = self.on_connected().await {
                    tracing::warn!(error = %err, "failed to announce things");
                }
            }
            BrokerEvent::Disconnected => {
                if self.connected {
                    tracing::warn!("broker connection lost");
                }
                self.connected = false;
            }
            BrokerEvent::Message { topic, payload } => {
                if let Err(err) = self.handle_message(&topic, &payload).await {
                    tracing::warn!(%topic, error = %err, "rejected inbound message");
                }
            }
        }
    }

    async fn on_connected(&mut self) -> Result<(), ThingError> {
        self.connected = true;
        let client = self.client()?;
        for thing in &self.things {
            let payload = serde_json::to_vec(&thing.description)?;
            client
                .publish(&topics::thing(&thing.id), payload, Qos::AtLeastOnce, true)
                .await?;
            client
                .subscribe(&topics::action_filter(&thing.id), Qos::AtLeastOnce)
                .await?;
            client
                .subscribe(&topics::property_write_filter(&thing.id), Qos::AtLeastOnce)
                .await?;
            tracing::info!(thing = %thing.id, "description published");
        }
        Ok(())
    }

    /// Sample every source, then publish pending property changes and
    /// events. Nothing is published while disconnected; changes stay flagged
    /// until the next connected poll.
    ///
    /// # Errors
    ///
    /// Returns the first publish failure.
    pub async fn poll(&mut self, now: Timestamp) -> Result<(), ThingError> {
        for source in &mut self.sources {
            if let Err(err) = source.sample(&mut self.devices, now) {
                tracing::warn!(source = source.name(), error = %err, "sampling failed");
            }
        }
        self.publish_changes(now).await?;
        self.publish_events().await?;
        Ok(())
    }

    /// Publish `{time, <id>: value}` for every changed property (retained).
    /// A change flag is cleared only once its message was handed to the
    /// broker. Returns the number of messages sent.
    ///
    /// # Errors
    ///
    /// Returns the first publish failure; changes not sent yet stay pending.
    pub async fn publish_changes(&mut self, now: Timestamp) -> Result<usize, ThingError> {
        if !self.connected {
            return Ok(0);
        }
        let mut outgoing = Vec::new();
        for thing in &self.things {
            for &index in &thing.devices {
                for (property_id, payload) in self.devices[index].pending_changes(&now) {
                    let topic = topics::property(&thing.id, &property_id);
                    outgoing.push((index, property_id, topic, payload));
                }
            }
        }
        let mut sent = 0;
        for (index, property_id, topic, payload) in outgoing {
            self.publish_json(&topic, &payload, true).await?;
            self.devices[index].clear_change(&property_id);
            sent += 1;
        }
        Ok(sent)
    }

    /// Publish pending event instances (not retained), oldest first, then
    /// trim the delivered history to [`EVENT_HISTORY`]. Returns the number
    /// of messages sent.
    ///
    /// # Errors
    ///
    /// Returns the first publish failure; events not sent yet stay pending.
    pub async fn publish_events(&mut self) -> Result<usize, ThingError> {
        if !self.connected {
            return Ok(0);
        }
        let mut outgoing = Vec::new();
        for thing in &self.things {
            for &index in &thing.devices {
                for event in self.devices[index].pending_events() {
                    outgoing.push((index, topics::event(&thing.id, event.name()), event.serialize()));
                }
            }
        }
        let mut sent = 0;
        for (index, topic, payload) in outgoing {
            self.publish_json(&topic, &payload, false).await?;
            let device = &mut self.devices[index];
            device.acknowledge_events(1);
            device.prune_delivered_events(EVENT_HISTORY);
            sent += 1;
        }
        Ok(sent)
    }

    async fn handle_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), ThingError> {
        let Some(inbound) = Inbound::parse(topic) else {
            tracing::debug!(topic, "ignoring message on unrelated topic");
            return Ok(());
        };
        let Some(thing) = self.things.iter().position(|t| t.id == inbound.thing_id()) else {
            tracing::debug!(topic, "ignoring message for unknown thing");
            return Ok(());
        };
        let document: Json = serde_json::from_slice(payload)?;
        match inbound {
            Inbound::ActionRequest { action, .. } => {
                self.invoke_action(thing, action, &document).await
            }
            Inbound::PropertyWrite { property, .. } => {
                self.write_property(thing, property, &document).await
            }
        }
    }

    #[tracing::instrument(skip(self, thing, request))]
    async fn invoke_action(
        &mut self,
        thing: usize,
        action: &str,
        request: &Json,
    ) -> Result<(), ThingError> {
        if ActionRequest::parse(request).is_none_or(|r| r.name != action) {
            tracing::warn!("request document does not name the addressed action");
            return Ok(());
        }
        let Some(index) = self.things[thing]
            .devices
            .iter()
            .copied()
            .find(|&i| self.devices[i].find_action(action).is_some())
        else {
            tracing::warn!("no device offers this action");
            return Ok(());
        };

        let thing_id = self.things[thing].id.clone();
        let device = &mut self.devices[index];
        let Some(instance) = device.request_action(request) else {
            tracing::info!("action request declined");
            return Ok(());
        };
        instance.start(time::now());
        let topic = topics::action_instance(&thing_id, action, instance.id().as_str());
        let resource = instance.resource(&thing_id);
        prune_completed(device, ACTION_HISTORY);

        self.publish_json(&topic, &resource, false).await?;
        tracing::info!(%topic, "action completed");
        Ok(())
    }

    #[tracing::instrument(skip(self, thing, value))]
    async fn write_property(
        &mut self,
        thing: usize,
        property: &str,
        value: &Json,
    ) -> Result<(), ThingError> {
        let Some(index) = self.things[thing]
            .devices
            .iter()
            .copied()
            .find(|&i| self.devices[i].find_property(property).is_some())
        else {
            tracing::warn!("no device offers this property");
            return Ok(());
        };

        let device = &mut self.devices[index];
        if !device
            .find_property(property)
            .is_some_and(Property::is_writable)
        {
            tracing::warn!("ignoring write to read-only property");
            return Ok(());
        }
        device.write_property(property, value)?;
        self.publish_changes(time::now()).await?;
        Ok(())
    }

    async fn publish_json(&self, topic: &str, payload: &Json, retain: bool) -> Result<(), ThingError> {
        let bytes = serde_json::to_vec(payload)?;
        self.client()?
            .publish(topic, bytes, Qos::AtLeastOnce, retain)
            .await?;
        tracing::debug!(topic, retain, "published");
        Ok(())
    }

    fn client(&self) -> Result<&C::Client, ThingError> {
        self.client.as_ref().ok_or_else(not_started)
    }
}

fn not_started() -> ThingError {
    ThingError::Transport("broker session not started".into())
}

/// First property, action or event id of `candidate` that `existing` also
/// declares.
fn shared_affordance(existing: &Device, candidate: &Device) -> Option<String> {
    candidate
        .properties()
        .map(|p| &p.id)
        .find(|id| existing.find_property(id).is_some())
        .or_else(|| {
            candidate
                .actions()
                .map(|a| &a.id)
                .find(|id| existing.find_action(id).is_some())
        })
        .or_else(|| {
            candidate
                .events()
                .map(|e| &e.id)
                .find(|id| existing.find_event(id).is_some())
        })
        .cloned()
}

/// Drop the oldest completed instances beyond `keep`.
fn prune_completed(device: &mut Device, keep: usize) {
    let stale: Vec<String> = device
        .action_instances()
        .filter(|a| a.status() == ActionStatus::Completed)
        .skip(keep)
        .map(|a| a.id().to_string())
        .collect();
    for id in stale {
        device.remove_action(&id);
    }
}
