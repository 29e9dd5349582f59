//! Device — one addressable thing aggregating properties, actions and events.
//!
//! Registries keep registration order internally. Every listing and every
//! serialized sub-document is produced in **reverse** registration order
//! (most recently added first), and the action queue lists the most recent
//! request first.

use rand::Rng;
use serde_json::{Map, Value as Json, json};

use crate::action::{ActionDefinition, ActionInstance, ActionRequest};
use crate::error::{ThingError, ValidationError};
use crate::event::{EventDefinition, EventInstance};
use crate::id::InstanceId;
use crate::property::Property;
use crate::schema::{
    BASIC_SECURITY_SCHEME, DescriptionContext, IOT_CONTEXT, MQTT_BINDING_CONTEXT, TD_CONTEXT,
};
use crate::time::Timestamp;
use crate::value::{DataType, Value};

/// A device and everything it owns.
#[derive(Debug)]
pub struct Device {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Semantic type tags (`@type`).
    pub types: Vec<String>,
    properties: Vec<Property>,
    actions: Vec<ActionDefinition>,
    action_queue: Vec<ActionInstance>,
    events: Vec<EventDefinition>,
    event_queue: Vec<EventInstance>,
    /// Number of queued events already delivered.
    delivered_events: usize,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder(id: impl Into<String>) -> DeviceBuilder {
        DeviceBuilder {
            id: id.into(),
            ..DeviceBuilder::default()
        }
    }

    // -- registries ---------------------------------------------------------

    /// Register a property.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateId`] if a property with the same id exists.
    pub fn add_property(&mut self, property: Property) -> Result<(), ValidationError> {
        if self.find_property(&property.id).is_some() {
            return Err(ValidationError::DuplicateId(property.id));
        }
        self.properties.push(property);
        Ok(())
    }

    /// Register an action definition.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateId`] if an action with the same id exists.
    pub fn add_action(&mut self, action: ActionDefinition) -> Result<(), ValidationError> {
        if self.find_action(&action.id).is_some() {
            return Err(ValidationError::DuplicateId(action.id));
        }
        self.actions.push(action);
        Ok(())
    }

    /// Register an event definition.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateId`] if an event with the same id exists.
    pub fn add_event(&mut self, event: EventDefinition) -> Result<(), ValidationError> {
        if self.find_event(&event.id).is_some() {
            return Err(ValidationError::DuplicateId(event.id));
        }
        self.events.push(event);
        Ok(())
    }

    /// Properties, most recently registered first.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().rev()
    }

    /// Action definitions, most recently registered first.
    pub fn actions(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.actions.iter().rev()
    }

    /// Event definitions, most recently registered first.
    pub fn events(&self) -> impl Iterator<Item = &EventDefinition> {
        self.events.iter().rev()
    }

    /// Queued action instances, most recent request first.
    pub fn action_instances(&self) -> impl Iterator<Item = &ActionInstance> {
        self.action_queue.iter().rev()
    }

    /// Queued event instances, most recent first.
    pub fn event_instances(&self) -> impl Iterator<Item = &EventInstance> {
        self.event_queue.iter().rev()
    }

    #[must_use]
    pub fn find_property(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }

    pub fn find_property_mut(&mut self, id: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.id == id)
    }

    #[must_use]
    pub fn find_action(&self, id: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn find_action_instance(&self, id: &str) -> Option<&ActionInstance> {
        self.action_queue.iter().find(|a| *a.id() == *id)
    }

    pub fn find_action_instance_mut(&mut self, id: &str) -> Option<&mut ActionInstance> {
        self.action_queue.iter_mut().find(|a| *a.id() == *id)
    }

    #[must_use]
    pub fn find_event(&self, id: &str) -> Option<&EventDefinition> {
        self.events.iter().find(|e| e.id == id)
    }

    // -- mutation -----------------------------------------------------------

    /// Write a property and invoke its write callback with the new value.
    ///
    /// Writing an unknown property, or any `none` property, is a no-op and
    /// does not invoke the callback.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TypeMismatch`] when `value` does not match
    /// the declared type; the callback is not invoked in that case.
    pub fn set_property(&mut self, id: &str, value: Value) -> Result<(), ValidationError> {
        let Some(property) = self.find_property_mut(id) else {
            return Ok(());
        };
        if property.data_type == DataType::NoState {
            return Ok(());
        }
        property.set_value(value.clone())?;
        property.notify_write(&value);
        Ok(())
    }

    /// Write a property from an inbound JSON scalar, converting it to the
    /// declared type first. Unknown properties are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::Validation`] when the JSON does not fit the type.
    pub fn write_property(&mut self, id: &str, json: &Json) -> Result<(), ThingError> {
        let Some(property) = self.find_property(id) else {
            return Ok(());
        };
        let value = Value::from_json(property.data_type, json)?;
        self.set_property(id, value)?;
        Ok(())
    }

    /// `(property id, payload)` for every pending change. Flags are left set;
    /// see [`Device::clear_change`].
    #[must_use]
    pub fn pending_changes(&self, at: &Timestamp) -> Vec<(String, Json)> {
        self.properties()
            .filter(|p| p.has_changed())
            .map(|p| (p.id.clone(), p.value_payload(at)))
            .collect()
    }

    /// Mark the pending change of `id` as delivered.
    pub fn clear_change(&mut self, id: &str) {
        if let Some(property) = self.find_property_mut(id) {
            property.take_change();
        }
    }

    /// Collect `(property id, payload)` for every pending change, clearing
    /// each change flag.
    pub fn take_changes(&mut self, at: &Timestamp) -> Vec<(String, Json)> {
        let changes = self.pending_changes(at);
        for (id, _) in &changes {
            self.clear_change(id);
        }
        changes
    }

    /// Validate and enqueue an action request using the thread-local RNG and
    /// the current time.
    pub fn request_action(&mut self, request: &Json) -> Option<&mut ActionInstance> {
        self.request_action_with(request, &mut rand::thread_rng(), crate::time::now())
    }

    /// Validate and enqueue an action request.
    ///
    /// Returns `None` without queueing anything when the document does not
    /// have exactly one key, the key names no registered action, or the
    /// action's handler declines.
    pub fn request_action_with(
        &mut self,
        request: &Json,
        rng: &mut impl Rng,
        now: Timestamp,
    ) -> Option<&mut ActionInstance> {
        let request = ActionRequest::parse(request)?;
        let action = self.find_action(&request.name)?;
        let instance = action.create(request, InstanceId::generate(rng), now)?;
        self.action_queue.push(instance);
        self.action_queue.last_mut()
    }

    /// Remove a queued action instance, notifying its handler if it had not
    /// completed. Returns whether an instance was removed.
    pub fn remove_action(&mut self, id: &str) -> bool {
        let Some(index) = self.action_queue.iter().position(|a| *a.id() == *id) else {
            return false;
        };
        let instance = self.action_queue.remove(index);
        instance.cancel();
        true
    }

    /// Append an event occurrence to the queue.
    pub fn queue_event(&mut self, event: EventInstance) {
        self.event_queue.push(event);
    }

    /// Events not delivered yet, oldest first.
    #[must_use]
    pub fn pending_events(&self) -> &[EventInstance] {
        &self.event_queue[self.delivered_events..]
    }

    /// Mark the oldest `count` pending events as delivered.
    pub fn acknowledge_events(&mut self, count: usize) {
        self.delivered_events = (self.delivered_events + count).min(self.event_queue.len());
    }

    /// Events queued since the previous call, oldest first.
    pub fn take_new_events(&mut self) -> Vec<EventInstance> {
        let fresh = self.pending_events().to_vec();
        self.acknowledge_events(fresh.len());
        fresh
    }

    /// Drop the oldest delivered events beyond `keep`. Pending events are
    /// never dropped.
    pub fn prune_delivered_events(&mut self, keep: usize) {
        let stale = self.delivered_events.saturating_sub(keep);
        if stale > 0 {
            self.event_queue.drain(..stale);
            self.delivered_events -= stale;
        }
    }

    // -- serialization ------------------------------------------------------

    /// Description document for this device.
    #[must_use]
    pub fn serialize(&self, ctx: &DescriptionContext<'_>) -> Json {
        let mut descr = Map::new();
        self.serialize_into(&mut descr, ctx);
        Json::Object(descr)
    }

    /// Write this device into `descr`.
    ///
    /// Header fields already present are kept, and affordances are merged
    /// into existing `properties`/`actions`/`events` objects, so several
    /// devices can share one document.
    pub fn serialize_into(&self, descr: &mut Map<String, Json>, ctx: &DescriptionContext<'_>) {
        descr
            .entry("id")
            .or_insert_with(|| Json::from(ctx.thing_href()));
        descr
            .entry("title")
            .or_insert_with(|| Json::from(self.title.as_str()));
        descr.entry("@context").or_insert_with(|| {
            json!([TD_CONTEXT, {"iot": IOT_CONTEXT}, {"mqv": MQTT_BINDING_CONTEXT}])
        });
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            descr
                .entry("description")
                .or_insert_with(|| Json::from(description));
        }
        descr.entry("securityDefinitions").or_insert_with(|| {
            json!({
                "basic_sc": {
                    "scheme": "basic",
                    "instanceOf": BASIC_SECURITY_SCHEME,
                    "in": "header",
                }
            })
        });
        descr
            .entry("security")
            .or_insert_with(|| json!(["basic_sc"]));
        descr
            .entry("@type")
            .or_insert_with(|| json!(self.types));

        merge_section(
            descr,
            "properties",
            self.properties().map(|p| (p.id.clone(), p.serialize(ctx))),
        );
        merge_section(
            descr,
            "actions",
            self.actions().map(|a| (a.id.clone(), a.serialize(ctx))),
        );
        merge_section(
            descr,
            "events",
            self.events().map(|e| (e.id.clone(), e.serialize(ctx))),
        );
    }

    /// Action queue entries, most recent first, optionally only for `name`.
    #[must_use]
    pub fn serialize_action_queue(&self, thing_id: &str, name: Option<&str>) -> Json {
        Json::Array(
            self.action_instances()
                .filter(|a| name.is_none_or(|n| a.name() == n))
                .map(|a| a.serialize(thing_id))
                .collect(),
        )
    }

    /// Event queue entries, most recent first, optionally only for `name`.
    #[must_use]
    pub fn serialize_event_queue(&self, name: Option<&str>) -> Json {
        Json::Array(
            self.event_instances()
                .filter(|e| name.is_none_or(|n| e.name() == n))
                .map(EventInstance::serialize)
                .collect(),
        )
    }
}

/// Merge `entries` into the object at `descr[key]`, creating it when there
/// is at least one entry.
fn merge_section(
    descr: &mut Map<String, Json>,
    key: &str,
    entries: impl Iterator<Item = (String, Json)>,
) {
    let mut entries = entries.peekable();
    if entries.peek().is_none() {
        return;
    }
    let section = descr
        .entry(key)
        .or_insert_with(|| Json::Object(Map::new()));
    if let Json::Object(section) = section {
        section.extend(entries);
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: String,
    title: Option<String>,
    description: Option<String>,
    types: Vec<String>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a semantic type tag.
    #[must_use]
    pub fn at_type(mut self, at_type: impl Into<String>) -> Self {
        self.types.push(at_type.into());
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// The title defaults to the id.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::Validation`] when the id is empty.
    pub fn build(self) -> Result<Device, ThingError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        Ok(Device {
            title: self.title.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            description: self.description,
            types: self.types,
            properties: Vec::new(),
            actions: Vec::new(),
            action_queue: Vec::new(),
            events: Vec::new(),
            event_queue: Vec::new(),
            delivered_events: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionHandler, ActionStatus};
    use crate::value::DataType;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CountingHandler {
        performed: Mutex<u32>,
        cancelled: Mutex<u32>,
    }

    impl ActionHandler for CountingHandler {
        fn perform(&self, _instance: &ActionInstance) {
            *self.performed.lock().unwrap() += 1;
        }

        fn cancel(&self, _instance: &ActionInstance) {
            *self.cancelled.lock().unwrap() += 1;
        }
    }

    fn ctx() -> DescriptionContext<'static> {
        DescriptionContext {
            broker_uri: "mqtt://broker:1883",
            thing_id: "a4c1385b0edf-meter",
        }
    }

    fn ts(secs: u32) -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, secs).unwrap()
    }

    fn device() -> Device {
        Device::builder("meter")
            .title("Energy meter")
            .description("Smart meter reader")
            .at_type("EnergyMeter")
            .build()
            .unwrap()
    }

    fn device_with_reset(handler: Arc<CountingHandler>) -> Device {
        let mut dev = device();
        dev.add_action(ActionDefinition::builder("reset", handler).build().unwrap())
            .unwrap();
        dev
    }

    #[test]
    fn should_default_title_to_id() {
        let dev = Device::builder("meter").build().unwrap();
        assert_eq!(dev.title, "meter");
    }

    #[test]
    fn should_reject_empty_device_id() {
        assert!(matches!(
            Device::builder("").build(),
            Err(ThingError::Validation(ValidationError::EmptyId))
        ));
    }

    #[test]
    fn should_reject_duplicate_property_id() {
        let mut dev = device();
        let p = || Property::builder("p1", DataType::Number).build().unwrap();
        dev.add_property(p()).unwrap();
        assert_eq!(
            dev.add_property(p()),
            Err(ValidationError::DuplicateId("p1".to_string()))
        );
    }

    #[test]
    fn should_serialize_properties_in_reverse_registration_order() {
        let mut dev = device();
        dev.add_property(Property::builder("p1", DataType::Number).build().unwrap())
            .unwrap();
        dev.add_property(Property::builder("p2", DataType::String).build().unwrap())
            .unwrap();

        let doc = dev.serialize(&ctx());
        let keys: Vec<&String> = doc["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["p2", "p1"]);
    }

    #[test]
    fn should_serialize_device_header() {
        let dev = device();
        let doc = dev.serialize(&ctx());

        assert_eq!(doc["id"], "mqtt://broker:1883/things/a4c1385b0edf-meter");
        assert_eq!(doc["title"], "Energy meter");
        assert_eq!(doc["description"], "Smart meter reader");
        assert_eq!(doc["@context"][0], TD_CONTEXT);
        assert_eq!(doc["@context"][1]["iot"], IOT_CONTEXT);
        assert_eq!(doc["securityDefinitions"]["basic_sc"]["scheme"], "basic");
        assert_eq!(doc["securityDefinitions"]["basic_sc"]["in"], "header");
        assert_eq!(doc["security"], json!(["basic_sc"]));
        assert_eq!(doc["@type"], json!(["EnergyMeter"]));
        assert!(doc.get("properties").is_none());
        assert!(doc.get("actions").is_none());
        assert!(doc.get("events").is_none());
    }

    #[test]
    fn should_merge_two_devices_into_one_document() {
        let mut first = device();
        first
            .add_property(Property::builder("power", DataType::Number).build().unwrap())
            .unwrap();
        let mut second = Device::builder("relay").title("Relay").build().unwrap();
        second
            .add_property(Property::builder("on", DataType::Boolean).build().unwrap())
            .unwrap();

        let mut descr = Map::new();
        first.serialize_into(&mut descr, &ctx());
        second.serialize_into(&mut descr, &ctx());

        assert_eq!(descr["title"], "Energy meter");
        let keys: Vec<&String> = descr["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["power", "on"]);
    }

    #[test]
    fn should_ignore_write_to_unknown_property() {
        let mut dev = device();
        assert!(dev.set_property("missing", Value::Boolean(true)).is_ok());
        assert!(dev.write_property("missing", &json!(true)).is_ok());
    }

    #[test]
    fn should_set_property_and_invoke_callback_on_every_write() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut dev = device();
        dev.add_property(
            Property::builder("temp", DataType::Number)
                .value(Value::Number(20.0))
                .on_write(Arc::new(move |v: &Value| sink.lock().unwrap().push(v.clone())))
                .build()
                .unwrap(),
        )
        .unwrap();

        dev.set_property("temp", Value::Number(20.3)).unwrap();
        assert!(!dev.find_property("temp").unwrap().has_changed());
        dev.set_property("temp", Value::Number(20.6)).unwrap();
        assert!(dev.find_property("temp").unwrap().has_changed());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Value::Number(20.3), Value::Number(20.6)]
        );
    }

    #[test]
    fn should_not_invoke_callback_for_stateless_property() {
        let calls = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&calls);
        let mut dev = device();
        dev.add_property(
            Property::builder("trigger", DataType::NoState)
                .on_write(Arc::new(move |_: &Value| *sink.lock().unwrap() += 1))
                .build()
                .unwrap(),
        )
        .unwrap();

        dev.set_property("trigger", Value::Boolean(true)).unwrap();

        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(!dev.find_property("trigger").unwrap().has_changed());
    }

    #[test]
    fn should_convert_json_write_to_declared_type() {
        let mut dev = device();
        dev.add_property(Property::builder("count", DataType::Integer).build().unwrap())
            .unwrap();

        dev.write_property("count", &json!(3)).unwrap();
        assert_eq!(dev.find_property("count").unwrap().value(), &Value::Integer(3));
        assert!(dev.write_property("count", &json!("three")).is_err());
    }

    #[test]
    fn should_take_changes_once() {
        let mut dev = device();
        dev.add_property(
            Property::builder("temp", DataType::Number)
                .value(Value::Number(20.0))
                .build()
                .unwrap(),
        )
        .unwrap();
        dev.set_property("temp", Value::Number(20.6)).unwrap();

        let changes = dev.take_changes(&ts(1));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "temp");
        assert_eq!(
            changes[0].1,
            json!({"time": "2024-01-01T00:00:01Z", "temp": 20.6})
        );
        assert!(dev.take_changes(&ts(2)).is_empty());
    }

    #[test]
    fn should_return_none_for_unknown_action() {
        let mut dev = device();
        assert!(dev.request_action(&json!({"reboot": {}})).is_none());
        assert_eq!(dev.action_instances().count(), 0);
    }

    #[test]
    fn should_return_none_for_malformed_request() {
        let mut dev = device_with_reset(Arc::new(CountingHandler::default()));
        assert!(dev.request_action(&json!({})).is_none());
        assert!(dev.request_action(&json!({"reset": {}, "other": {}})).is_none());
        assert_eq!(dev.action_instances().count(), 0);
    }

    #[test]
    fn should_queue_requests_most_recent_first() {
        let mut dev = device_with_reset(Arc::new(CountingHandler::default()));
        let mut rng = StdRng::seed_from_u64(42);

        let first = dev
            .request_action_with(&json!({"reset": {"n": 1}}), &mut rng, ts(1))
            .unwrap()
            .id()
            .clone();
        let second = dev
            .request_action_with(&json!({"reset": {"n": 2}}), &mut rng, ts(2))
            .unwrap()
            .id()
            .clone();

        let ids: Vec<&InstanceId> = dev.action_instances().map(ActionInstance::id).collect();
        assert_eq!(ids, [&second, &first]);

        let queue = dev.serialize_action_queue("abc", Some("reset"));
        assert_eq!(queue[0]["reset"]["input"], json!({"n": 2}));
        assert_eq!(dev.serialize_action_queue("abc", Some("other")), json!([]));
    }

    #[test]
    fn should_run_started_action_to_completion() {
        let handler = Arc::new(CountingHandler::default());
        let mut dev = device_with_reset(Arc::clone(&handler));

        let instance = dev.request_action(&json!({"reset": {}})).unwrap();
        instance.start(ts(3));
        let id = instance.id().to_string();

        let stored = dev.find_action_instance(&id).unwrap();
        assert_eq!(stored.status(), ActionStatus::Completed);
        assert_eq!(*handler.performed.lock().unwrap(), 1);
    }

    #[test]
    fn should_cancel_unfinished_instance_on_removal() {
        let handler = Arc::new(CountingHandler::default());
        let mut dev = device_with_reset(Arc::clone(&handler));
        let id = dev
            .request_action(&json!({"reset": {}}))
            .unwrap()
            .id()
            .to_string();

        assert!(dev.remove_action(&id));
        assert_eq!(*handler.cancelled.lock().unwrap(), 1);
        assert!(dev.find_action_instance(&id).is_none());
    }

    #[test]
    fn should_leave_queue_untouched_when_removing_unknown_instance() {
        let handler = Arc::new(CountingHandler::default());
        let mut dev = device_with_reset(Arc::clone(&handler));
        dev.request_action(&json!({"reset": {}})).unwrap();

        assert!(!dev.remove_action("0000000000000000"));
        assert_eq!(dev.action_instances().count(), 1);
        assert_eq!(*handler.cancelled.lock().unwrap(), 0);
    }

    #[test]
    fn should_hand_out_new_events_once() {
        let mut dev = device();
        dev.add_event(EventDefinition::new("overload", DataType::Number).unwrap())
            .unwrap();
        dev.queue_event(EventInstance::new("overload", Value::Number(4000.0), ts(1)));
        dev.queue_event(EventInstance::new("overload", Value::Number(4200.0), ts(2)));

        assert_eq!(dev.take_new_events().len(), 2);
        assert!(dev.take_new_events().is_empty());

        dev.queue_event(EventInstance::new("overload", Value::Number(4300.0), ts(3)));
        let fresh = dev.take_new_events();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].value(), &Value::Number(4300.0));

        let queue = dev.serialize_event_queue(None);
        assert_eq!(queue.as_array().unwrap().len(), 3);
        assert_eq!(queue[0]["overload"]["data"], 4300.0);
    }

    #[test]
    fn should_keep_changes_pending_until_cleared() {
        let mut dev = device();
        dev.add_property(
            Property::builder("temp", DataType::Number)
                .value(Value::Number(20.0))
                .build()
                .unwrap(),
        )
        .unwrap();
        dev.set_property("temp", Value::Number(25.0)).unwrap();

        assert_eq!(dev.pending_changes(&ts(1)).len(), 1);
        assert_eq!(dev.pending_changes(&ts(2)).len(), 1);

        dev.clear_change("temp");
        assert!(dev.pending_changes(&ts(3)).is_empty());
        dev.clear_change("missing");
    }

    #[test]
    fn should_acknowledge_events_one_by_one() {
        let mut dev = device();
        dev.queue_event(EventInstance::new("overload", Value::Number(1.0), ts(1)));
        dev.queue_event(EventInstance::new("overload", Value::Number(2.0), ts(2)));

        dev.acknowledge_events(1);
        assert_eq!(dev.pending_events().len(), 1);
        assert_eq!(dev.pending_events()[0].value(), &Value::Number(2.0));

        dev.acknowledge_events(5);
        assert!(dev.pending_events().is_empty());
    }

    #[test]
    fn should_prune_only_delivered_events() {
        let mut dev = device();
        for n in 0..10 {
            dev.queue_event(EventInstance::new("overload", Value::Number(f64::from(n)), ts(n)));
        }
        dev.acknowledge_events(8);

        dev.prune_delivered_events(3);

        assert_eq!(dev.event_instances().count(), 5);
        assert_eq!(dev.pending_events().len(), 2);
        assert_eq!(dev.pending_events()[0].value(), &Value::Number(8.0));
        let oldest = dev.event_instances().last().unwrap();
        assert_eq!(oldest.value(), &Value::Number(5.0));
    }

    #[test]
    fn should_serialize_all_sections_in_reverse_order() {
        let handler = Arc::new(CountingHandler::default());
        let mut dev = device_with_reset(Arc::clone(&handler));
        dev.add_action(ActionDefinition::builder("calibrate", handler).build().unwrap())
            .unwrap();
        dev.add_event(EventDefinition::new("overload", DataType::Number).unwrap())
            .unwrap();

        let doc = dev.serialize(&ctx());
        let actions: Vec<&String> = doc["actions"].as_object().unwrap().keys().collect();
        assert_eq!(actions, ["calibrate", "reset"]);
        assert!(doc["events"]["overload"].is_object());
    }
}
