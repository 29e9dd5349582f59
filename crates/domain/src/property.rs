//! Property — a named, typed, observable state slot on a device.
//!
//! Writes go through [`Property::set_value`], which applies the per-type
//! change rule from [`Value::is_material_change`]. The resulting change flag
//! is consumed with [`Property::take_change`], so every change is observed at
//! most once.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as Json, json};

use crate::error::{ThingError, ValidationError};
use crate::iot_schema::IotSchema;
use crate::schema::{
    Annotations, DescriptionContext, OBJECT_SCHEMA, PLACEHOLDER_TYPE, form, insert_text,
    write_type,
};
use crate::time::{Timestamp, to_iso8601};
use crate::value::{DataType, Value};

/// Callback invoked with the new value whenever the property is written
/// through [`Device::set_property`](crate::device::Device::set_property).
///
/// The registering code keeps its own handle; the property only holds a
/// shared reference.
pub type WriteCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// A typed, annotated state slot.
#[derive(Clone)]
pub struct Property {
    pub id: String,
    pub data_type: DataType,
    pub annotations: Annotations,
    /// Declared read-only in the value schema.
    pub read_only: bool,
    /// Capability the property belongs to, advertised as `iot:<capability>`.
    pub capability: Option<String>,
    /// Allowed discrete values, emitted as `enum`.
    pub enum_values: Vec<String>,
    value: Value,
    changed: bool,
    on_write: Option<WriteCallback>,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id)
            .field("data_type", &self.data_type)
            .field("value", &self.value)
            .field("changed", &self.changed)
            .field("writable", &self.is_writable())
            .finish_non_exhaustive()
    }
}

impl Property {
    /// Create a builder for a property of the given type.
    #[must_use]
    pub fn builder(id: impl Into<String>, data_type: DataType) -> PropertyBuilder {
        PropertyBuilder::new(id.into(), data_type)
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether the most recent write was a material change that has not been
    /// consumed yet.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    /// Whether external writers may set this property.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.on_write.is_some()
    }

    /// Apply the type's change rule to `next`.
    ///
    /// The value is only replaced on a material change; a write below the
    /// threshold keeps the previous value and clears the change flag. Returns
    /// the new state of the change flag.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TypeMismatch`] when `next` is not of the
    /// declared type. `none` properties accept and ignore any value.
    pub fn set_value(&mut self, next: Value) -> Result<bool, ValidationError> {
        if self.data_type == DataType::NoState {
            self.changed = false;
            return Ok(false);
        }
        if next.data_type() != self.data_type {
            return Err(ValidationError::TypeMismatch {
                expected: self.data_type,
                found: next.data_type().schema_type().unwrap_or("none"),
            });
        }

        self.changed = self.value.is_material_change(&next);
        if self.changed {
            self.value = next;
        }
        Ok(self.changed)
    }

    /// Return the value if it changed since the last call, clearing the flag.
    pub fn take_change(&mut self) -> Option<Value> {
        std::mem::take(&mut self.changed).then(|| self.value.clone())
    }

    /// Invoke the write callback, if any.
    pub fn notify_write(&self, value: &Value) {
        if let Some(callback) = &self.on_write {
            callback(value);
        }
    }

    /// Change notification payload: `{"time": <iso8601>, "<id>": <value>}`.
    #[must_use]
    pub fn value_payload(&self, at: &Timestamp) -> Json {
        let mut payload = Map::new();
        payload.insert("time".into(), Json::from(to_iso8601(at)));
        payload.insert(self.id.clone(), self.value.to_json());
        Json::Object(payload)
    }

    /// Property affordance for the description document.
    #[must_use]
    pub fn serialize(&self, ctx: &DescriptionContext<'_>) -> Json {
        let mut inner_properties = Map::new();
        inner_properties.insert(self.id.clone(), self.value_schema());
        inner_properties.insert("time".into(), time_schema());

        let mut obj = Map::new();
        obj.insert("properties".into(), Json::Object(inner_properties));
        if !self.enum_values.is_empty() {
            obj.insert("enum".into(), json!(self.enum_values));
        }
        obj.insert("required".into(), json!(["time", self.id]));
        obj.insert("title".into(), Json::from(self.id.as_str()));
        obj.insert("instanceOf".into(), Json::from(OBJECT_SCHEMA));
        let capability_type = self
            .capability
            .as_deref()
            .map_or_else(|| PLACEHOLDER_TYPE.to_string(), |c| format!("iot:{c}"));
        obj.insert("@type".into(), json!([capability_type]));
        obj.insert("type".into(), Json::from("object"));
        obj.insert("readOnly".into(), Json::from(!self.is_writable()));
        obj.insert("writeOnly".into(), Json::from(false));

        let href = ctx.href(&format!("properties/{}", self.id));
        let mut forms = vec![form("observeproperty", href.clone())];
        if self.is_writable() {
            forms.push(form("writeproperty", format!("{href}/set")));
        }
        obj.insert("forms".into(), Json::Array(forms));

        Json::Object(obj)
    }

    fn value_schema(&self) -> Json {
        let ann = &self.annotations;
        let mut obj = Map::new();
        write_type(self.data_type, &mut obj);
        if self.read_only {
            obj.insert("readOnly".into(), Json::from(true));
        }
        insert_text(&mut obj, "unit", ann.unit.as_deref());
        insert_text(&mut obj, "title", ann.title.as_deref());
        insert_text(&mut obj, "description", ann.description.as_deref());
        ann.write_numeric_constraints(self.data_type, &mut obj);
        let at_type = ann.at_type.as_deref().unwrap_or(PLACEHOLDER_TYPE);
        obj.insert("@type".into(), json!([at_type]));
        Json::Object(obj)
    }
}

/// Companion `time` field required on every property object.
fn time_schema() -> Json {
    json!({
        "title": "Date time",
        "description": "the date time in ISO 8601 format",
        "type": "string",
        "instanceOf": "org.ict.model.wot.dataschema.StringSchema",
        "@type": ["http://schema.org/DateTime"],
        "readOnly": true,
        "writeOnly": false,
    })
}

/// Step-by-step builder for [`Property`].
pub struct PropertyBuilder {
    id: String,
    data_type: DataType,
    annotations: Annotations,
    read_only: bool,
    capability: Option<String>,
    enum_values: Vec<String>,
    value: Option<Value>,
    on_write: Option<WriteCallback>,
}

impl PropertyBuilder {
    fn new(id: String, data_type: DataType) -> Self {
        Self {
            id,
            data_type,
            annotations: Annotations::default(),
            read_only: false,
            capability: None,
            enum_values: Vec::new(),
            value: None,
            on_write: None,
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.annotations.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.annotations.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.annotations.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.annotations.minimum = Some(minimum);
        self.annotations.maximum = Some(maximum);
        self
    }

    #[must_use]
    pub fn multiple_of(mut self, step: f64) -> Self {
        self.annotations.multiple_of = Some(step);
        self
    }

    #[must_use]
    pub fn at_type(mut self, at_type: impl Into<String>) -> Self {
        self.annotations.at_type = Some(at_type.into());
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    /// Apply an iotschema.org preset (annotations and capability).
    #[must_use]
    pub fn iot_schema(mut self, schema: &IotSchema) -> Self {
        self.annotations = schema.annotations();
        self.capability = Some(schema.capability.clone());
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Register a write callback; the property becomes writable.
    #[must_use]
    pub fn on_write(mut self, callback: WriteCallback) -> Self {
        self.on_write = Some(callback);
        self
    }

    /// Consume the builder, validate, and return a [`Property`].
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::Validation`] if the id is empty or the initial
    /// value does not match the declared type.
    pub fn build(self) -> Result<Property, ThingError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        let value = match self.value {
            Some(value) if value.data_type() != self.data_type => {
                return Err(ValidationError::TypeMismatch {
                    expected: self.data_type,
                    found: value.data_type().schema_type().unwrap_or("none"),
                }
                .into());
            }
            Some(value) => value,
            None => Value::default_for(self.data_type),
        };

        Ok(Property {
            id: self.id,
            data_type: self.data_type,
            annotations: self.annotations,
            read_only: self.read_only,
            capability: self.capability,
            enum_values: self.enum_values,
            value,
            changed: false,
            on_write: self.on_write,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iot_schema::IotDataType;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn ctx() -> DescriptionContext<'static> {
        DescriptionContext {
            broker_uri: "mqtt://broker:1883",
            thing_id: "a4c1385b0edf-meter",
        }
    }

    fn number(id: &str, initial: f64) -> Property {
        Property::builder(id, DataType::Number)
            .value(Value::Number(initial))
            .build()
            .unwrap()
    }

    #[test]
    fn should_ignore_small_number_writes_and_flag_large_ones() {
        let mut temp = number("temp", 20.0);

        assert!(!temp.set_value(Value::Number(20.3)).unwrap());
        assert_eq!(temp.take_change(), None);
        assert_eq!(temp.value(), &Value::Number(20.0));

        assert!(temp.set_value(Value::Number(20.6)).unwrap());
        assert_eq!(temp.take_change(), Some(Value::Number(20.6)));
    }

    #[test]
    fn should_measure_threshold_from_last_accepted_value() {
        let mut temp = number("temp", 20.0);
        temp.set_value(Value::Number(20.4)).unwrap();
        temp.set_value(Value::Number(20.8)).unwrap();
        assert!(temp.has_changed());
        assert_eq!(temp.value(), &Value::Number(20.8));
    }

    #[test]
    fn should_clear_change_flag_after_single_read() {
        let mut on = Property::builder("on", DataType::Boolean).build().unwrap();
        on.set_value(Value::Boolean(true)).unwrap();
        assert_eq!(on.take_change(), Some(Value::Boolean(true)));
        assert_eq!(on.take_change(), None);
    }

    #[test]
    fn should_clear_pending_change_when_next_write_is_not_material() {
        let mut on = Property::builder("on", DataType::Boolean).build().unwrap();
        on.set_value(Value::Boolean(true)).unwrap();
        on.set_value(Value::Boolean(true)).unwrap();
        assert!(!on.has_changed());
    }

    #[test]
    fn should_flag_integer_change_of_one() {
        let mut count = Property::builder("count", DataType::Integer).build().unwrap();
        assert!(!count.set_value(Value::Integer(0)).unwrap());
        assert!(count.set_value(Value::Integer(1)).unwrap());
    }

    #[test]
    fn should_always_flag_text_writes() {
        let mut label = Property::builder("label", DataType::String).build().unwrap();
        label.set_value(Value::Text("a".into())).unwrap();
        assert!(label.take_change().is_some());
        label.set_value(Value::Text("a".into())).unwrap();
        assert!(label.take_change().is_some());
    }

    #[test]
    fn should_never_change_no_state_property() {
        let mut marker = Property::builder("marker", DataType::NoState).build().unwrap();
        assert!(!marker.set_value(Value::Boolean(true)).unwrap());
        assert!(marker.take_change().is_none());
    }

    #[test]
    fn should_reject_value_of_wrong_type() {
        let mut temp = number("temp", 0.0);
        let result = temp.set_value(Value::Text("hot".into()));
        assert!(matches!(result, Err(ValidationError::TypeMismatch { .. })));
        assert!(!temp.has_changed());
    }

    #[test]
    fn should_return_validation_error_when_id_is_empty() {
        let result = Property::builder("", DataType::Boolean).build();
        assert!(matches!(
            result,
            Err(ThingError::Validation(ValidationError::EmptyId))
        ));
    }

    #[test]
    fn should_reject_initial_value_of_wrong_type() {
        let result = Property::builder("on", DataType::Boolean)
            .value(Value::Integer(1))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn should_invoke_write_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let relay = Property::builder("relay", DataType::Boolean)
            .on_write(Arc::new(move |v: &Value| sink.lock().unwrap().push(v.clone())))
            .build()
            .unwrap();

        relay.notify_write(&Value::Boolean(true));
        assert_eq!(*seen.lock().unwrap(), vec![Value::Boolean(true)]);
        assert!(relay.is_writable());
    }

    #[test]
    fn should_build_change_payload_with_time_first() {
        let mut temp = number("temp", 20.0);
        temp.set_value(Value::Number(20.6)).unwrap();
        let at = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let payload = temp.value_payload(&at);
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"time":"2024-01-02T03:04:05Z","temp":20.6}"#
        );
    }

    #[test]
    fn should_serialize_read_only_property_affordance() {
        let power = Property::builder("power", DataType::Number)
            .iot_schema(&IotSchema::new("ActivePowerImported", IotDataType::ActivePower))
            .range(0.0, 3680.0)
            .read_only(true)
            .build()
            .unwrap();

        let doc = power.serialize(&ctx());
        let inner = &doc["properties"]["power"];
        assert_eq!(inner["type"], "number");
        assert_eq!(inner["instanceOf"], "org.ict.model.wot.dataschema.NumberSchema");
        assert_eq!(inner["unit"], "Watt");
        assert_eq!(inner["minimum"], 0.0);
        assert_eq!(inner["maximum"], 3680.0);
        assert_eq!(inner["readOnly"], true);
        assert_eq!(inner["@type"], json!(["iot:ActivePowerData"]));
        assert_eq!(doc["properties"]["time"]["readOnly"], true);
        assert_eq!(doc["required"], json!(["time", "power"]));
        assert_eq!(doc["@type"], json!(["iot:ActivePowerImported"]));
        assert_eq!(doc["readOnly"], true);
        assert_eq!(doc["forms"].as_array().unwrap().len(), 1);
        assert_eq!(
            doc["forms"][0]["href"],
            "mqtt://broker:1883/things/a4c1385b0edf-meter/properties/power"
        );
        assert!(doc.get("enum").is_none());
    }

    #[test]
    fn should_advertise_writable_property_with_enum_and_placeholder_type() {
        let mode = Property::builder("mode", DataType::String)
            .enum_values(["eco", "boost"])
            .on_write(Arc::new(|_: &Value| {}))
            .build()
            .unwrap();

        let doc = mode.serialize(&ctx());
        assert_eq!(doc["readOnly"], false);
        assert_eq!(doc["enum"], json!(["eco", "boost"]));
        assert_eq!(doc["@type"], json!(["iot:TODO"]));
        assert_eq!(doc["properties"]["mode"]["@type"], json!(["iot:TODO"]));
        assert_eq!(doc["forms"][1]["op"], json!(["writeproperty"]));
    }
}
