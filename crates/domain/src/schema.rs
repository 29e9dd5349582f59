//! Building blocks shared by the property, action and event documents.

use serde_json::{Map, Value as Json, json};

use crate::value::DataType;

/// Thing Description 1.0 context.
pub const TD_CONTEXT: &str = "https://www.w3.org/2019/wot/td/v1";
/// iotschema.org vocabulary, bound to the `iot` prefix.
pub const IOT_CONTEXT: &str = "http://iotschema.org/";
/// MQTT protocol binding vocabulary, bound to the `mqv` prefix.
pub const MQTT_BINDING_CONTEXT: &str = "http://www.example.org/mqtt-binding#";
/// Semantic type used when nothing more specific was declared.
pub const PLACEHOLDER_TYPE: &str = "iot:TODO";
pub const OBJECT_SCHEMA: &str = "org.ict.model.wot.dataschema.ObjectSchema";
pub const BASIC_SECURITY_SCHEME: &str = "org.ict.model.wot.security.BasicSecurityScheme";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Where a thing lives on the broker; used to build absolute `href`s.
#[derive(Debug, Clone, Copy)]
pub struct DescriptionContext<'a> {
    /// Broker URI, e.g. `mqtt://broker.local:1883`.
    pub broker_uri: &'a str,
    /// Topic identity of the thing (`things/<thing_id>`).
    pub thing_id: &'a str,
}

impl DescriptionContext<'_> {
    /// Absolute address of the thing itself.
    #[must_use]
    pub fn thing_href(&self) -> String {
        format!(
            "{}/things/{}",
            self.broker_uri.trim_end_matches('/'),
            self.thing_id
        )
    }

    /// Absolute address of a resource below the thing (`properties/temp`, …).
    #[must_use]
    pub fn href(&self, path: &str) -> String {
        format!("{}/{path}", self.thing_href())
    }
}

/// Human and semantic annotations of a typed slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    pub title: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub multiple_of: Option<f64>,
    /// Semantic `@type` tag, e.g. `iot:TemperatureData`.
    pub at_type: Option<String>,
}

impl Annotations {
    /// Write `minimum`/`maximum` (only for a non-empty range) and a positive
    /// `multipleOf`, for numeric types only.
    pub fn write_numeric_constraints(&self, data_type: DataType, obj: &mut Map<String, Json>) {
        if !data_type.is_numeric() {
            return;
        }
        if let (Some(min), Some(max)) = (self.minimum, self.maximum)
            && min < max
        {
            obj.insert("minimum".into(), Json::from(min));
            obj.insert("maximum".into(), Json::from(max));
        }
        if let Some(step) = self.multiple_of.filter(|step| *step > 0.0) {
            obj.insert("multipleOf".into(), Json::from(step));
        }
    }
}

/// Write the `instanceOf` / `type` pair for `data_type`.
pub fn write_type(data_type: DataType, obj: &mut Map<String, Json>) {
    if let (Some(instance_of), Some(ty)) = (data_type.instance_of(), data_type.schema_type()) {
        obj.insert("instanceOf".into(), Json::from(instance_of));
        obj.insert("type".into(), Json::from(ty));
    }
}

/// Insert `value` under `key` when present and non-empty.
pub fn insert_text(obj: &mut Map<String, Json>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        obj.insert(key.into(), Json::from(value));
    }
}

/// A single interaction form.
#[must_use]
pub fn form(op: &str, href: String) -> Json {
    json!({
        "op": [op],
        "href": href,
        "contentType": CONTENT_TYPE_JSON,
    })
}
