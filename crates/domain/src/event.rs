//! Events — typed occurrences emitted by a device.

use serde_json::{Map, Value as Json, json};

use crate::error::{ThingError, ValidationError};
use crate::schema::{Annotations, DescriptionContext, form, insert_text, write_type};
use crate::time::{Timestamp, to_iso8601};
use crate::value::{DataType, Value};

/// Declaration of an event a device may emit.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    pub id: String,
    pub data_type: DataType,
    pub annotations: Annotations,
    pub read_only: bool,
}

impl EventDefinition {
    /// Declare an event carrying values of `data_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::Validation`] when `id` is empty.
    pub fn new(id: impl Into<String>, data_type: DataType) -> Result<Self, ThingError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        Ok(Self {
            id,
            data_type,
            annotations: Annotations::default(),
            read_only: false,
        })
    }

    #[must_use]
    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Event affordance for the description document.
    #[must_use]
    pub fn serialize(&self, ctx: &DescriptionContext<'_>) -> Json {
        let ann = &self.annotations;

        let mut data = Map::new();
        write_type(self.data_type, &mut data);
        insert_text(&mut data, "unit", ann.unit.as_deref());
        ann.write_numeric_constraints(self.data_type, &mut data);
        insert_text(&mut data, "@type", ann.at_type.as_deref());

        let mut obj = Map::new();
        obj.insert("data".into(), Json::Object(data));
        insert_text(&mut obj, "title", ann.title.as_deref());
        insert_text(&mut obj, "description", ann.description.as_deref());
        if self.read_only {
            obj.insert("readOnly".into(), Json::from(true));
        }
        let href = ctx.href(&format!("events/{}", self.id));
        obj.insert("forms".into(), json!([form("subscribeevent", href)]));
        Json::Object(obj)
    }
}

/// One occurrence of an event. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct EventInstance {
    name: String,
    value: Value,
    timestamp: Timestamp,
}

impl EventInstance {
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value, timestamp: Timestamp) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Queue entry: `{"<name>": {"data": <value>, "timestamp": <iso8601>}}`.
    #[must_use]
    pub fn serialize(&self) -> Json {
        let mut obj = Map::new();
        obj.insert(
            self.name.clone(),
            json!({
                "data": self.value.to_json(),
                "timestamp": to_iso8601(&self.timestamp),
            }),
        );
        Json::Object(obj)
    }
}
