//! Typed values carried by properties and events.
//!
//! A property or event declares one [`DataType`] for its whole lifetime; the
//! matching [`Value`] variant is the only one it will ever hold.

use serde::Serialize;

use crate::error::ValidationError;

/// Minimum absolute difference for a `number` write to count as a change.
pub const NUMBER_CHANGE_THRESHOLD: f64 = 0.5;

/// Minimum absolute difference for an `integer` write to count as a change.
pub const INTEGER_CHANGE_THRESHOLD: u64 = 1;

/// Declared type of a property or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Carries no state; writes are ignored.
    #[default]
    NoState,
    Boolean,
    Number,
    Integer,
    String,
}

impl DataType {
    /// JSON-schema `type` keyword, `None` for [`DataType::NoState`].
    #[must_use]
    pub fn schema_type(self) -> Option<&'static str> {
        match self {
            Self::NoState => None,
            Self::Boolean => Some("boolean"),
            Self::Number => Some("number"),
            Self::Integer => Some("integer"),
            Self::String => Some("string"),
        }
    }

    /// Schema-kind tag emitted as `instanceOf`.
    #[must_use]
    pub fn instance_of(self) -> Option<&'static str> {
        match self {
            Self::NoState => None,
            Self::Boolean => Some("org.ict.model.wot.dataschema.BooleanSchema"),
            Self::Number => Some("org.ict.model.wot.dataschema.NumberSchema"),
            Self::Integer => Some("org.ict.model.wot.dataschema.IntegerSchema"),
            Self::String => Some("org.ict.model.wot.dataschema.StringSchema"),
        }
    }

    /// Whether `minimum`/`maximum`/`multipleOf` apply.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.schema_type().unwrap_or("none"))
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    None,
    Boolean(bool),
    Number(f64),
    Integer(i64),
    Text(String),
}

impl Value {
    /// Initial value held by a freshly declared slot of type `data_type`.
    #[must_use]
    pub fn default_for(data_type: DataType) -> Self {
        match data_type {
            DataType::NoState => Self::None,
            DataType::Boolean => Self::Boolean(false),
            DataType::Number => Self::Number(0.0),
            DataType::Integer => Self::Integer(0),
            DataType::String => Self::Text(String::new()),
        }
    }

    /// The [`DataType`] this value belongs to.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::None => DataType::NoState,
            Self::Boolean(_) => DataType::Boolean,
            Self::Number(_) => DataType::Number,
            Self::Integer(_) => DataType::Integer,
            Self::Text(_) => DataType::String,
        }
    }

    /// Convert an inbound JSON scalar into a value of the declared type.
    ///
    /// Integers are accepted where a `number` is declared.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TypeMismatch`] when `json` cannot represent
    /// a value of `data_type`.
    pub fn from_json(data_type: DataType, json: &serde_json::Value) -> Result<Self, ValidationError> {
        let converted = match data_type {
            DataType::NoState => Some(Self::None),
            DataType::Boolean => json.as_bool().map(Self::Boolean),
            DataType::Number => json.as_f64().map(Self::Number),
            DataType::Integer => json.as_i64().map(Self::Integer),
            DataType::String => json.as_str().map(|s| Self::Text(s.to_string())),
        };
        converted.ok_or(ValidationError::TypeMismatch {
            expected: data_type,
            found: json_kind(json),
        })
    }

    /// JSON representation (non-finite numbers become `null`).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::None => serde_json::Value::Null,
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::from(*n),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Per-type change rule applied when `next` replaces `self`.
    ///
    /// - boolean: any difference
    /// - number: `|next - self| >= 0.5`
    /// - integer: `|next - self| >= 1`
    /// - text: always
    /// - none: never
    ///
    /// Values of different variants always count as a change.
    #[must_use]
    pub fn is_material_change(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::None, Self::None) => false,
            (Self::Boolean(a), Self::Boolean(b)) => a != b,
            (Self::Number(a), Self::Number(b)) => (b - a).abs() >= NUMBER_CHANGE_THRESHOLD,
            (Self::Integer(a), Self::Integer(b)) => a.abs_diff(*b) >= INTEGER_CHANGE_THRESHOLD,
            // text is event-like, and mixed variants are always a change
            _ => true,
        }
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
