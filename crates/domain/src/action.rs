//! Actions — invocable capabilities of a device.
//!
//! An [`ActionDefinition`] describes a capability and owns the
//! [`ActionHandler`] that turns accepted requests into side effects. Each
//! accepted request becomes an [`ActionInstance`] with its own lifecycle.

mod instance;

pub use instance::{ActionInstance, ActionStatus};

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as Json, json};

use crate::error::{ThingError, ValidationError};
use crate::id::InstanceId;
use crate::schema::{DescriptionContext, form, insert_text};
use crate::time::Timestamp;

/// Capability owner for an action.
///
/// The handler is shared between the definition and every instance it
/// produced; the registering code may keep its own clone.
pub trait ActionHandler: Send + Sync {
    /// Decide whether a request becomes an instance. Declined requests are
    /// dropped without being queued.
    fn accept(&self, input: &Json) -> bool {
        let _ = input;
        true
    }

    /// Perform the side effect. Called while the instance is `pending`.
    fn perform(&self, instance: &ActionInstance);

    /// Notification that an unfinished instance was removed.
    fn cancel(&self, instance: &ActionInstance) {
        let _ = instance;
    }
}

/// A request document: exactly one top-level key naming the action, whose
/// value is the action input.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub name: String,
    pub input: Json,
}

impl ActionRequest {
    /// Parse a request document, returning `None` unless it is an object
    /// with exactly one key.
    #[must_use]
    pub fn parse(document: &Json) -> Option<Self> {
        let object = document.as_object()?;
        if object.len() != 1 {
            return None;
        }
        let (name, input) = object.iter().next()?;
        Some(Self {
            name: name.clone(),
            input: input.clone(),
        })
    }
}

/// Definition of an invocable action.
#[derive(Clone)]
pub struct ActionDefinition {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub at_type: Option<String>,
    /// Members of the input object schema.
    pub input: Option<Map<String, Json>>,
    /// Members of the output object schema.
    pub output: Option<Map<String, Json>>,
    handler: Arc<dyn ActionHandler>,
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("id", &self.id)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

impl ActionDefinition {
    #[must_use]
    pub fn builder(id: impl Into<String>, handler: Arc<dyn ActionHandler>) -> ActionDefinitionBuilder {
        ActionDefinitionBuilder {
            id: id.into(),
            title: None,
            description: None,
            at_type: None,
            input: None,
            output: None,
            handler,
        }
    }

    /// Turn an accepted request into a new instance in the `created` state.
    ///
    /// Returns `None` when the handler declines the request.
    #[must_use]
    pub fn create(&self, request: ActionRequest, id: InstanceId, now: Timestamp) -> Option<ActionInstance> {
        if !self.handler.accept(&request.input) {
            return None;
        }
        Some(ActionInstance::new(
            id,
            request.name,
            request.input,
            now,
            Arc::clone(&self.handler),
        ))
    }

    /// Action affordance for the description document.
    #[must_use]
    pub fn serialize(&self, ctx: &DescriptionContext<'_>) -> Json {
        let mut obj = Map::new();
        insert_text(&mut obj, "title", self.title.as_deref());
        insert_text(&mut obj, "description", self.description.as_deref());
        if let Some(at_type) = self.at_type.as_deref().filter(|t| !t.is_empty()) {
            obj.insert("@type".into(), json!([at_type]));
        }
        obj.insert("safe".into(), Json::from(false));
        obj.insert("idempotent".into(), Json::from(false));
        if let Some(input) = &self.input {
            obj.insert("input".into(), object_schema(input, false, true));
        }
        if let Some(output) = &self.output {
            obj.insert("output".into(), object_schema(output, true, false));
        }
        let href = ctx.href(&format!("actions/{}", self.id));
        obj.insert("forms".into(), json!([form("invokeaction", href)]));
        Json::Object(obj)
    }
}

fn object_schema(members: &Map<String, Json>, read_only: bool, write_only: bool) -> Json {
    let mut obj = Map::new();
    obj.insert("type".into(), Json::from("object"));
    obj.insert("readOnly".into(), Json::from(read_only));
    obj.insert("writeOnly".into(), Json::from(write_only));
    for (key, value) in members {
        obj.insert(key.clone(), value.clone());
    }
    Json::Object(obj)
}

/// Step-by-step builder for [`ActionDefinition`].
pub struct ActionDefinitionBuilder {
    id: String,
    title: Option<String>,
    description: Option<String>,
    at_type: Option<String>,
    input: Option<Map<String, Json>>,
    output: Option<Map<String, Json>>,
    handler: Arc<dyn ActionHandler>,
}

impl ActionDefinitionBuilder {
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

    #[must_use]
    pub fn at_type(mut self, at_type: impl Into<String>) -> Self {
        self.at_type = Some(at_type.into());
        self
    }

    #[must_use]
    pub fn input(mut self, schema: Map<String, Json>) -> Self {
        self.input = Some(schema);
        self
    }

    #[must_use]
    pub fn output(mut self, schema: Map<String, Json>) -> Self {
        self.output = Some(schema);
        self
    }

    /// Consume the builder and return an [`ActionDefinition`].
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::Validation`] when the id is empty.
    pub fn build(self) -> Result<ActionDefinition, ThingError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        Ok(ActionDefinition {
            id: self.id,
            title: self.title,
            description: self.description,
            at_type: self.at_type,
            input: self.input,
            output: self.output,
            handler: self.handler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct Decline;

    impl ActionHandler for Decline {
        fn accept(&self, _input: &Json) -> bool {
            false
        }

        fn perform(&self, _instance: &ActionInstance) {}
    }

    struct Noop;

    impl ActionHandler for Noop {
        fn perform(&self, _instance: &ActionInstance) {}
    }

    fn instance_id() -> InstanceId {
        InstanceId::generate(&mut StdRng::seed_from_u64(3))
    }

    #[test]
    fn should_parse_single_key_request() {
        let request = ActionRequest::parse(&json!({"reset": {"counter": "energy"}})).unwrap();
        assert_eq!(request.name, "reset");
        assert_eq!(request.input, json!({"counter": "energy"}));
    }

    #[test]
    fn should_reject_requests_without_exactly_one_key() {
        assert!(ActionRequest::parse(&json!({})).is_none());
        assert!(ActionRequest::parse(&json!({"a": {}, "b": {}})).is_none());
        assert!(ActionRequest::parse(&json!(["reset"])).is_none());
        assert!(ActionRequest::parse(&json!("reset")).is_none());
    }

    #[test]
    fn should_return_none_when_handler_declines() {
        let action = ActionDefinition::builder("reset", Arc::new(Decline))
            .build()
            .unwrap();
        let request = ActionRequest::parse(&json!({"reset": {}})).unwrap();
        assert!(action.create(request, instance_id(), crate::time::now()).is_none());
    }

    #[test]
    fn should_create_instance_in_created_state() {
        let action = ActionDefinition::builder("reset", Arc::new(Noop))
            .build()
            .unwrap();
        let request = ActionRequest::parse(&json!({"reset": {"counter": "energy"}})).unwrap();
        let instance = action
            .create(request, instance_id(), crate::time::now())
            .unwrap();
        assert_eq!(instance.status(), ActionStatus::Created);
        assert_eq!(instance.name(), "reset");
        assert!(instance.time_completed().is_none());
    }

    #[test]
    fn should_reject_empty_action_id() {
        let result = ActionDefinition::builder("", Arc::new(Noop)).build();
        assert!(matches!(result, Err(ThingError::Validation(_))));
    }

    #[test]
    fn should_serialize_action_affordance() {
        let mut input = Map::new();
        input.insert("properties".into(), json!({"counter": {"type": "string"}}));
        let action = ActionDefinition::builder("reset", Arc::new(Noop))
            .title("Reset")
            .description("Reset a counter")
            .at_type("iot:ResetAction")
            .input(input)
            .build()
            .unwrap();
        let ctx = DescriptionContext {
            broker_uri: "mqtt://broker:1883",
            thing_id: "abc",
        };

        let doc = action.serialize(&ctx);
        assert_eq!(doc["title"], "Reset");
        assert_eq!(doc["@type"], json!(["iot:ResetAction"]));
        assert_eq!(doc["safe"], false);
        assert_eq!(doc["idempotent"], false);
        assert_eq!(doc["input"]["type"], "object");
        assert_eq!(doc["input"]["writeOnly"], true);
        assert_eq!(doc["input"]["properties"]["counter"]["type"], "string");
        assert!(doc.get("output").is_none());
        assert_eq!(doc["forms"][0]["op"], json!(["invokeaction"]));
        assert_eq!(
            doc["forms"][0]["href"],
            "mqtt://broker:1883/things/abc/actions/reset"
        );
    }
}
