//! Topic layout under `things/<thing id>`.
//!
//! | Topic | Direction | Retained |
//! |-------|-----------|----------|
//! | `things/<id>` | out | yes |
//! | `things/<id>/properties/<pid>` | out | yes |
//! | `things/<id>/properties/<pid>/set` | in | |
//! | `things/<id>/actions/<name>` | in | |
//! | `things/<id>/actions/<name>/<instance>` | out | no |
//! | `things/<id>/events/<name>` | out | no |

const ROOT: &str = "things";

/// Description document of a thing.
#[must_use]
pub fn thing(thing_id: &str) -> String {
    format!("{ROOT}/{thing_id}")
}

/// Latest value of a property.
#[must_use]
pub fn property(thing_id: &str, property_id: &str) -> String {
    format!("{ROOT}/{thing_id}/properties/{property_id}")
}

/// Write requests for a property.
#[must_use]
pub fn property_write(thing_id: &str, property_id: &str) -> String {
    format!("{ROOT}/{thing_id}/properties/{property_id}/set")
}

/// Invocation requests for an action.
#[must_use]
pub fn action(thing_id: &str, name: &str) -> String {
    format!("{ROOT}/{thing_id}/actions/{name}")
}

/// Resource of one action instance.
#[must_use]
pub fn action_instance(thing_id: &str, name: &str, instance_id: &str) -> String {
    format!("{ROOT}/{thing_id}/actions/{name}/{instance_id}")
}

/// Occurrences of an event.
#[must_use]
pub fn event(thing_id: &str, name: &str) -> String {
    format!("{ROOT}/{thing_id}/events/{name}")
}

/// Subscription filter covering every action of a thing.
#[must_use]
pub fn action_filter(thing_id: &str) -> String {
    action(thing_id, "+")
}

/// Subscription filter covering every property write of a thing.
#[must_use]
pub fn property_write_filter(thing_id: &str) -> String {
    property_write(thing_id, "+")
}

/// A topic the adapter accepts requests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    ActionRequest { thing_id: &'a str, action: &'a str },
    PropertyWrite { thing_id: &'a str, property: &'a str },
}

impl<'a> Inbound<'a> {
    /// Classify an inbound topic. Returns `None` for anything outside the
    /// request topics.
    #[must_use]
    pub fn parse(topic: &'a str) -> Option<Self> {
        let segments: Vec<&str> = topic.split('/').collect();
        match segments.as_slice() {
            &[ROOT, thing_id, "actions", action] if !thing_id.is_empty() && !action.is_empty() => {
                Some(Self::ActionRequest { thing_id, action })
            }
            &[ROOT, thing_id, "properties", property, "set"]
                if !thing_id.is_empty() && !property.is_empty() =>
            {
                Some(Self::PropertyWrite { thing_id, property })
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn thing_id(&self) -> &'a str {
        match *self {
            Self::ActionRequest { thing_id, .. } | Self::PropertyWrite { thing_id, .. } => thing_id,
        }
    }
}
