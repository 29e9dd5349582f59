//! Action instance — one invocation of an action and its lifecycle.
//!
//! ```text
//! created --start()--> pending --(perform)--> completed
//! created/pending --remove--> cancel hook --> dropped
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::id::InstanceId;
use crate::time::{Timestamp, to_iso8601};

use super::ActionHandler;

/// Lifecycle state of an [`ActionInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    #[default]
    Created,
    Pending,
    Completed,
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Pending => f.write_str("pending"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// A queued invocation of an action.
pub struct ActionInstance {
    id: InstanceId,
    name: String,
    input: Json,
    status: ActionStatus,
    time_requested: Timestamp,
    time_completed: Option<Timestamp>,
    handler: Arc<dyn ActionHandler>,
}

impl fmt::Debug for ActionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInstance")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("time_requested", &self.time_requested)
            .field("time_completed", &self.time_completed)
            .finish_non_exhaustive()
    }
}

impl ActionInstance {
    pub(crate) fn new(
        id: InstanceId,
        name: String,
        input: Json,
        time_requested: Timestamp,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        Self {
            id,
            name,
            input,
            status: ActionStatus::Created,
            time_requested,
            time_completed: None,
            handler,
        }
    }

    #[must_use]
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Name of the action this instance invokes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn input(&self) -> &Json {
        &self.input
    }

    #[must_use]
    pub fn status(&self) -> ActionStatus {
        self.status
    }

    #[must_use]
    pub fn time_requested(&self) -> Timestamp {
        self.time_requested
    }

    #[must_use]
    pub fn time_completed(&self) -> Option<Timestamp> {
        self.time_completed
    }

    /// Run the action to completion: `pending`, perform, then `completed`.
    ///
    /// Starting an instance that already completed does nothing.
    pub fn start(&mut self, now: Timestamp) {
        if self.status == ActionStatus::Completed {
            return;
        }
        self.status = ActionStatus::Pending;
        let handler = Arc::clone(&self.handler);
        handler.perform(self);
        self.finish(now);
    }

    fn finish(&mut self, now: Timestamp) {
        self.time_completed = Some(now);
        self.status = ActionStatus::Completed;
    }

    /// Notify the capability owner; only unfinished instances are notified.
    /// The status is left unchanged.
    pub fn cancel(&self) {
        if self.status != ActionStatus::Completed {
            self.handler.cancel(self);
        }
    }

    /// Relative resource path: `/things/<thing>/actions/<name>/<id>`.
    #[must_use]
    pub fn href(&self, thing_id: &str) -> String {
        format!("/things/{thing_id}/actions/{}/{}", self.name, self.id)
    }

    /// Action resource: `{input, status, timeRequested, timeCompleted?, href}`.
    #[must_use]
    pub fn resource(&self, thing_id: &str) -> Json {
        let mut data = Map::new();
        data.insert("input".into(), self.input.clone());
        data.insert("status".into(), Json::from(self.status.to_string()));
        data.insert(
            "timeRequested".into(),
            Json::from(to_iso8601(&self.time_requested)),
        );
        if let Some(completed) = &self.time_completed {
            data.insert("timeCompleted".into(), Json::from(to_iso8601(completed)));
        }
        data.insert("href".into(), Json::from(self.href(thing_id)));
        Json::Object(data)
    }

    /// Queue entry: the resource keyed by action name.
    #[must_use]
    pub fn serialize(&self, thing_id: &str) -> Json {
        let mut obj = Map::new();
        obj.insert(self.name.clone(), self.resource(thing_id));
        Json::Object(obj)
    }
}
