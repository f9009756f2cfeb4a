/*
[INPUT]:  Raw JSON payloads delivered on the status namespace
[OUTPUT]: TaskId, TaskEvent, ChannelEvent, TaskState
[POS]:    Data layer - task lifecycle models
[UPDATE]: When event payload fields or session states change
*/

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque identifier of one task lifecycle, assigned by the task server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Payload of a task lifecycle event
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TaskEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Any other fields the server attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskEvent {
    /// Interpret an event payload.
    ///
    /// Objects map field-by-field; any other JSON value becomes `data`.
    pub fn from_payload(payload: Value) -> Self {
        match payload {
            Value::Object(map) => match serde_json::from_value(Value::Object(map.clone())) {
                Ok(event) => event,
                // task_id of an unexpected type; keep everything as extra
                Err(_) => Self {
                    task_id: None,
                    data: None,
                    extra: map,
                },
            },
            Value::Null => Self::default(),
            other => Self {
                data: Some(other),
                ..Self::default()
            },
        }
    }
}

/// A named event received from the event channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub name: String,
    pub payload: Value,
}

impl ChannelEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Client-side state of one task session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Subscribed, waiting for the activation event
    Pending,
    /// Activation observed, task id bound, dispatch issued
    Activated,
    Succeeded,
    Failed,
    /// Termination notice received; under the notify policy the outcome may still settle
    Terminated,
}

impl TaskState {
    /// Whether the outcome has been settled in this state
    pub fn is_settled(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}
