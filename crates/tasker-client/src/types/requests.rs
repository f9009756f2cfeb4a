/*
[INPUT]:  Caller task data and bound task identifiers
[OUTPUT]: JSON bodies for dispatch and terminate commands
[POS]:    Data layer - command payload construction
[UPDATE]: When the dispatch or terminate body shape changes
*/

use crate::http::{Result, TaskerError};
use crate::types::TaskId;
use serde::Serialize;
use serde_json::{Map, Value};

/// Caller data submitted with a new task; always a JSON object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskData(Map<String, Value>);

impl TaskData {
    /// No task data; used when re-attaching to an existing task
    pub fn empty() -> Self {
        Self::default()
    }

    /// Serialize caller data, which must produce a JSON object
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        match serde_json::to_value(data)? {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::empty()),
            other => Err(TaskerError::InvalidData(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dispatch body: caller fields plus `task_id`, which overrides any caller key of that name
    pub fn dispatch_body(&self, task_id: &TaskId) -> Value {
        let mut body = self.0.clone();
        body.insert(
            "task_id".to_string(),
            Value::String(task_id.as_str().to_string()),
        );
        Value::Object(body)
    }
}

impl From<Map<String, Value>> for TaskData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Body of the terminate command
#[derive(Debug, Clone, Serialize)]
pub struct TerminateRequest<'a> {
    pub task_id: &'a TaskId,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
