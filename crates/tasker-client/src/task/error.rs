/*
[INPUT]:  Dispatch failures, server error events, termination notices
[OUTPUT]: TaskError, the rejection type of a task outcome
[POS]:    Task layer - outcome error taxonomy
[UPDATE]: When adding new ways for a task session to fail
*/

use crate::http::TaskerError;
use crate::types::TaskEvent;
use thiserror::Error;

/// Why a task outcome was rejected
#[derive(Error, Debug)]
pub enum TaskError {
    /// The dispatch command failed at the transport level
    #[error("dispatch failed: {0}")]
    Dispatch(#[source] TaskerError),

    /// The server reported an error event for the task
    #[error("task failed: {}", describe(.0))]
    Reported(TaskEvent),

    /// The server terminated the task (reject policy only)
    #[error("task terminated: {}", describe(.0))]
    Terminated(TaskEvent),

    /// The event subscription could not be opened
    #[error("subscription failed: {0}")]
    Subscribe(#[source] TaskerError),

    /// The event stream ended before any terminal event
    #[error("event subscription closed before the task settled")]
    SubscriptionClosed,
}

impl TaskError {
    /// Event payload for server-reported failures
    pub fn event(&self) -> Option<&TaskEvent> {
        match self {
            TaskError::Reported(event) | TaskError::Terminated(event) => Some(event),
            _ => None,
        }
    }

    /// Transport error for local failures
    pub fn transport(&self) -> Option<&TaskerError> {
        match self {
            TaskError::Dispatch(err) | TaskError::Subscribe(err) => Some(err),
            _ => None,
        }
    }
}

fn describe(event: &TaskEvent) -> String {
    match (&event.task_id, &event.data) {
        (Some(task_id), Some(data)) => format!("{task_id}: {data}"),
        (Some(task_id), None) => task_id.to_string(),
        (None, Some(data)) => data.to_string(),
        (None, None) => "no details".to_string(),
    }
}
