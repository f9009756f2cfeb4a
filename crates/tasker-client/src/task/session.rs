/*
[INPUT]:  Event subscription, dispatch results, caller data/headers/observer
[OUTPUT]: Exactly one settlement of the task outcome, observer notifications
[POS]:    Task layer - per-task state machine driver
[UPDATE]: When changing lifecycle transitions, precedence, or cleanup on drop
*/

use crate::config::{TaskerConfig, TerminationPolicy};
use crate::http::{CommandChannel, Result};
use crate::task::{TaskError, TaskObserver, TaskResult};
use crate::types::{ChannelEvent, TaskData, TaskEvent, TaskId, TaskState};
use crate::ws::EventChannel;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// State machine of one task.
///
/// Owned by a single spawned driver: event handling and dispatch completion are
/// serialized through one `select!` loop, so no state is shared for writing.
pub(crate) struct TaskSession {
    pub(crate) config: Arc<TaskerConfig>,
    pub(crate) command: Arc<dyn CommandChannel>,
    pub(crate) events: Arc<dyn EventChannel>,
    pub(crate) data: TaskData,
    pub(crate) headers: Option<HeaderMap>,
    pub(crate) observer: Arc<dyn TaskObserver>,
    pub(crate) task_id: watch::Sender<Option<TaskId>>,
    pub(crate) state: watch::Sender<TaskState>,
    pub(crate) outcome: Option<oneshot::Sender<TaskResult>>,
    pub(crate) progress: mpsc::Sender<TaskEvent>,
}

impl TaskSession {
    pub(crate) async fn run(mut self) {
        let query: Vec<(String, String)> = match self.bound_task_id() {
            Some(task_id) => vec![("task_id".to_string(), task_id.to_string())],
            None => Vec::new(),
        };

        let address = match self.config.namespace_url() {
            Ok(address) => address,
            Err(err) => {
                self.fail(TaskError::Subscribe(err));
                return;
            }
        };

        let mut subscription = match self.events.subscribe(&address, &query).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(url = %address, error = %err, "event subscription failed");
                self.fail(TaskError::Subscribe(err));
                return;
            }
        };
        debug!(url = %address, task_id = ?self.bound_task_id(), "session subscribed");

        let (dispatch_tx, mut dispatch_rx) = mpsc::channel::<Result<Value>>(1);
        let mut dispatched = false;

        while self.outcome.is_some() {
            tokio::select! {
                event = subscription.recv() => match event {
                    Some(event) => self.handle_event(event, &dispatch_tx, &mut dispatched),
                    None => {
                        info!(task_id = ?self.bound_task_id(), "event stream ended with outcome pending");
                        self.fail(TaskError::SubscriptionClosed);
                    }
                },
                Some(result) = dispatch_rx.recv() => self.handle_dispatch(result),
                _ = outcome_dropped(&mut self.outcome) => {
                    info!(task_id = ?self.bound_task_id(), "outcome dropped by caller; closing session");
                    self.outcome = None;
                }
            }
        }

        subscription.close();
        debug!(task_id = ?self.bound_task_id(), "session closed");
    }

    fn handle_event(
        &mut self,
        event: ChannelEvent,
        dispatch_tx: &mpsc::Sender<Result<Value>>,
        dispatched: &mut bool,
    ) {
        let config = self.config.clone();
        let names = &config.events;
        let ChannelEvent { name, payload } = event;
        let event = TaskEvent::from_payload(payload);
        debug!(event = %name, task_id = ?event.task_id, "task event");

        if name == names.activate {
            self.activate(event, dispatch_tx, dispatched);
        } else if name == names.progress {
            self.observer.on_progress(&event);
            match self.progress.try_send(event) {
                Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(task_id = ?self.bound_task_id(), "progress stream full; event dropped");
                }
            }
        } else if name == names.success {
            self.set_state(TaskState::Succeeded);
            self.observer.on_success(&event);
            self.settle(Ok(event));
        } else if name == names.error {
            self.fail(TaskError::Reported(event));
        } else if name == names.terminate {
            self.set_state(TaskState::Terminated);
            self.observer.on_terminate(&event);
            if config.termination_policy == TerminationPolicy::Reject {
                self.settle(Err(TaskError::Terminated(event)));
            }
        } else {
            debug!(event = %name, "ignoring unknown event");
        }
    }

    fn activate(
        &mut self,
        event: TaskEvent,
        dispatch_tx: &mpsc::Sender<Result<Value>>,
        dispatched: &mut bool,
    ) {
        let Some(task_id) = event.task_id else {
            warn!("activation event without task_id ignored");
            return;
        };

        if *dispatched {
            debug!(task_id = %task_id, "repeated activation ignored");
            return;
        }
        *dispatched = true;

        self.task_id.send_replace(Some(task_id.clone()));
        if *self.state.borrow() == TaskState::Pending {
            self.set_state(TaskState::Activated);
        }
        info!(task_id = %task_id, "task activated");

        let url = match self.config.dispatch_url() {
            Ok(url) => url,
            Err(err) => {
                self.fail(TaskError::Dispatch(err));
                return;
            }
        };
        let body = self.data.dispatch_body(&task_id);
        let headers = self.headers.clone();
        let command = self.command.clone();
        let dispatch_tx = dispatch_tx.clone();

        // Not aborted on settlement; the server may already be processing it.
        tokio::spawn(async move {
            let result = command.send(&url, &body, headers.as_ref()).await;
            let _ = dispatch_tx.send(result).await;
        });
    }

    fn handle_dispatch(&mut self, result: Result<Value>) {
        match result {
            Ok(response) => {
                debug!(task_id = ?self.bound_task_id(), response = %response, "dispatch accepted");
            }
            Err(err) => {
                warn!(task_id = ?self.bound_task_id(), error = %err, "dispatch failed");
                self.fail(TaskError::Dispatch(err));
            }
        }
    }

    fn fail(&mut self, error: TaskError) {
        self.set_state(TaskState::Failed);
        self.observer.on_error(&error);
        self.settle(Err(error));
    }

    fn settle(&mut self, result: TaskResult) {
        let Some(outcome) = self.outcome.take() else {
            return;
        };
        match &result {
            Ok(_) => info!(task_id = ?self.bound_task_id(), "task succeeded"),
            Err(err) => info!(task_id = ?self.bound_task_id(), error = %err, "task failed"),
        }
        // Receiver may be gone if the caller dropped the outcome.
        let _ = outcome.send(result);
    }

    fn set_state(&self, state: TaskState) {
        self.state.send_replace(state);
    }

    fn bound_task_id(&self) -> Option<TaskId> {
        self.task_id.borrow().clone()
    }
}

/// Resolves once nobody can receive the outcome anymore
async fn outcome_dropped(outcome: &mut Option<oneshot::Sender<TaskResult>>) {
    match outcome {
        Some(sender) => sender.closed().await,
        None => std::future::pending().await,
    }
}
