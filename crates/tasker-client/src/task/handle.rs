/*
[INPUT]:  Session channels (task id binding, state, outcome, progress)
[OUTPUT]: TaskHandle with terminate operation, outcome future, progress stream
[POS]:    Task layer - caller-facing handle of one task session
[UPDATE]: When changing what callers can observe or control
*/

use crate::config::TaskerConfig;
use crate::http::{CommandChannel, Result, TaskerError};
use crate::task::{TaskError, TaskObserver};
use crate::types::{TaskEvent, TaskId, TaskState, TerminateRequest};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

/// Settled value of a task: the success event or the rejection cause
pub type TaskResult = std::result::Result<TaskEvent, TaskError>;

/// Per-call options for `dispose` and `join`
#[derive(Default)]
pub struct TaskOptions {
    /// Forwarded verbatim on the dispatch command, never on terminate
    pub headers: Option<HeaderMap>,
    pub observer: Option<Arc<dyn TaskObserver>>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_observer(mut self, observer: impl TaskObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }
}

impl fmt::Debug for TaskOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskOptions")
            .field("headers", &self.headers)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Issues terminate commands for the task id currently bound to a session
#[derive(Clone)]
pub struct Terminator {
    config: Arc<TaskerConfig>,
    command: Arc<dyn CommandChannel>,
    task_id: watch::Receiver<Option<TaskId>>,
}

impl Terminator {
    pub(crate) fn new(
        config: Arc<TaskerConfig>,
        command: Arc<dyn CommandChannel>,
        task_id: watch::Receiver<Option<TaskId>>,
    ) -> Self {
        Self {
            config,
            command,
            task_id,
        }
    }

    /// Task id bound so far; `None` until activation for new tasks
    pub fn task_id(&self) -> Option<TaskId> {
        self.task_id.borrow().clone()
    }

    /// Ask the server to cancel the task.
    ///
    /// Fails with `TaskerError::NotActivated`, without contacting the server,
    /// while no task id is bound. Advisory: the outcome settles only through
    /// events the server emits afterwards.
    pub async fn terminate(&self) -> Result<Value> {
        let task_id = self.task_id().ok_or(TaskerError::NotActivated)?;
        send_terminate(self.command.as_ref(), &self.config, &task_id).await
    }
}

impl fmt::Debug for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminator")
            .field("task_id", &self.task_id())
            .finish()
    }
}

pub(crate) async fn send_terminate(
    command: &dyn CommandChannel,
    config: &TaskerConfig,
    task_id: &TaskId,
) -> Result<Value> {
    let url = config.terminate_url()?;
    let body = serde_json::to_value(TerminateRequest { task_id })?;
    info!(task_id = %task_id, url = %url, "terminate requested");
    command.send(&url, &body, None).await
}

/// One-shot future resolving with the task's success event or rejecting with its failure
#[derive(Debug)]
pub struct TaskOutcome {
    rx: oneshot::Receiver<TaskResult>,
}

impl TaskOutcome {
    pub(crate) fn new(rx: oneshot::Receiver<TaskResult>) -> Self {
        Self { rx }
    }

    /// Settled result without waiting; `None` while pending
    pub fn try_result(&mut self) -> Option<TaskResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TaskError::SubscriptionClosed)),
        }
    }
}

impl Future for TaskOutcome {
    type Output = TaskResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskError::SubscriptionClosed)))
    }
}

/// Handle of one task session
#[derive(Debug)]
pub struct TaskHandle {
    terminator: Terminator,
    outcome: TaskOutcome,
    state: watch::Receiver<TaskState>,
    progress: Option<mpsc::Receiver<TaskEvent>>,
}

impl TaskHandle {
    pub(crate) fn new(
        terminator: Terminator,
        outcome: TaskOutcome,
        state: watch::Receiver<TaskState>,
        progress: mpsc::Receiver<TaskEvent>,
    ) -> Self {
        Self {
            terminator,
            outcome,
            state,
            progress: Some(progress),
        }
    }

    /// See [`Terminator::terminate`]
    pub async fn terminate(&self) -> Result<Value> {
        self.terminator.terminate().await
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.terminator.task_id()
    }

    /// Current session state
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Wait until the session state satisfies `predicate`
    pub async fn wait_for_state(&mut self, predicate: impl FnMut(&TaskState) -> bool) -> TaskState {
        let reached = self.state.wait_for(predicate).await.map(|state| *state);
        reached.unwrap_or_else(|_| *self.state.borrow())
    }

    /// Take the progress stream; only the first call returns it
    pub fn take_progress(&mut self) -> Option<mpsc::Receiver<TaskEvent>> {
        self.progress.take()
    }

    /// Outcome future, borrowed so terminate stays usable
    pub fn outcome(&mut self) -> &mut TaskOutcome {
        &mut self.outcome
    }

    pub fn into_outcome(self) -> TaskOutcome {
        self.outcome
    }

    /// Split into a cloneable terminator and the outcome future
    pub fn split(self) -> (Terminator, TaskOutcome) {
        (self.terminator, self.outcome)
    }
}
