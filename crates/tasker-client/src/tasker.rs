/*
[INPUT]:  TaskerConfig, command/event channel implementations, caller task data
[OUTPUT]: TaskHandle per dispose/join call, each driven by its own session
[POS]:    Client entry point - session factory
[UPDATE]: When adding entry points or changing how sessions are spawned
*/

use crate::config::TaskerConfig;
use crate::http::{CommandChannel, HttpCommandChannel, Result, TaskerError};
use crate::task::handle::send_terminate;
use crate::task::session::TaskSession;
use crate::task::{NoopObserver, TaskHandle, TaskObserver, TaskOptions, TaskOutcome, Terminator};
use crate::types::{TaskData, TaskId, TaskState};
use crate::ws::{EventChannel, SocketEventChannel};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

const PROGRESS_BUFFER: usize = 100;

/// Client for one task server
#[derive(Clone)]
pub struct Tasker {
    config: Arc<TaskerConfig>,
    command: Arc<dyn CommandChannel>,
    events: Arc<dyn EventChannel>,
}

impl Tasker {
    /// Create a client using HTTP for commands and socket.io for events
    pub fn new(config: TaskerConfig) -> Result<Self> {
        let config = config.validated()?;
        let command = HttpCommandChannel::with_config(&config.http)?;
        let events =
            SocketEventChannel::new(config.socket_path.clone()).with_reconnect(config.reconnect.clone());
        Ok(Self {
            config: Arc::new(config),
            command: Arc::new(command),
            events: Arc::new(events),
        })
    }

    /// Create a client over caller-provided channels
    pub fn with_channels(
        config: TaskerConfig,
        command: Arc<dyn CommandChannel>,
        events: Arc<dyn EventChannel>,
    ) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config.validated()?),
            command,
            events,
        })
    }

    pub fn config(&self) -> &TaskerConfig {
        &self.config
    }

    /// Start a new task.
    ///
    /// `data` must serialize to a JSON object; it is sent, together with the
    /// server-assigned task id, once the activation event arrives. Terminate
    /// fails locally until then. Fails with `TaskerError::Config` outside a
    /// Tokio runtime.
    pub fn dispose<T: Serialize + ?Sized>(&self, data: &T, options: TaskOptions) -> Result<TaskHandle> {
        let data = TaskData::from_serialize(data)?;
        self.open(None, data, options)
    }

    /// Attach to a task that is already running.
    ///
    /// Terminate is usable immediately. No task data is sent again. Fails
    /// with `TaskerError::Config` outside a Tokio runtime.
    pub fn join(&self, task_id: impl Into<TaskId>, options: TaskOptions) -> Result<TaskHandle> {
        self.open(Some(task_id.into()), TaskData::empty(), options)
    }

    /// Send a terminate command for a known task id without opening a session
    pub async fn terminate(&self, task_id: &TaskId) -> Result<Value> {
        send_terminate(self.command.as_ref(), &self.config, task_id).await
    }

    fn open(
        &self,
        task_id: Option<TaskId>,
        data: TaskData,
        options: TaskOptions,
    ) -> Result<TaskHandle> {
        let runtime = Handle::try_current()
            .map_err(|err| TaskerError::Config(format!("task sessions need a Tokio runtime: {err}")))?;

        let (task_id_tx, task_id_rx) = watch::channel(task_id);
        let (state_tx, state_rx) = watch::channel(TaskState::Pending);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_BUFFER);

        let session = TaskSession {
            config: self.config.clone(),
            command: self.command.clone(),
            events: self.events.clone(),
            data,
            headers: options.headers,
            observer: options
                .observer
                .unwrap_or_else(|| Arc::new(NoopObserver) as Arc<dyn TaskObserver>),
            task_id: task_id_tx,
            state: state_tx,
            outcome: Some(outcome_tx),
            progress: progress_tx,
        };
        debug!(task_id = ?task_id_rx.borrow().as_ref(), "opening task session");
        runtime.spawn(session.run());

        let terminator = Terminator::new(self.config.clone(), self.command.clone(), task_id_rx);
        Ok(TaskHandle::new(
            terminator,
            TaskOutcome::new(outcome_rx),
            state_rx,
            progress_rx,
        ))
    }
}

impl fmt::Debug for Tasker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tasker")
            .field("base_url", &self.config.base_url.as_str())
            .finish()
    }
}
