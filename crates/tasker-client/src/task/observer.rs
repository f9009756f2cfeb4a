/*
[INPUT]:  Caller callbacks for progress, success, error, termination
[OUTPUT]: TaskObserver implementations invoked by the session driver
[POS]:    Task layer - lifecycle notifications
[UPDATE]: When adding lifecycle notifications
*/

use crate::task::TaskError;
use crate::types::TaskEvent;
use std::fmt;

/// Receives lifecycle notifications for one task.
///
/// Every method defaults to a no-op; implement only what you need. Methods are
/// called from the session driver, one at a time, and should not block.
pub trait TaskObserver: Send + Sync {
    fn on_progress(&self, _event: &TaskEvent) {}

    /// Called before the outcome resolves
    fn on_success(&self, _event: &TaskEvent) {}

    /// Called before the outcome rejects, with the same error
    fn on_error(&self, _error: &TaskError) {}

    /// Termination notice; does not settle the outcome under the notify policy
    fn on_terminate(&self, _event: &TaskEvent) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TaskObserver for NoopObserver {}

type EventCallback = Box<dyn Fn(&TaskEvent) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&TaskError) + Send + Sync>;

/// Closure-based observer
#[derive(Default)]
pub struct Callbacks {
    progress: Option<EventCallback>,
    success: Option<EventCallback>,
    error: Option<ErrorCallback>,
    terminate: Option<EventCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, callback: impl Fn(&TaskEvent) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&TaskEvent) + Send + Sync + 'static) -> Self {
        self.success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&TaskError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(callback));
        self
    }

    pub fn on_terminate(mut self, callback: impl Fn(&TaskEvent) + Send + Sync + 'static) -> Self {
        self.terminate = Some(Box::new(callback));
        self
    }
}

impl TaskObserver for Callbacks {
    fn on_progress(&self, event: &TaskEvent) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }

    fn on_success(&self, event: &TaskEvent) {
        if let Some(callback) = &self.success {
            callback(event);
        }
    }

    fn on_error(&self, error: &TaskError) {
        if let Some(callback) = &self.error {
            callback(error);
        }
    }

    fn on_terminate(&self, event: &TaskEvent) {
        if let Some(callback) = &self.terminate {
            callback(event);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("progress", &self.progress.is_some())
            .field("success", &self.success.is_some())
            .field("error", &self.error.is_some())
            .field("terminate", &self.terminate.is_some())
            .finish()
    }
}
