/*
[INPUT]:  Test scenarios needing scripted command/event channels
[OUTPUT]: Recording command channel, scriptable event channel, fixtures
[POS]:    Test infrastructure - shared across integration test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for tasker-client tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tasker_client::{
    ChannelEvent, CommandChannel, EventChannel, HeaderMap, Result, Subscription, TaskerConfig,
    TaskerError,
};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::MockServer;

pub const WAIT: Duration = Duration::from_secs(2);

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn test_config() -> TaskerConfig {
    TaskerConfig::from_base_url("http://tasks.test").expect("valid base url")
}

/// A command the session sent
#[derive(Debug, Clone)]
pub struct SentCommand {
    pub url: Url,
    pub payload: Value,
    pub headers: Option<HeaderMap>,
}

/// Command channel that records every call and answers from a per-path script
#[derive(Debug, Default)]
pub struct RecordingCommandChannel {
    sent: Mutex<Vec<SentCommand>>,
    failures: Mutex<HashMap<String, (i32, String)>>,
    notify: Notify,
}

impl RecordingCommandChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every command to `path` fail with an API error
    pub fn fail_path(&self, path: &str, code: i32, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(path.to_string(), (code, message.to_string()));
    }

    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, path: &str) -> Vec<SentCommand> {
        self.sent()
            .into_iter()
            .filter(|command| command.url.path() == path)
            .collect()
    }

    /// Wait until at least `count` commands were sent
    pub async fn wait_for(&self, count: usize) -> Vec<SentCommand> {
        tokio::time::timeout(WAIT, async {
            loop {
                let notified = self.notify.notified();
                let sent = self.sent();
                if sent.len() >= count {
                    return sent;
                }
                notified.await;
            }
        })
        .await
        .expect("commands were not sent in time")
    }
}

#[async_trait]
impl CommandChannel for RecordingCommandChannel {
    async fn send(
        &self,
        address: &Url,
        payload: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value> {
        self.sent.lock().unwrap().push(SentCommand {
            url: address.clone(),
            payload: payload.clone(),
            headers: headers.cloned(),
        });
        self.notify.notify_waiters();

        let failure = self.failures.lock().unwrap().get(address.path()).cloned();
        match failure {
            Some((code, message)) => Err(TaskerError::Api { code, message }),
            None => Ok(serde_json::json!({"ok": true})),
        }
    }
}

/// Handle a test uses to push events into an open subscription
#[derive(Debug, Clone)]
pub struct Emitter {
    sender: Arc<Mutex<Option<mpsc::Sender<ChannelEvent>>>>,
    shutdown: CancellationToken,
}

impl Emitter {
    fn sender(&self) -> Option<mpsc::Sender<ChannelEvent>> {
        self.sender.lock().unwrap().clone()
    }

    pub async fn emit(&self, name: &str, payload: Value) {
        self.sender()
            .expect("stream not hung up")
            .send(ChannelEvent::new(name, payload))
            .await
            .expect("subscription still open");
    }

    /// Emit, reporting whether the session still listens
    pub async fn try_emit(&self, name: &str, payload: Value) -> bool {
        match self.sender() {
            Some(sender) => sender.send(ChannelEvent::new(name, payload)).await.is_ok(),
            None => false,
        }
    }

    /// Whether the session closed its subscription
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Wait until the session closes its subscription
    pub async fn closed(&self) {
        tokio::time::timeout(WAIT, self.shutdown.cancelled())
            .await
            .expect("subscription was not closed in time");
    }

    /// End the event stream from the server side
    pub fn hang_up(&self) {
        self.sender.lock().unwrap().take();
    }
}

/// Event channel whose subscriptions are fed by the test
#[derive(Debug, Default)]
pub struct ScriptedEventChannel {
    subscriptions: Mutex<Vec<(Url, Vec<(String, String)>, Emitter)>>,
    refuse: Mutex<Option<String>>,
    notify: Notify,
}

impl ScriptedEventChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next subscriptions fail
    pub fn refuse(&self, message: &str) {
        *self.refuse.lock().unwrap() = Some(message.to_string());
    }

    /// Wait for the `index`-th subscription and return its address, query, and emitter
    pub async fn subscription(&self, index: usize) -> (Url, Vec<(String, String)>, Emitter) {
        tokio::time::timeout(WAIT, async {
            loop {
                let notified = self.notify.notified();
                if let Some(entry) = self.subscriptions.lock().unwrap().get(index).cloned() {
                    return entry;
                }
                notified.await;
            }
        })
        .await
        .expect("session did not subscribe in time")
    }

    pub async fn emitter(&self) -> Emitter {
        self.subscription(0).await.2
    }
}

#[async_trait]
impl EventChannel for ScriptedEventChannel {
    async fn subscribe(&self, address: &Url, query: &[(String, String)]) -> Result<Subscription> {
        if let Some(message) = self.refuse.lock().unwrap().clone() {
            return Err(TaskerError::ConnectRejected(message));
        }

        let (sender, receiver) = mpsc::channel(32);
        let shutdown = CancellationToken::new();
        self.subscriptions.lock().unwrap().push((
            address.clone(),
            query.to_vec(),
            Emitter {
                sender: Arc::new(Mutex::new(Some(sender))),
                shutdown: shutdown.clone(),
            },
        ));
        self.notify.notify_waiters();
        Ok(Subscription::new(receiver, shutdown))
    }
}
