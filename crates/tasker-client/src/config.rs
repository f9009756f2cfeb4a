/*
[INPUT]:  Task server base URL, endpoint paths, event names, transport tuning
[OUTPUT]: Immutable TaskerConfig shared by every task session
[POS]:    Configuration layer - endpoint and event naming
[UPDATE]: When adding configuration options or changing defaults
*/

use crate::http::{Result, TaskerError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const DEFAULT_DISPOSE_PATH: &str = "/dispose";
const DEFAULT_TERMINATE_PATH: &str = "/terminate";
const DEFAULT_NAMESPACE: &str = "/status";
const DEFAULT_SOCKET_PATH: &str = "/socket.io";

/// What a server termination notice does to the pending outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPolicy {
    /// Notify the termination observer only; the outcome stays pending.
    #[default]
    Notify,
    /// Notify the observer and reject the outcome with `TaskError::Terminated`.
    Reject,
}

/// Names of the lifecycle events emitted on the status namespace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventNames {
    pub activate: String,
    pub progress: String,
    pub success: String,
    pub error: String,
    pub terminate: String,
}

impl Default for EventNames {
    fn default() -> Self {
        Self {
            activate: "activate".to_string(),
            progress: "progress".to_string(),
            success: "success".to_string(),
            error: "error".to_string(),
            terminate: "terminate".to_string(),
        }
    }
}

impl EventNames {
    fn normalize(self) -> Self {
        let defaults = Self::default();
        Self {
            activate: or_default(self.activate, &defaults.activate),
            progress: or_default(self.progress, &defaults.progress),
            success: or_default(self.success, &defaults.success),
            error: or_default(self.error, &defaults.error),
            terminate: or_default(self.terminate, &defaults.terminate),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Reconnection of the event channel after the transport drops
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Attempts per outage; zero disables reconnection
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
        }
    }
}

impl ReconnectConfig {
    /// Disable reconnection; the first transport loss ends the stream
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before the given attempt (zero-based), doubling up to the cap
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Client configuration for one task server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaskerConfig {
    /// Root address of the task server
    pub base_url: Url,
    /// Path that accepts task data
    #[serde(default = "default_dispose_path")]
    pub dispose_path: String,
    /// Path that accepts cancellation requests
    #[serde(default = "default_terminate_path")]
    pub terminate_path: String,
    /// Event namespace carrying task status
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Engine path of the event server
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    #[serde(default)]
    pub events: EventNames,
    #[serde(default)]
    pub termination_policy: TerminationPolicy,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl TaskerConfig {
    /// Create a configuration with default paths and event names
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            dispose_path: default_dispose_path(),
            terminate_path: default_terminate_path(),
            namespace: default_namespace(),
            socket_path: default_socket_path(),
            events: EventNames::default(),
            termination_policy: TerminationPolicy::default(),
            http: HttpConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Parse the base URL and apply defaults
    pub fn from_base_url(base_url: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    pub fn with_dispose_path(mut self, path: impl Into<String>) -> Self {
        self.dispose_path = or_default(path.into(), DEFAULT_DISPOSE_PATH);
        self
    }

    pub fn with_terminate_path(mut self, path: impl Into<String>) -> Self {
        self.terminate_path = or_default(path.into(), DEFAULT_TERMINATE_PATH);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = or_default(namespace.into(), DEFAULT_NAMESPACE);
        self
    }

    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = or_default(path.into(), DEFAULT_SOCKET_PATH);
        self
    }

    pub fn with_events(mut self, events: EventNames) -> Self {
        self.events = events.normalize();
        self
    }

    pub fn with_termination_policy(mut self, policy: TerminationPolicy) -> Self {
        self.termination_policy = policy;
        self
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Replace empty overrides with defaults and reject unusable base URLs.
    ///
    /// Deserialized configs may carry empty strings; builders never do.
    pub fn validated(self) -> Result<Self> {
        if self.base_url.cannot_be_a_base() {
            return Err(TaskerError::Config(format!(
                "base url {} cannot carry paths",
                self.base_url
            )));
        }
        match self.base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TaskerError::Config(format!(
                    "unsupported base url scheme: {other}"
                )));
            }
        }

        Ok(Self {
            dispose_path: or_default(self.dispose_path, DEFAULT_DISPOSE_PATH),
            terminate_path: or_default(self.terminate_path, DEFAULT_TERMINATE_PATH),
            namespace: or_default(self.namespace, DEFAULT_NAMESPACE),
            socket_path: or_default(self.socket_path, DEFAULT_SOCKET_PATH),
            events: self.events.normalize(),
            ..self
        })
    }

    /// Full address of the dispatch endpoint
    pub fn dispatch_url(&self) -> Result<Url> {
        self.endpoint(&self.dispose_path)
    }

    /// Full address of the terminate endpoint
    pub fn terminate_url(&self) -> Result<Url> {
        self.endpoint(&self.terminate_path)
    }

    /// Full address of the status namespace
    pub fn namespace_url(&self) -> Result<Url> {
        self.endpoint(&self.namespace)
    }

    // Concatenation instead of Url::join so a base path prefix survives.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let url = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Ok(Url::parse(&url)?)
    }
}

fn or_default(value: String, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value
    }
}

fn default_dispose_path() -> String {
    DEFAULT_DISPOSE_PATH.to_string()
}

fn default_terminate_path() -> String {
    DEFAULT_TERMINATE_PATH.to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}
