/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public tasker client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

//! Client for remote task servers.
//!
//! A task is submitted over HTTP and observed over a socket.io status
//! namespace. [`Tasker::dispose`] starts a new task and [`Tasker::join`]
//! attaches to a running one; both return a [`TaskHandle`] carrying a
//! terminate operation and a one-shot outcome future.

pub mod config;
pub mod http;
pub mod task;
pub mod tasker;
pub mod types;
pub mod ws;

pub use config::{EventNames, HttpConfig, ReconnectConfig, TaskerConfig, TerminationPolicy};

// Re-export commonly used types from http
pub use http::{CommandChannel, HttpCommandChannel, Result, TaskerError};
pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

pub use task::{
    Callbacks,
    NoopObserver,
    TaskError,
    TaskHandle,
    TaskObserver,
    TaskOptions,
    TaskOutcome,
    TaskResult,
    Terminator,
};

pub use tasker::Tasker;

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{EventChannel, SocketEventChannel, Subscription};
