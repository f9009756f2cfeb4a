/*
[INPUT]:  Task server events and commands for one task
[OUTPUT]: Task sessions, their handles, observers, and outcome errors
[POS]:    Task layer - lifecycle coordination
[UPDATE]: When changing session semantics or the caller-facing handle
*/

pub mod error;
pub mod handle;
pub mod observer;
pub(crate) mod session;

pub use error::TaskError;
pub use handle::{TaskHandle, TaskOptions, TaskOutcome, TaskResult, Terminator};
pub use observer::{Callbacks, NoopObserver, TaskObserver};
