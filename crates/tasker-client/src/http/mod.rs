/*
[INPUT]:  HTTP configuration and command payloads
[OUTPUT]: Command channel contract, HTTP implementation, crate error type
[POS]:    HTTP layer - dispatch and terminate commands
[UPDATE]: When changing the command transport or error taxonomy
*/

pub mod client;
pub mod error;

pub use error::{Result, TaskerError};

pub use client::{CommandChannel, HttpCommandChannel};
