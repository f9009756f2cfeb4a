/*
[INPUT]:  Task server payload shapes and serde requirements
[OUTPUT]: Typed task identifiers, events, and command payloads
[POS]:    Data layer - type definitions for task server communication
[UPDATE]: When payload shapes change or new types are added
*/

pub mod models;
pub mod requests;

pub use models::*;
pub use requests::*;
