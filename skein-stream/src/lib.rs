//! Stream event wire protocol: type + payload + envelope.
//!
//! This crate defines the wire shape of a single progress event and envelope
//! injection (spec §4.6 Event Stream). It has no dependency on the engine crate;
//! the engine bridges its internal event type into `ProtocolEvent` and calls `to_json`.

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::ProtocolEvent;
