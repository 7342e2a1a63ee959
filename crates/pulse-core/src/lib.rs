//! pulse-core — wire codec, typed payloads, and configuration.
//! All other Pulse crates depend on this one.

pub mod config;
pub mod envelope;
pub mod message;

pub use envelope::{Envelope, EnvelopeError, Kind};
pub use message::{AuthPayload, NodeInfo, PingPayload};
