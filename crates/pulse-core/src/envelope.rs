//! Wire envelope codec for the `{"emit":[kind, payload?]}` frame format.
//!
//! Every frame in both directions is a JSON object with a single `emit` key
//! holding a one- or two-element array: element 0 is the message kind,
//! element 1 (optional) the kind-specific payload. Decoding never mutates
//! the input bytes; sessions forward the raw frame downstream untouched.

use serde_json::{json, Value};

/// Message kinds recognized by the relay.
///
/// The five telemetry kinds are forwarded verbatim with no reply. Anything
/// else decodes to `Unknown` and is silently ignored by sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Hello,
    NodePing,
    Latency,
    Block,
    History,
    Pending,
    Stats,
    Unknown(String),
}

impl Kind {
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "hello" => Kind::Hello,
            "node-ping" => Kind::NodePing,
            "latency" => Kind::Latency,
            "block" => Kind::Block,
            "history" => Kind::History,
            "pending" => Kind::Pending,
            "stats" => Kind::Stats,
            other => Kind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Kind::Hello => "hello",
            Kind::NodePing => "node-ping",
            Kind::Latency => "latency",
            Kind::Block => "block",
            Kind::History => "history",
            Kind::Pending => "pending",
            Kind::Stats => "stats",
            Kind::Unknown(other) => other,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("frame has no array-valued `emit` key")]
    MissingEmit,
    #[error("`emit` array is empty")]
    EmptyEmit,
    #[error("message kind is not a string")]
    KindNotString,
}

/// A decoded frame: the message kind plus the payload re-serialized to
/// canonical JSON bytes.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub kind: Kind,
    pub value: Option<Vec<u8>>,
}

impl Envelope {
    /// Decode a raw frame. Pure function of the input bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let root: Value = serde_json::from_slice(bytes)?;
        let emit = root
            .get("emit")
            .and_then(Value::as_array)
            .ok_or(EnvelopeError::MissingEmit)?;
        let kind = emit
            .first()
            .ok_or(EnvelopeError::EmptyEmit)?
            .as_str()
            .ok_or(EnvelopeError::KindNotString)?;
        let value = match emit.get(1) {
            Some(v) => Some(serde_json::to_vec(v)?),
            None => None,
        };
        Ok(Self {
            kind: Kind::from_wire(kind),
            value,
        })
    }

    /// Encode an outbound frame.
    pub fn encode(kind: &str, value: Option<&Value>) -> String {
        let frame = match value {
            Some(v) => json!({ "emit": [kind, v] }),
            None => json!({ "emit": [kind] }),
        };
        serde_json::to_string(&frame).expect("frame serialization failed")
    }
}

/// Reply sent to a node after a successful `hello`.
pub fn ready_frame() -> String {
    Envelope::encode("ready", None)
}

/// Reply sent to a node for each `node-ping`, keyed by its id.
pub fn pong_frame(node_id: &str) -> String {
    Envelope::encode("node-pong", Some(&Value::from(node_id)))
}
