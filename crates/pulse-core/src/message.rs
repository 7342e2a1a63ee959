//! Typed payloads carried inside envelope frames.
//!
//! Field names follow the wire exactly; renames map them onto Rust naming.

use serde::{Deserialize, Serialize};

/// Descriptive snapshot of a node, replaced wholesale on each new `hello`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub node: String,
    pub port: u16,
    #[serde(rename = "net")]
    pub network: String,
    pub protocol: String,
    pub api: String,
    pub os: String,
    #[serde(rename = "os_v")]
    pub os_version: String,
    pub client: String,
    #[serde(rename = "canUpdateHistory")]
    pub history: bool,
}

/// Payload of a `hello` frame — the single authentication checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub id: String,
    pub secret: String,
    pub info: NodeInfo,
}

/// Payload of a `node-ping` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingPayload {
    pub id: String,
    #[serde(rename = "clientTime")]
    pub client_time: String,
}
