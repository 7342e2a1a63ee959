//! Pulse integration test harness.
//!
//! Each test spins up a complete relay in-process on an ephemeral port and
//! talks to it over real WebSocket connections — nodes on /api, subscribers
//! on /. Every test owns its relay instance, so tests never interfere with
//! each other.

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

// Shared with the scenario modules, which pull in the harness via
// `use crate::*`.
pub use anyhow::{Context, Result};
pub use futures::{SinkExt, StreamExt};
pub use std::time::Duration;
pub use tokio_tungstenite::tungstenite::Message;

mod broadcasting;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const SECRET: &str = "relay-test-secret";

/// Longest we wait for an expected frame.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct Relay {
    pub addr: SocketAddr,
    pub shutdown: tokio::sync::broadcast::Sender<()>,
}

/// Start a full relay (hub + endpoints) on an ephemeral port.
pub async fn start_relay(secret: &str, snapshot_interval: Duration) -> Result<Relay> {
    let (state, hub) = pulse_relay::build(secret.to_string(), snapshot_interval);
    let shutdown = state.shutdown.clone();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind ephemeral port")?;
    let addr = listener.local_addr()?;
    tokio::spawn(hub.run());
    tokio::spawn(pulse_relay::serve(state, listener));
    Ok(Relay { addr, shutdown })
}

/// Start a relay whose snapshot replay is far enough away not to interfere.
pub async fn start() -> Result<Relay> {
    start_relay(SECRET, Duration::from_secs(60)).await
}

/// Give in-flight registrations and forwards a chance to land in the hub.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

pub async fn connect_node(relay: &Relay) -> Result<WsClient> {
    let (ws, _) = connect_async(format!("ws://{}/api", relay.addr))
        .await
        .context("node connect failed")?;
    Ok(ws)
}

/// Connect a subscriber and wait for its registration to reach the hub.
pub async fn connect_subscriber(relay: &Relay) -> Result<WsClient> {
    let (ws, _) = connect_async(format!("ws://{}/", relay.addr))
        .await
        .context("subscriber connect failed")?;
    settle().await;
    Ok(ws)
}

/// Connect a node and complete the hello handshake.
pub async fn connect_authed_node(relay: &Relay, node_id: &str) -> Result<WsClient> {
    let mut node = connect_node(relay).await?;
    node.send(Message::Text(hello_frame(node_id, SECRET))).await?;
    let reply = recv_text(&mut node).await?;
    assert_eq!(reply, pulse_core::envelope::ready_frame());
    Ok(node)
}

pub fn hello_frame(node_id: &str, secret: &str) -> String {
    serde_json::json!({
        "emit": ["hello", {
            "id": node_id,
            "secret": secret,
            "info": {
                "name": node_id,
                "node": "geth/v1.10.3",
                "port": 30303,
                "net": "1",
                "protocol": "eth/66",
                "api": "No",
                "os": "linux",
                "os_v": "6.1.0",
                "client": "0.1.1",
                "canUpdateHistory": true,
            },
        }],
    })
    .to_string()
}

pub fn ping_frame(node_id: &str) -> String {
    serde_json::json!({
        "emit": ["node-ping", {"id": node_id, "clientTime": "2024-05-01T00:00:00Z"}],
    })
    .to_string()
}

pub fn stats_frame(node_id: &str, peers: u32) -> String {
    serde_json::json!({
        "emit": ["stats", {"id": node_id, "stats": {"active": true, "peers": peers}}],
    })
    .to_string()
}

/// Read the next text frame, failing after [`RECV_TIMEOUT`].
pub async fn recv_text(ws: &mut WsClient) -> Result<String> {
    let msg = timeout(RECV_TIMEOUT, ws.next())
        .await
        .context("timed out waiting for a frame")?
        .context("connection closed while waiting for a frame")?
        .context("read failed")?;
    match msg {
        Message::Text(text) => Ok(text),
        other => anyhow::bail!("expected a text frame, got {other:?}"),
    }
}

/// Assert that nothing arrives on this connection within `window`.
pub async fn assert_silent(ws: &mut WsClient, window: Duration) {
    match timeout(window, ws.next()).await {
        Err(_) => {}
        Ok(None) => panic!("connection closed while expecting silence"),
        Ok(Some(msg)) => panic!("unexpected frame while expecting silence: {msg:?}"),
    }
}

/// Assert the server closes this connection without sending any text frame.
pub async fn expect_closed(ws: &mut WsClient) -> Result<()> {
    match timeout(RECV_TIMEOUT, ws.next())
        .await
        .context("timed out waiting for the connection to close")?
    {
        None | Some(Ok(Message::Close(_))) | Some(Err(_)) => Ok(()),
        Some(Ok(other)) => anyhow::bail!("expected close, got {other:?}"),
    }
}
