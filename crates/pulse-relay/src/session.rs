//! Per-node ingest session.
//!
//! One task per node connection: authenticates the `hello`, answers
//! keep-alive pings, classifies telemetry, and forwards accepted raw frames
//! onto the distribution channel. The session holds no state beyond the
//! socket and its authentication status.

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use tokio::sync::broadcast;

use pulse_core::envelope::{pong_frame, ready_frame, Envelope, Kind};
use pulse_core::message::{AuthPayload, PingPayload};

use crate::channel::Channel;

/// Authentication state of one node connection.
enum SessionState {
    Connected,
    Authenticated { node_id: String },
}

pub struct NodeSession {
    socket: WebSocket,
    secret: String,
    channel: Channel,
    shutdown: broadcast::Receiver<()>,
    state: SessionState,
}

impl NodeSession {
    pub fn new(
        socket: WebSocket,
        secret: String,
        channel: Channel,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            socket,
            secret,
            channel,
            shutdown,
            state: SessionState::Connected,
        }
    }

    /// Loop until the node disconnects, violates the protocol, or the
    /// process shuts down. One blocking read per iteration.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::debug!("node session closing on shutdown");
                    break;
                }

                msg = self.socket.recv() => {
                    let frame = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Binary(raw))) => match String::from_utf8(raw.to_vec()) {
                            Ok(text) => Utf8Bytes::from(text),
                            Err(_) => {
                                tracing::warn!("non-UTF-8 frame from node, closing session");
                                break;
                            }
                        },
                        // Transport-level control frames; the upgrade layer
                        // answers pings itself.
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::debug!("node disconnected");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "node read failed");
                            break;
                        }
                    };
                    if !self.handle_frame(frame).await {
                        break;
                    }
                }
            }
        }
        self.finish();
    }

    /// Deregister the node's snapshot so it is no longer replayed.
    fn finish(self) {
        if let SessionState::Authenticated { node_id } = self.state {
            tracing::info!(node_id = %node_id, "node session ended");
            self.channel.node_left(node_id);
        }
    }

    /// Handle one inbound frame. Returns false when the session must close.
    async fn handle_frame(&mut self, frame: Utf8Bytes) -> bool {
        let envelope = match Envelope::decode(frame.as_bytes()) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "malformed frame, closing session");
                return false;
            }
        };
        match envelope.kind {
            Kind::Hello => self.handle_hello(&envelope, frame).await,
            Kind::NodePing => self.handle_ping(&envelope, frame).await,
            Kind::Latency | Kind::Block | Kind::History | Kind::Pending | Kind::Stats => {
                self.forward_frame(frame).await
            }
            Kind::Unknown(kind) => {
                tracing::debug!(kind, "ignoring unrecognized message kind");
                true
            }
        }
    }

    /// The single access-control checkpoint. A rejected node gets no
    /// response, only a closed connection.
    async fn handle_hello(&mut self, envelope: &Envelope, frame: Utf8Bytes) -> bool {
        let Some(value) = envelope.value.as_deref() else {
            tracing::warn!("hello without payload, closing session");
            return false;
        };
        let auth: AuthPayload = match serde_json::from_slice(value) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable hello payload, closing session");
                return false;
            }
        };
        if auth.secret != self.secret {
            tracing::warn!(node_id = %auth.id, "rejecting node with invalid secret");
            return false;
        }
        if let Err(e) = self.socket.send(Message::Text(ready_frame().into())).await {
            tracing::warn!(node_id = %auth.id, error = %e, "failed to send ready reply, closing session");
            return false;
        }
        if self.channel.forward(frame.clone()).await.is_err() {
            tracing::warn!("distribution channel closed, closing session");
            return false;
        }
        // A repeated hello under a new id must not leave the old snapshot
        // behind.
        if let SessionState::Authenticated { node_id } = &self.state {
            if *node_id != auth.id {
                self.channel.node_left(node_id.clone());
            }
        }
        self.channel.node_joined(auth.id.clone(), frame);
        tracing::info!(node_id = %auth.id, client = %auth.info.client, "node authenticated");
        self.state = SessionState::Authenticated { node_id: auth.id };
        true
    }

    async fn handle_ping(&mut self, envelope: &Envelope, frame: Utf8Bytes) -> bool {
        let Some(value) = envelope.value.as_deref() else {
            tracing::warn!("node-ping without payload, closing session");
            return false;
        };
        let ping: PingPayload = match serde_json::from_slice(value) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable node-ping payload, closing session");
                return false;
            }
        };
        // Unlike hello, a failed pong write leaves the session open; the
        // frame is only forwarded once the reply went out.
        if let Err(e) = self.socket.send(Message::Text(pong_frame(&ping.id).into())).await {
            tracing::warn!(node_id = %ping.id, error = %e, "failed to send pong reply");
            return true;
        }
        self.forward_frame(frame).await
    }

    /// Forward a raw frame to the hub. Frames from a session that has not
    /// completed its hello never cross the conduit.
    async fn forward_frame(&mut self, frame: Utf8Bytes) -> bool {
        match self.state {
            SessionState::Authenticated { .. } => {
                if self.channel.forward(frame).await.is_err() {
                    tracing::warn!("distribution channel closed, closing session");
                    return false;
                }
                true
            }
            SessionState::Connected => {
                tracing::debug!("dropping frame from unauthenticated node");
                true
            }
        }
    }
}
