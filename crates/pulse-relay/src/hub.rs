//! Broadcast hub — the single loop that owns the subscriber set and the
//! node snapshot map.
//!
//! Nothing outside this loop ever touches either map: frames, subscriber
//! registrations, and snapshot events all arrive over channels, so no lock
//! exists anywhere in the relay.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use tokio::sync::{broadcast, mpsc};

use crate::channel::{ChannelReceiver, NodeEvent};

pub struct Hub {
    channel: ChannelReceiver,
    register: mpsc::UnboundedReceiver<WebSocket>,
    shutdown: broadcast::Receiver<()>,
    snapshot_interval: Duration,
    /// Subscriber connections by registration id.
    subscribers: HashMap<u64, WebSocket>,
    next_subscriber: u64,
    /// Latest raw `hello` frame per connected node.
    snapshots: HashMap<String, Utf8Bytes>,
}

impl Hub {
    pub fn new(
        channel: ChannelReceiver,
        register: mpsc::UnboundedReceiver<WebSocket>,
        shutdown: broadcast::Receiver<()>,
        snapshot_interval: Duration,
    ) -> Self {
        Self {
            channel,
            register,
            shutdown,
            snapshot_interval,
            subscribers: HashMap::new(),
            next_subscriber: 0,
            snapshots: HashMap::new(),
        }
    }

    /// Loop until shutdown. Each iteration reacts to exactly one event; no
    /// priority between simultaneously-ready branches.
    pub async fn run(mut self) {
        let mut replay = tokio::time::interval(self.snapshot_interval);
        // The first tick completes immediately; swallow it so replays start
        // a full period after startup.
        replay.tick().await;

        loop {
            tokio::select! {
                Some(frame) = self.channel.conduit.recv() => {
                    // No buffering: frames without an audience are dropped.
                    if !self.subscribers.is_empty() {
                        self.broadcast_frame(&frame).await;
                    }
                }

                Some(event) = self.channel.nodes.recv() => self.apply_node_event(event),

                Some(socket) = self.register.recv() => {
                    let id = self.next_subscriber;
                    self.next_subscriber += 1;
                    self.subscribers.insert(id, socket);
                    tracing::info!(subscriber = id, total = self.subscribers.len(), "subscriber registered");
                }

                _ = replay.tick() => self.replay_snapshots().await,

                _ = self.shutdown.recv() => {
                    self.quit().await;
                    return;
                }
            }
        }
    }

    fn apply_node_event(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::Joined { node_id, frame } => {
                tracing::debug!(node_id = %node_id, "snapshot registered");
                self.snapshots.insert(node_id, frame);
            }
            NodeEvent::Left { node_id } => {
                tracing::debug!(node_id = %node_id, "snapshot removed");
                self.snapshots.remove(&node_id);
            }
        }
    }

    /// Write every stored snapshot to every subscriber so late joiners learn
    /// about already-connected nodes. Iteration order is unspecified.
    async fn replay_snapshots(&mut self) {
        if self.snapshots.is_empty() || self.subscribers.is_empty() {
            return;
        }
        let frames: Vec<Utf8Bytes> = self.snapshots.values().cloned().collect();
        for frame in frames {
            self.broadcast_frame(&frame).await;
        }
    }

    /// Write one frame to every subscriber. A failed write closes and
    /// removes that one subscriber; the rest still receive the frame.
    async fn broadcast_frame(&mut self, frame: &Utf8Bytes) {
        let mut dropped = Vec::new();
        for (&id, socket) in self.subscribers.iter_mut() {
            if let Err(e) = socket.send(Message::Text(frame.clone())).await {
                tracing::info!(subscriber = id, error = %e, "dropping subscriber after failed write");
                dropped.push(id);
            }
        }
        for id in dropped {
            if let Some(mut socket) = self.subscribers.remove(&id) {
                let _ = socket.send(Message::Close(None)).await;
            }
        }
    }

    /// Terminal state: close every subscriber connection and stop.
    async fn quit(&mut self) {
        tracing::info!(subscribers = self.subscribers.len(), "hub shutting down, closing subscribers");
        for (_, mut socket) in self.subscribers.drain() {
            let _ = socket.send(Message::Close(None)).await;
        }
    }
}
