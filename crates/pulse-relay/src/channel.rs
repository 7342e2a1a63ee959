//! The distribution channel between node sessions and the broadcast hub.
//!
//! Two lanes: the conduit carries accepted raw frames, the node lane carries
//! snapshot registration events. All snapshot-map mutations travel as events
//! so the hub's loop is the map's only writer.

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;

/// Conduit capacity. One slot is the closest tokio offers to a rendezvous
/// channel: a second send suspends until the hub drains the first, so a busy
/// hub backpressures every forwarding session.
const CONDUIT_CAPACITY: usize = 1;

/// Snapshot lifecycle events consumed by the hub.
#[derive(Debug)]
pub enum NodeEvent {
    /// A node authenticated; `frame` is its raw `hello` frame.
    Joined { node_id: String, frame: Utf8Bytes },
    /// A node session ended; its snapshot must no longer be replayed.
    Left { node_id: String },
}

#[derive(Debug, thiserror::Error)]
#[error("distribution channel closed")]
pub struct ChannelClosed;

/// Write half, cloned into every node session.
#[derive(Clone)]
pub struct Channel {
    conduit: mpsc::Sender<Utf8Bytes>,
    nodes: mpsc::UnboundedSender<NodeEvent>,
}

impl Channel {
    /// Hand a raw frame to the hub. Suspends until the hub is ready to take
    /// it; fails only once the hub is gone.
    pub async fn forward(&self, frame: Utf8Bytes) -> Result<(), ChannelClosed> {
        self.conduit.send(frame).await.map_err(|_| ChannelClosed)
    }

    pub fn node_joined(&self, node_id: String, frame: Utf8Bytes) {
        let _ = self.nodes.send(NodeEvent::Joined { node_id, frame });
    }

    pub fn node_left(&self, node_id: String) {
        let _ = self.nodes.send(NodeEvent::Left { node_id });
    }
}

/// Receive half, owned by the hub.
pub struct ChannelReceiver {
    pub conduit: mpsc::Receiver<Utf8Bytes>,
    pub nodes: mpsc::UnboundedReceiver<NodeEvent>,
}

/// Create a connected channel pair.
pub fn channel() -> (Channel, ChannelReceiver) {
    let (conduit_tx, conduit_rx) = mpsc::channel(CONDUIT_CAPACITY);
    let (nodes_tx, nodes_rx) = mpsc::unbounded_channel();
    (
        Channel {
            conduit: conduit_tx,
            nodes: nodes_tx,
        },
        ChannelReceiver {
            conduit: conduit_rx,
            nodes: nodes_rx,
        },
    )
}
