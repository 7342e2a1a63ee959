//! pulse-relay — ingest sessions, distribution channel, and broadcast hub.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

pub mod channel;
pub mod endpoints;
pub mod hub;
pub mod session;

pub use endpoints::{serve, RelayState, INGEST_PATH, SUBSCRIBE_PATH};
pub use hub::Hub;

/// Wire up a complete relay: the shared state for the endpoints and the hub
/// that the caller must spawn. The shutdown sender lives in the returned
/// state; one signal reaches the hub and every node session.
pub fn build(secret: String, snapshot_interval: Duration) -> (RelayState, Hub) {
    let (channel, receiver) = channel::channel();
    let (register_tx, register_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, _) = broadcast::channel(1);
    let hub = Hub::new(
        receiver,
        register_rx,
        shutdown_tx.subscribe(),
        snapshot_interval,
    );
    let state = RelayState {
        secret,
        channel,
        register: register_tx,
        shutdown: shutdown_tx,
    };
    (state, hub)
}
