//! WebSocket endpoints — node ingest and dashboard subscribe.
//!
//! Two routes, each upgraded to a persistent connection: nodes on
//! [`INGEST_PATH`] get a dedicated session task, subscribers on
//! [`SUBSCRIBE_PATH`] are handed to the hub. Any other path is rejected by
//! the router before the upgrade.

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use crate::channel::Channel;
use crate::session::NodeSession;

/// Path nodes connect to.
pub const INGEST_PATH: &str = "/api";
/// Path dashboard subscribers connect to.
pub const SUBSCRIBE_PATH: &str = "/";

#[derive(Clone)]
pub struct RelayState {
    pub secret: String,
    pub channel: Channel,
    pub register: mpsc::UnboundedSender<WebSocket>,
    pub shutdown: broadcast::Sender<()>,
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route(SUBSCRIBE_PATH, get(handle_subscribe))
        .route(INGEST_PATH, get(handle_ingest))
        .with_state(state)
}

async fn handle_ingest(State(state): State<RelayState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| {
        tracing::info!("node connected");
        NodeSession::new(socket, state.secret, state.channel, state.shutdown.subscribe()).run()
    })
}

async fn handle_subscribe(State(state): State<RelayState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        tracing::info!("subscriber connected");
        if state.register.send(socket).is_err() {
            tracing::warn!("hub is gone, dropping subscriber connection");
        }
    })
}

/// Serve the relay on an already-bound listener until the shutdown signal.
pub async fn serve(state: RelayState, listener: TcpListener) -> anyhow::Result<()> {
    let mut shutdown = state.shutdown.subscribe();
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
