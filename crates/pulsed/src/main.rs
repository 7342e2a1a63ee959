//! pulsed — telemetry relay daemon.
//!
//! Nodes connect on /api, authenticate with the shared secret, and push
//! telemetry; dashboard subscribers connect on / and receive every accepted
//! frame plus periodic node snapshots.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use pulse_core::config::PulseConfig;

const BANNER: &str = r"
______   __ __  .__          ______   ____
\____ \ |  |  \ |  |        /  ___/ _/ __ \
|  |_> >|  |  / |  |__      \___ \  \  ___/
|   __/ |____/  |____/     /____  >  \___  >
|__|                            \/       \/
";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("{BANNER}{:>44}", concat!("v", env!("CARGO_PKG_VERSION")));

    // Load config
    if let Err(e) = PulseConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = PulseConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        PulseConfig::default()
    });

    if config.auth.secret.is_empty() {
        anyhow::bail!(
            "refusing to start without a shared secret — set PULSE_AUTH__SECRET or [auth] secret in {}",
            PulseConfig::file_path().display()
        );
    }

    // tokio intervals reject a zero period.
    let snapshot_interval = Duration::from_secs(config.broadcast.snapshot_interval_secs.max(1));
    let (state, hub) = pulse_relay::build(config.auth.secret.clone(), snapshot_interval);
    let shutdown_tx = state.shutdown.clone();

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    let hub_task = tokio::spawn(hub.run());

    let listener = TcpListener::bind(&config.network.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.network.listen_addr))?;
    tracing::info!(
        addr = %config.network.listen_addr,
        ingest = pulse_relay::INGEST_PATH,
        subscribe = pulse_relay::SUBSCRIBE_PATH,
        interval_secs = config.broadcast.snapshot_interval_secs,
        "relay listening"
    );

    let serve_task = tokio::spawn(pulse_relay::serve(state, listener));

    // The hub returns once the shutdown signal lands; the server drains on
    // the same signal.
    tokio::select! {
        r = hub_task   => tracing::info!("hub exited: {:?}", r),
        r = serve_task => tracing::error!("server exited: {:?}", r),
    }

    Ok(())
}
