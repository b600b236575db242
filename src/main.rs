//! riftfall - headless card game client
//!
//! Wires the sync engine to log-only collaborators and drives it with a
//! fixed-rate scheduler tick until interrupted.

mod config;
mod headless;

use anyhow::Result;
use config::ClientConfig;
use riftfall_assets::{AssetCache, DirectoryFetcher};
use riftfall_client::{ConnectionManager, GameClient};
use riftfall_net::{ClientEndpoint, TlsMode};
use riftfall_protocol::{ClientMetadata, PlayerIdentifier};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with INFO level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting riftfall v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::load();
    let endpoint = ClientEndpoint::new(TlsMode::from_env())?;
    let connection = ConnectionManager::new(
        endpoint,
        config.server_addr,
        PlayerIdentifier(config.player_id),
        ClientMetadata {
            build: env!("CARGO_PKG_VERSION").to_string(),
            device: std::env::consts::OS.to_string(),
        },
        Duration::from_millis(config.retry_interval_ms),
    );
    let assets = AssetCache::new(Box::new(DirectoryFetcher::new(&config.asset_root)));

    let mut client = GameClient::new(
        connection,
        headless::collaborators(),
        assets,
        config.player_side(),
    );

    if config.offline {
        info!("Offline mode: skipping connect");
    } else if let Err(err) = client.connect().await {
        warn!("Initial connect failed: {err:#}; retrying on timer");
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(config.tick_interval_ms));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if config.simulated_latency_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(config.simulated_latency_ms)).await;
                }
                if let Err(err) = client.tick(Instant::now()).await {
                    error!("Tick failed: {err}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break;
            }
        }
    }

    client.shutdown("client exiting");
    Ok(())
}
