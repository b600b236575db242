//! Client configuration loaded from `config/client.toml`.

use riftfall_protocol::PlayerSide;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::fs;
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "config/client.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Game server address.
    pub server_addr: SocketAddr,
    /// Player identifier to connect as.
    pub player_id: u64,
    /// Which side of the board the local player occupies.
    pub side: String,
    /// Fixed reconnect interval while degraded.
    pub retry_interval_ms: u64,
    /// Scheduler tick interval.
    pub tick_interval_ms: u64,
    /// Root directory assets are fetched from.
    pub asset_root: String,
    /// Developer toggle: added latency per tick to exercise slow-network paths.
    pub simulated_latency_ms: u64,
    /// Developer toggle: never connect, run purely local.
    pub offline: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:4433".parse().expect("default address"),
            player_id: 1,
            side: "riftborn".to_string(),
            retry_interval_ms: 1000,
            tick_interval_ms: 16,
            asset_root: "assets".to_string(),
            simulated_latency_ms: 0,
            offline: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ClientConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    ClientConfig::default()
                }
            },
            Err(_) => ClientConfig::default(),
        }
    }

    /// Resolve the configured board side.
    pub fn player_side(&self) -> PlayerSide {
        match self.side.as_str() {
            "covenant" => PlayerSide::Covenant,
            "riftborn" => PlayerSide::Riftborn,
            other => {
                warn!("Unknown side {other:?}; defaulting to riftborn");
                PlayerSide::Riftborn
            }
        }
    }
}
