//! Counting asset fetcher with scripted failures.

use async_trait::async_trait;
use riftfall_assets::{AssetData, AssetError, AssetFetcher};
use riftfall_protocol::AssetAddress;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Fetcher double: serves each address's own string as its bytes, counts
/// every fetch, and fails the addresses it was told to fail.
#[derive(Default)]
pub struct ScriptedFetcher {
    counts: Arc<Mutex<HashMap<AssetAddress, u32>>>,
    failing: HashSet<AssetAddress>,
}

impl ScriptedFetcher {
    /// Create a fetcher that succeeds for every address.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher that fails the given addresses.
    pub fn failing<I>(addresses: I) -> Self
    where
        I: IntoIterator<Item = AssetAddress>,
    {
        Self {
            counts: Arc::new(Mutex::new(HashMap::new())),
            failing: addresses.into_iter().collect(),
        }
    }

    /// Shared handle to the per-address fetch counts.
    pub fn counts(&self) -> Arc<Mutex<HashMap<AssetAddress, u32>>> {
        Arc::clone(&self.counts)
    }
}

#[async_trait]
impl AssetFetcher for ScriptedFetcher {
    async fn fetch(&self, address: &AssetAddress) -> Result<AssetData, AssetError> {
        *self
            .counts
            .lock()
            .expect("fetch counts")
            .entry(address.clone())
            .or_insert(0) += 1;

        if self.failing.contains(address) {
            return Err(AssetError::Missing(address.clone()));
        }
        Ok(AssetData {
            bytes: address.0.as_bytes().to_vec(),
        })
    }
}
