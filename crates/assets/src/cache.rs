//! The asset cache backing the interpreter's prefetch barrier.

use crate::{AssetData, AssetError, AssetFetcher};
use riftfall_protocol::AssetAddress;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Cache of loaded assets keyed by address.
///
/// Addresses already in the cache are never fetched again; failed loads are
/// recorded and reported without failing the barrier, so a missing asset
/// degrades rendering instead of stalling the client.
pub struct AssetCache {
    fetcher: Box<dyn AssetFetcher>,
    loaded: HashMap<AssetAddress, AssetData>,
    metrics: CacheMetrics,
}

/// Counters tracking cache effectiveness.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    /// Fetches actually issued to the backend.
    pub fetches: u64,
    /// Requests satisfied by the cache.
    pub hits: u64,
    /// Fetches that failed.
    pub failures: u64,
}

/// Outcome of a prefetch barrier.
#[derive(Debug, Clone, Default)]
pub struct PrefetchReport {
    /// Addresses newly loaded by this barrier.
    pub loaded: usize,
    /// Addresses skipped because they were already cached.
    pub already_cached: usize,
    /// Addresses that failed to load.
    pub failed: Vec<AssetAddress>,
}

impl AssetCache {
    /// Create a cache over the given fetch backend.
    pub fn new(fetcher: Box<dyn AssetFetcher>) -> Self {
        Self {
            fetcher,
            loaded: HashMap::new(),
            metrics: CacheMetrics::default(),
        }
    }

    /// Whether an address is already loaded.
    pub fn is_cached(&self, address: &AssetAddress) -> bool {
        self.loaded.contains_key(address)
    }

    /// Get a loaded asset, if present.
    pub fn get(&self, address: &AssetAddress) -> Option<&AssetData> {
        self.loaded.get(address)
    }

    /// Load a single address unless it is already cached.
    pub async fn get_or_load(&mut self, address: &AssetAddress) -> Result<&AssetData, AssetError> {
        if !self.loaded.contains_key(address) {
            self.metrics.fetches += 1;
            match self.fetcher.fetch(address).await {
                Ok(data) => {
                    self.loaded.insert(address.clone(), data);
                }
                Err(err) => {
                    self.metrics.failures += 1;
                    return Err(err);
                }
            }
        } else {
            self.metrics.hits += 1;
        }
        Ok(&self.loaded[address])
    }

    /// Blocking prefetch barrier: load every uncached address exactly once.
    ///
    /// Duplicate and already-cached addresses are skipped. Failures are
    /// logged and collected in the report; the barrier itself always
    /// completes.
    pub async fn load_all<I>(&mut self, addresses: I) -> PrefetchReport
    where
        I: IntoIterator<Item = AssetAddress>,
    {
        let mut report = PrefetchReport::default();
        let mut seen = HashSet::new();

        for address in addresses {
            if address.is_empty() || !seen.insert(address.clone()) {
                continue;
            }
            if self.is_cached(&address) {
                self.metrics.hits += 1;
                report.already_cached += 1;
                continue;
            }

            self.metrics.fetches += 1;
            match self.fetcher.fetch(&address).await {
                Ok(data) => {
                    self.loaded.insert(address, data);
                    report.loaded += 1;
                }
                Err(err) => {
                    self.metrics.failures += 1;
                    warn!("Asset load failed for {:?}: {}", address, err);
                    report.failed.push(address);
                }
            }
        }

        debug!(
            "Prefetch barrier complete: {} loaded, {} cached, {} failed",
            report.loaded,
            report.already_cached,
            report.failed.len()
        );
        report
    }

    /// Current cache metrics.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }
}
