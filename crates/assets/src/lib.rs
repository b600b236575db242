#![warn(missing_docs)]
//! Asset cache with explicit get-or-load semantics.
//!
//! The command interpreter prefetches every asset a command list references
//! before execution begins; this crate owns the cache that makes that barrier
//! cheap and idempotent.

mod cache;
mod fetcher;

pub use cache::{AssetCache, CacheMetrics, PrefetchReport};
pub use fetcher::{AssetFetcher, DirectoryFetcher};

use riftfall_protocol::AssetAddress;
use thiserror::Error;

/// Raw bytes of a loaded asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetData {
    /// Asset contents.
    pub bytes: Vec<u8>,
}

/// Errors emitted while loading assets.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Wrap IO errors when reading from disk.
    #[error("failed to read asset: {0}")]
    Io(#[from] std::io::Error),
    /// The fetcher has no asset at this address.
    #[error("no asset at address {0:?}")]
    Missing(AssetAddress),
    /// The address was empty.
    #[error("empty asset address")]
    EmptyAddress,
}
