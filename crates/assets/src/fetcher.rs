//! Asset fetch backends.

use crate::{AssetData, AssetError};
use async_trait::async_trait;
use riftfall_protocol::AssetAddress;
use std::path::PathBuf;

/// Source of asset bytes, keyed by address.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch the asset at `address`.
    async fn fetch(&self, address: &AssetAddress) -> Result<AssetData, AssetError>;
}

/// Fetcher that resolves addresses relative to a root directory.
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    /// Create a fetcher rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetFetcher for DirectoryFetcher {
    async fn fetch(&self, address: &AssetAddress) -> Result<AssetData, AssetError> {
        if address.is_empty() {
            return Err(AssetError::EmptyAddress);
        }
        let path = self.root.join(&address.0);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(AssetData { bytes }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetError::Missing(address.clone()))
            }
            Err(err) => Err(AssetError::Io(err)),
        }
    }
}
