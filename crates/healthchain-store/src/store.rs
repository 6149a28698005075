//! The blob store trait seam.

use async_trait::async_trait;
use healthchain_core::{ContentAddress, Result};

/// Content-addressed blob storage.
///
/// Implementations report backend failures as `StorageUnavailable` and a
/// missing address as `NotFound`; the two are never conflated, because only
/// the former is retryable.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their content address.
    ///
    /// Idempotent: the same bytes always map to the same address, so a
    /// repeated `put` after an ambiguous failure is safe.
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentAddress>;

    /// Fetch the bytes stored at an address.
    async fn get(&self, address: &ContentAddress) -> Result<Vec<u8>>;

    /// Whether an address is present in the store.
    async fn contains(&self, address: &ContentAddress) -> Result<bool>;

    /// Pin an address so the backing store retains it.
    async fn pin(&self, address: &ContentAddress) -> Result<()>;
}
