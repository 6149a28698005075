//! In-process store implementation.
//!
//! The one in-tree backend, used by tests and local deployments. Exposes
//! call counters and failure injection so callers' retry and
//! no-fetch-on-denial behavior can be asserted without a live backend.

use crate::store::BlobStore;
use async_trait::async_trait;
use healthchain_core::{ContentAddress, HealthchainError, Result};
use healthchain_crypto::content_address;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-memory content-addressed blob store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<ContentAddress, Vec<u8>>>,
    pinned: RwLock<HashSet<ContentAddress>>,
    get_calls: AtomicU64,
    put_calls: AtomicU64,
    unavailable: AtomicBool,
    fail_next: AtomicU64,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls observed, including failed ones.
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `put` calls observed, including failed ones.
    pub fn put_calls(&self) -> u64 {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Whether an address has been pinned.
    pub async fn is_pinned(&self, address: &ContentAddress) -> bool {
        self.pinned.read().await.contains(address)
    }

    /// Make every operation fail with `StorageUnavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `n` operations with `StorageUnavailable`, then recover.
    pub fn fail_next(&self, n: u64) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(HealthchainError::storage_unavailable(
                "memory store marked unavailable",
            ));
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(HealthchainError::storage_unavailable(
                "injected transient failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentAddress> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let address = content_address(&bytes);
        self.blobs.write().await.insert(address, bytes);
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> Result<Vec<u8>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        self.blobs
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| HealthchainError::not_found(format!("no blob at {address}")))
    }

    async fn contains(&self, address: &ContentAddress) -> Result<bool> {
        self.check_available()?;
        Ok(self.blobs.read().await.contains_key(address))
    }

    async fn pin(&self, address: &ContentAddress) -> Result<()> {
        self.check_available()?;
        if !self.blobs.read().await.contains_key(address) {
            return Err(HealthchainError::not_found(format!(
                "cannot pin missing blob {address}"
            )));
        }
        self.pinned.write().await.insert(*address);
        Ok(())
    }
}
