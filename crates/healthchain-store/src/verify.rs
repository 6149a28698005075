//! Verifying, retrying client wrapper.
//!
//! Wraps any [`BlobStore`] backend and enforces the content-addressing law
//! on both directions: the address returned by `put` must equal the locally
//! computed digest, and bytes returned by `get` are re-hashed and compared
//! against the requested address regardless of what the backend claims.
//!
//! Only `StorageUnavailable` is retried, with capped exponential backoff.
//! `NotFound` and integrity failures propagate immediately.

use crate::store::BlobStore;
use healthchain_core::{ContentAddress, HealthchainError, Result};
use healthchain_crypto::content_address;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry schedule for transient backend failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRetryConfig {
    /// Total attempts per operation, including the first
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Backoff multiplier applied per retry
    pub backoff_multiplier: f64,
    /// Cap on the delay between attempts, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for StoreRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 50,
            backoff_multiplier: 2.0,
            max_delay_ms: 2_000,
        }
    }
}

impl StoreRetryConfig {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

/// Client wrapper enforcing content addressing over an arbitrary backend.
pub struct VerifyingBlobClient<S> {
    backend: S,
    config: StoreRetryConfig,
}

impl<S: BlobStore> VerifyingBlobClient<S> {
    /// Wrap a backend with the default retry schedule.
    pub fn new(backend: S) -> Self {
        Self::with_config(backend, StoreRetryConfig::default())
    }

    /// Wrap a backend with an explicit retry schedule.
    pub fn with_config(backend: S, config: StoreRetryConfig) -> Self {
        Self { backend, config }
    }

    /// Borrow the wrapped backend.
    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Store bytes, verify the returned address, and pin the blob.
    ///
    /// Safe to retry: the same bytes always map to the same address.
    pub async fn put(&self, bytes: Vec<u8>) -> Result<ContentAddress> {
        let expected = content_address(&bytes);

        let address = self
            .with_retries("put", || self.backend.put(bytes.clone()))
            .await?;
        if address != expected {
            return Err(HealthchainError::integrity(format!(
                "store returned address {address}, locally computed {expected}"
            )));
        }

        self.with_retries("pin", || self.backend.pin(&address)).await?;
        debug!(address = %address, bytes = bytes.len(), "blob stored and pinned");
        Ok(address)
    }

    /// Fetch bytes and verify they hash to the requested address.
    pub async fn get(&self, address: &ContentAddress) -> Result<Vec<u8>> {
        let bytes = self
            .with_retries("get", || self.backend.get(address))
            .await?;

        let actual = content_address(&bytes);
        if actual != *address {
            return Err(HealthchainError::integrity(format!(
                "fetched bytes hash to {actual}, expected {address}"
            )));
        }
        Ok(bytes)
    }

    async fn with_retries<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.config.max_attempts => {
                    let delay = self.config.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient store failure, backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
