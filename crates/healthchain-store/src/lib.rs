//! # Healthchain Store
//!
//! Content-addressed blob store client.
//!
//! The backing store is an external pinning-capable service reachable by
//! content hash; this crate defines the narrow [`BlobStore`] seam, an
//! in-process [`MemoryBlobStore`] used by tests and local deployments, and
//! the [`VerifyingBlobClient`] wrapper that enforces the content-addressing
//! law on every round trip and retries transient backend failures with
//! bounded backoff.
//!
//! Stored objects are immutable: there is no update or delete operation. A
//! `put` of the same bytes always yields the same address, which is what
//! makes retrying it safe.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The blob store trait seam
pub mod store;

/// In-process store implementation
pub mod memory;

/// Verifying, retrying client wrapper
pub mod verify;

pub use memory::MemoryBlobStore;
pub use store::BlobStore;
pub use verify::{StoreRetryConfig, VerifyingBlobClient};
