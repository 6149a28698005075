//! Content hashing.

use healthchain_core::ContentAddress;

/// Compute the content address of a byte sequence.
///
/// Deterministic, fixed-output BLAKE3 digest. Used both as the storage key
/// and for integrity verification on fetch.
pub fn content_address(bytes: &[u8]) -> ContentAddress {
    ContentAddress::from_bytes(*blake3::hash(bytes).as_bytes())
}
