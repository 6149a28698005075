//! # Healthchain Crypto
//!
//! Per-object authenticated encryption and content hashing.
//!
//! Every stored payload is sealed under a freshly generated AES-256-GCM key
//! that is never reused across objects. The stored blob carries its own
//! framing (algorithm tag, nonce, ciphertext with auth tag) and is addressed
//! by the BLAKE3 digest of exactly those bytes, so the address is both the
//! storage key and the integrity reference.
//!
//! Encryption and hashing are pure functions over explicit inputs: the RNG
//! is passed in, nothing here touches ambient state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// AEAD object sealing and keys
pub mod codec;

/// Content hashing
pub mod hash;

pub use codec::{decrypt, encrypt, CipherAlgorithm, EncryptedObject, ObjectKey};
pub use hash::content_address;
