//! AEAD object sealing and keys.
//!
//! Uses AES-256-GCM with a random 12-byte nonce. The GCM auth tag rides at
//! the end of the ciphertext as produced by the cipher; decryption fails
//! closed on any tag mismatch and never releases partial plaintext.

use crate::hash::content_address;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key,
};
use healthchain_core::{ContentAddress, HealthchainError, Result};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Symmetric key for exactly one stored object.
///
/// Generated fresh per object and never reused. Crosses the API boundary as
/// an opaque hex string; key transport and custody are the caller's concern.
/// Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ObjectKey([u8; 32]);

impl ObjectKey {
    /// Generate a fresh random key.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut key = [0u8; 32];
        rng.fill_bytes(&mut key);
        Self(key)
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as the opaque hex string used at the key custody boundary.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = hex::decode(s)
            .map_err(|e| HealthchainError::invalid(format!("malformed object key: {e}")))?;
        // The decoded buffer may hold key material even when the length is
        // wrong; wipe it on every path out.
        let key: Option<[u8; 32]> = bytes.as_slice().try_into().ok();
        bytes.zeroize();
        key.map(Self)
            .ok_or_else(|| HealthchainError::invalid("object key must be 32 bytes"))
    }
}

impl std::fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("ObjectKey(..)")
    }
}

/// Cipher used to seal an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherAlgorithm {
    /// AES-256-GCM with 12-byte nonce and 16-byte tag
    Aes256Gcm,
}

impl CipherAlgorithm {
    /// Stable framing code stored in the blob header.
    pub const fn wire_code(self) -> u8 {
        match self {
            Self::Aes256Gcm => 1,
        }
    }

    /// Decode a framing code.
    pub const fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Aes256Gcm),
            _ => None,
        }
    }
}

/// An opaque encrypted blob plus its content address.
///
/// Immutable once created; a new write always produces a new object with a
/// new address. The address is the digest of the exact bytes placed in the
/// blob store ([`EncryptedObject::to_blob_bytes`]) and is recomputed and
/// compared on every fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedObject {
    /// Cipher the object was sealed with
    pub algorithm: CipherAlgorithm,
    /// Random GCM nonce
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the auth tag appended
    pub ciphertext: Vec<u8>,
    /// Content address of the framed blob bytes
    pub address: ContentAddress,
}

impl EncryptedObject {
    /// Serialize to the exact bytes stored in the blob store.
    ///
    /// Framing: `[algorithm code | nonce | ciphertext||tag]`.
    pub fn to_blob_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + NONCE_LEN + self.ciphertext.len());
        bytes.push(self.algorithm.wire_code());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parse fetched blob bytes back into an object, recomputing the address.
    pub fn from_blob_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 1 + NONCE_LEN {
            return Err(HealthchainError::integrity(format!(
                "blob too short for framing: {} bytes",
                bytes.len()
            )));
        }
        let algorithm = CipherAlgorithm::from_wire_code(bytes[0]).ok_or_else(|| {
            HealthchainError::integrity(format!("unknown cipher code {}", bytes[0]))
        })?;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[1..1 + NONCE_LEN]);

        Ok(Self {
            algorithm,
            nonce,
            ciphertext: bytes[1 + NONCE_LEN..].to_vec(),
            address: content_address(bytes),
        })
    }
}

/// Seal a payload under a freshly generated key.
///
/// Returns the sealed object and its key. The key never persists anywhere in
/// this subsystem; the caller is responsible for retaining it.
pub fn encrypt(
    plaintext: &[u8],
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<(EncryptedObject, ObjectKey)> {
    let key = ObjectKey::generate(rng);
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(&nonce.into(), plaintext)
        .map_err(|e| HealthchainError::internal(format!("AES-GCM encryption failed: {e}")))?;

    let mut object = EncryptedObject {
        algorithm: CipherAlgorithm::Aes256Gcm,
        nonce,
        ciphertext,
        // Placeholder until framing is complete.
        address: ContentAddress::from_bytes([0u8; 32]),
    };
    object.address = content_address(&object.to_blob_bytes());

    Ok((object, key))
}

/// Open a sealed object.
///
/// Fails closed with an integrity error on any auth-tag mismatch; garbage
/// plaintext is never returned.
pub fn decrypt(object: &EncryptedObject, key: &ObjectKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(&object.nonce.into(), object.ciphertext.as_slice())
        .map_err(|_| HealthchainError::integrity("authentication tag mismatch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        let (object, key) = encrypt(b"patient report", &mut rng).unwrap();

        let plaintext = decrypt(&object, &key).unwrap();
        assert_eq!(plaintext, b"patient report");
    }

    #[test]
    fn keys_are_never_reused_across_objects() {
        let mut rng = StdRng::seed_from_u64(7);
        let (_, key_a) = encrypt(b"one", &mut rng).unwrap();
        let (_, key_b) = encrypt(b"one", &mut rng).unwrap();

        assert_ne!(key_a.as_bytes(), key_b.as_bytes());
    }

    #[test]
    fn wrong_key_fails_closed() {
        let mut rng = StdRng::seed_from_u64(7);
        let (object, _key) = encrypt(b"secret", &mut rng).unwrap();
        let wrong = ObjectKey::generate(&mut rng);

        let err = decrypt(&object, &wrong).unwrap_err();
        assert!(matches!(
            err,
            healthchain_core::HealthchainError::Integrity { .. }
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let mut rng = StdRng::seed_from_u64(7);
        let (mut object, key) = encrypt(b"secret", &mut rng).unwrap();
        object.ciphertext[0] ^= 0x01;

        assert!(decrypt(&object, &key).is_err());
    }

    #[test]
    fn blob_framing_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        let (object, key) = encrypt(b"framed payload", &mut rng).unwrap();

        let bytes = object.to_blob_bytes();
        let parsed = EncryptedObject::from_blob_bytes(&bytes).unwrap();

        assert_eq!(parsed, object);
        assert_eq!(decrypt(&parsed, &key).unwrap(), b"framed payload");
    }

    #[test]
    fn truncated_blob_rejected() {
        assert!(EncryptedObject::from_blob_bytes(&[1, 2, 3]).is_err());
        // Unknown algorithm code.
        let mut bytes = vec![9u8];
        bytes.extend_from_slice(&[0u8; NONCE_LEN]);
        assert!(EncryptedObject::from_blob_bytes(&bytes).is_err());
    }

    #[test]
    fn object_key_hex_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        let key = ObjectKey::generate(&mut rng);
        let restored = ObjectKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key.as_bytes(), restored.as_bytes());

        assert!(ObjectKey::from_hex("deadbeef").is_err());
    }

    #[test]
    fn wrong_length_key_material_is_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        let key = ObjectKey::generate(&mut rng);

        // Real key material of the wrong length still errors cleanly.
        let mut long = key.to_hex();
        long.push_str("ab");
        assert!(ObjectKey::from_hex(&long).is_err());

        let short = &key.to_hex()[..62];
        assert!(ObjectKey::from_hex(short).is_err());
    }
}
