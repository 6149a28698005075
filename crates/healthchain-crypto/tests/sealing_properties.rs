//! Property Tests: Object Sealing
//!
//! Verifies the round-trip law `decrypt(encrypt(p)) == p` for arbitrary
//! payloads and that the content address is a function of exactly the framed
//! blob bytes.

use healthchain_crypto::{content_address, decrypt, encrypt, EncryptedObject};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

proptest! {
    #[test]
    fn round_trip_for_all_payloads(payload in proptest::collection::vec(any::<u8>(), 0..4096), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (object, key) = encrypt(&payload, &mut rng).unwrap();

        prop_assert_eq!(decrypt(&object, &key).unwrap(), payload);
    }

    #[test]
    fn address_commits_to_blob_bytes(payload in proptest::collection::vec(any::<u8>(), 0..1024), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (object, _key) = encrypt(&payload, &mut rng).unwrap();

        let bytes = object.to_blob_bytes();
        prop_assert_eq!(content_address(&bytes), object.address);

        let parsed = EncryptedObject::from_blob_bytes(&bytes).unwrap();
        prop_assert_eq!(parsed.address, object.address);
    }

    #[test]
    fn distinct_objects_get_distinct_keys_and_addresses(payload in proptest::collection::vec(any::<u8>(), 1..512), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (a, key_a) = encrypt(&payload, &mut rng).unwrap();
        let (b, key_b) = encrypt(&payload, &mut rng).unwrap();

        // Fresh key and nonce per object: same plaintext, different blobs.
        prop_assert_ne!(key_a.as_bytes(), key_b.as_bytes());
        prop_assert_ne!(a.address, b.address);
    }
}
