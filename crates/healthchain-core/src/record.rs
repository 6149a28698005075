//! Record pointers owned by the ledger.

use crate::types::{ContentAddress, RecordId, RecordKind, WalletIdentity};
use serde::{Deserialize, Serialize};

/// Ledger-recorded reference to a stored encrypted object.
///
/// Immutable once created: the store never updates an object in place, so a
/// new write always produces a new pointer with a new address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPointer {
    /// Ledger-assigned identifier, monotonic per ledger
    pub record_id: RecordId,
    /// Identity that owns the record (the patient)
    pub owner: WalletIdentity,
    /// Content address of the stored ciphertext
    pub storage_address: ContentAddress,
    /// Kind of medical record
    pub kind: RecordKind,
    /// Ledger timestamp of creation (Unix seconds)
    pub created_at: u64,
}
