//! Ledger operations (the entry kinds recorded on chain).

use healthchain_core::{
    AccessKind, ConsentId, ConsentScope, ContentAddress, RecordId, RecordKind, WalletIdentity,
};
use serde::{Deserialize, Serialize};

/// A ledger-mutating operation submitted for inclusion.
///
/// Each variant corresponds to one entry kind in the append-only log. The
/// ledger assigns identifiers (`RecordId`, `ConsentId`) at confirmation
/// time; operations never carry them for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    /// Register a pointer to a stored encrypted object.
    CreateRecordPointer {
        /// Identity that owns the record; must match the signer
        owner: WalletIdentity,
        /// Content address of the stored ciphertext
        storage_address: ContentAddress,
        /// Kind of medical record
        kind: RecordKind,
    },

    /// Issue a consent grant.
    GrantConsent {
        /// Identity issuing the grant; must match the signer
        grantor: WalletIdentity,
        /// Identity the grant authorizes
        grantee: WalletIdentity,
        /// Records the grant covers
        scope: ConsentScope,
        /// Kind of access authorized
        access_kind: AccessKind,
        /// Free-text justification, non-empty
        purpose: String,
        /// Validity window in seconds; `0` means no expiry
        duration_secs: u64,
    },

    /// Revoke an existing grant. Only the original grantor may revoke;
    /// revoking an already-revoked grant is a no-op success.
    RevokeConsent {
        /// Identity revoking; must be the original grantor and the signer
        grantor: WalletIdentity,
        /// Grant to revoke
        consent_id: ConsentId,
    },

    /// Record a mediated access. The ledger re-checks authorization when
    /// applying this entry, so its rejection is an authoritative denial,
    /// not a logging failure.
    RecordAccess {
        /// Record that was accessed
        record_id: RecordId,
        /// Identity performing the access; must match the signer
        accessor: WalletIdentity,
        /// Kind of access performed
        access_kind: AccessKind,
        /// Declared justification
        purpose: String,
        /// Declared subset of logical fields read; empty means the whole record
        fields_accessed: Vec<String>,
    },
}

impl LedgerOp {
    /// Short name used in logs and receipts.
    pub const fn summary(&self) -> &'static str {
        match self {
            Self::CreateRecordPointer { .. } => "create_record_pointer",
            Self::GrantConsent { .. } => "grant_consent",
            Self::RevokeConsent { .. } => "revoke_consent",
            Self::RecordAccess { .. } => "record_access",
        }
    }

    /// The identity that must sign this operation.
    pub fn required_signer(&self) -> &WalletIdentity {
        match self {
            Self::CreateRecordPointer { owner, .. } => owner,
            Self::GrantConsent { grantor, .. } => grantor,
            Self::RevokeConsent { grantor, .. } => grantor,
            Self::RecordAccess { accessor, .. } => accessor,
        }
    }
}
