//! The abstract ledger boundary.
//!
//! The contract is purely behavioral: submit is asynchronous relative to
//! inclusion (`submit → pending → confirmed/reverted`), signers submit with
//! strictly increasing nonces, and reads never require a write round trip.
//! The concrete wire format behind an implementation (JSON-RPC to a node or
//! an in-process call) is deliberately out of scope.

use crate::entry::LedgerOp;
use crate::events::LedgerEvent;
use async_trait::async_trait;
use healthchain_core::{
    AccessEvent, ConsentGrant, ConsentId, LedgerTxRef, RecordId, RecordPointer, Result,
    WalletIdentity,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Handle to a submitted, not-yet-durable transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(Uuid);

impl TxId {
    /// Mint a fresh transaction identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying uuid.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned by the ledger when an operation confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignedId {
    /// A new record pointer was registered
    Record(RecordId),
    /// A new consent grant was issued
    Consent(ConsentId),
}

/// Confirmation of an included, applied transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Reference to the confirmed transaction
    pub tx_ref: LedgerTxRef,
    /// Ledger timestamp of inclusion (Unix seconds)
    pub timestamp: u64,
    /// Identifier assigned by the operation, if it creates one
    pub assigned: Option<AssignedId>,
}

/// Why an included transaction was rejected by the ledger's preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RevertReason {
    /// Signer is not authorized for the operation
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    /// Consent missing, revoked, expired, or not covering the access
    #[error("invalid consent: {0}")]
    InvalidConsent(String),
    /// Referenced record does not exist
    #[error("unknown record {0}")]
    UnknownRecord(RecordId),
    /// Nonce does not match the signer's expected sequence
    #[error("stale nonce: expected {expected}, got {got}")]
    StaleNonce {
        /// Next nonce the ledger expects from the signer
        expected: u64,
        /// Nonce the transaction carried
        got: u64,
    },
    /// Operation payload failed validation
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RevertReason {
    /// Whether the revert is an authorization failure rather than a
    /// malformed or mis-sequenced submission.
    pub const fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::NotAuthorized(_) | Self::InvalidConsent(_))
    }
}

/// Observed state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Submitted, inclusion not yet observed
    Pending,
    /// Included and applied
    Confirmed(Confirmation),
    /// Included but rejected by ledger preconditions
    Reverted(RevertReason),
}

/// Estimated inclusion cost for an operation.
///
/// Estimation failures are reported to the caller; the coordinator never
/// silently retries with a higher fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    /// Estimated execution units
    pub gas_units: u64,
    /// Estimated total fee in the ledger's smallest denomination
    pub fee_microtokens: u64,
}

/// Append-only transactional log of consent and record-pointer state.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Next nonce the ledger expects from a signer.
    async fn next_nonce(&self, signer: &WalletIdentity) -> Result<u64>;

    /// Estimate the inclusion cost of an operation.
    async fn estimate_fee(&self, op: &LedgerOp) -> Result<FeeEstimate>;

    /// Submit an operation for inclusion. Returns a transaction handle;
    /// durability requires awaiting confirmation separately.
    async fn submit(&self, signer: &WalletIdentity, nonce: u64, op: LedgerOp) -> Result<TxId>;

    /// Poll the observed state of a submitted transaction.
    async fn transaction_status(&self, tx: &TxId) -> Result<TxStatus>;

    /// Look up a record pointer. Pure read.
    async fn record_pointer(&self, id: RecordId) -> Result<Option<RecordPointer>>;

    /// Look up a consent grant as stored. Pure read; expiry is derived by
    /// the caller, never reflected in the stored status.
    async fn consent_grant(&self, id: ConsentId) -> Result<Option<ConsentGrant>>;

    /// Record identifiers owned by an identity.
    async fn records_of(&self, owner: &WalletIdentity) -> Result<Vec<RecordId>>;

    /// Consent identifiers issued by an identity.
    async fn consents_of(&self, grantor: &WalletIdentity) -> Result<Vec<ConsentId>>;

    /// Append-only access log of a record.
    async fn access_log(&self, record: RecordId) -> Result<Vec<AccessEvent>>;

    /// Subscribe to confirmed ledger events.
    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent>;
}
