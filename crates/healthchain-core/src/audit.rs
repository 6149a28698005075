//! Append-only audit events for mediated access.

use crate::types::{AccessKind, LedgerTxRef, RecordId, WalletIdentity};
use serde::{Deserialize, Serialize};

/// Audit record of one mediated read or write.
///
/// Created exactly once per successful mediated operation and never mutated
/// or deleted, mirroring the ledger's own immutability. The mediator returns
/// plaintext only together with an event whose `ledger_tx_ref` names a
/// confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Record that was accessed
    pub record_id: RecordId,
    /// Identity that performed the access
    pub accessor: WalletIdentity,
    /// Kind of access performed
    pub access_kind: AccessKind,
    /// Declared justification, copied from the consent check
    pub purpose: String,
    /// Ledger timestamp of the access (Unix seconds)
    pub timestamp: u64,
    /// Confirmed ledger transaction that recorded this access
    pub ledger_tx_ref: LedgerTxRef,
    /// Declared subset of the record's logical fields that were read,
    /// for partial-access transparency; empty means the whole record
    pub fields_accessed: Vec<String>,
}
