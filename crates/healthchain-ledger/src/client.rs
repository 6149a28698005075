//! Typed client over any ledger.
//!
//! Validated operation builders for the mutating entries, pure-read consent
//! validation with derived expiry, and the query/event surface consumed by
//! the caller-facing layer. Submission and confirmation of the built
//! operations are the transaction coordinator's job.

use crate::entry::LedgerOp;
use crate::events::{EventStream, LedgerEventKind};
use crate::ledger::Ledger;
use healthchain_core::{
    AccessEvent, AccessKind, ConsentGrant, ConsentId, ConsentScope, ContentAddress,
    HealthchainError, RecordId, RecordKind, RecordPointer, Result, WalletIdentity,
};
use std::sync::Arc;

/// Typed operations against a consent ledger.
pub struct ConsentLedgerClient<L> {
    ledger: Arc<L>,
}

impl<L> Clone for ConsentLedgerClient<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<L: Ledger> ConsentLedgerClient<L> {
    /// Create a client over a shared ledger connection.
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Borrow the underlying ledger.
    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Build a record-pointer registration.
    pub fn create_record_pointer(
        owner: &WalletIdentity,
        storage_address: ContentAddress,
        kind: RecordKind,
    ) -> LedgerOp {
        LedgerOp::CreateRecordPointer {
            owner: owner.clone(),
            storage_address,
            kind,
        }
    }

    /// Build a consent grant, rejecting malformed grants before submission.
    ///
    /// `duration_secs == 0` means no expiry.
    pub fn grant_consent(
        grantor: &WalletIdentity,
        grantee: &WalletIdentity,
        scope: ConsentScope,
        access_kind: AccessKind,
        purpose: &str,
        duration_secs: u64,
    ) -> Result<LedgerOp> {
        if purpose.trim().is_empty() {
            return Err(HealthchainError::invalid(
                "consent purpose must not be empty",
            ));
        }
        if scope.is_empty() {
            return Err(HealthchainError::invalid(
                "consent scope must name at least one record",
            ));
        }
        Ok(LedgerOp::GrantConsent {
            grantor: grantor.clone(),
            grantee: grantee.clone(),
            scope,
            access_kind,
            purpose: purpose.to_string(),
            duration_secs,
        })
    }

    /// Build a consent revocation.
    pub fn revoke_consent(grantor: &WalletIdentity, consent_id: ConsentId) -> LedgerOp {
        LedgerOp::RevokeConsent {
            grantor: grantor.clone(),
            consent_id,
        }
    }

    /// Build an access-recording entry.
    pub fn record_access(
        record_id: RecordId,
        accessor: &WalletIdentity,
        access_kind: AccessKind,
        purpose: &str,
        fields_accessed: Vec<String>,
    ) -> LedgerOp {
        LedgerOp::RecordAccess {
            record_id,
            accessor: accessor.clone(),
            access_kind,
            purpose: purpose.to_string(),
            fields_accessed,
        }
    }

    /// Whether a consent grant is valid at `now`.
    ///
    /// Pure read: applies the derived-expiry rule without any ledger write.
    /// A missing grant is simply invalid.
    pub async fn validate_consent(&self, consent_id: ConsentId, now: u64) -> Result<bool> {
        Ok(self
            .ledger
            .consent_grant(consent_id)
            .await?
            .is_some_and(|grant| grant.is_valid_at(now)))
    }

    /// Fetch a consent grant as stored.
    pub async fn consent_grant(&self, consent_id: ConsentId) -> Result<Option<ConsentGrant>> {
        self.ledger.consent_grant(consent_id).await
    }

    /// Fetch a record pointer.
    pub async fn record_pointer(&self, record_id: RecordId) -> Result<Option<RecordPointer>> {
        self.ledger.record_pointer(record_id).await
    }

    /// Record identifiers owned by an identity.
    pub async fn records_of(&self, owner: &WalletIdentity) -> Result<Vec<RecordId>> {
        self.ledger.records_of(owner).await
    }

    /// Consent identifiers issued by an identity.
    pub async fn consents_of(&self, grantor: &WalletIdentity) -> Result<Vec<ConsentId>> {
        self.ledger.consents_of(grantor).await
    }

    /// Append-only access log of a record.
    pub async fn access_log(&self, record_id: RecordId) -> Result<Vec<AccessEvent>> {
        self.ledger.access_log(record_id).await
    }

    /// Subscribe to confirmed ledger events, optionally one kind only.
    pub fn subscribe(&self, kind: Option<LedgerEventKind>) -> EventStream {
        let receiver = self.ledger.subscribe();
        match kind {
            Some(kind) => EventStream::filtered(receiver, kind),
            None => EventStream::new(receiver),
        }
    }
}
