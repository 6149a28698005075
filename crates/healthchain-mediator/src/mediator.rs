//! The access mediator and its result types.

use healthchain_coordinator::{ConfirmationConfig, TxCoordinator};
use healthchain_core::{
    AccessEvent, AccessKind, Clock, ConsentGrant, ConsentId, ConsentScope, HealthchainError,
    LedgerTxRef, RecordId, RecordKind, RecordPointer, Result, WalletIdentity,
};
use healthchain_crypto::{decrypt, encrypt, EncryptedObject, ObjectKey};
use healthchain_ledger::{
    AssignedId, ConsentLedgerClient, EventStream, Ledger, LedgerEventKind,
};
use healthchain_store::{BlobStore, StoreRetryConfig, VerifyingBlobClient};
use rand::rngs::OsRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a mediated write.
#[derive(Debug)]
pub struct StoredRecord {
    /// Confirmed ledger pointer to the stored object
    pub pointer: RecordPointer,
    /// Object key the owner must retain; never persisted by the mediator
    pub key: ObjectKey,
    /// Transaction that confirmed the pointer
    pub tx_ref: LedgerTxRef,
}

/// Result of a mediated read: plaintext never travels without its audit
/// event, and the event always names a confirmed transaction.
#[derive(Debug)]
pub struct AccessGrant {
    /// Decrypted record payload
    pub plaintext: Vec<u8>,
    /// Audit event correlated to the confirming ledger transaction
    pub event: AccessEvent,
}

/// Orchestrates consent-gated encrypted record access.
pub struct AccessMediator<L, S> {
    client: ConsentLedgerClient<L>,
    coordinator: TxCoordinator<L>,
    blobs: VerifyingBlobClient<S>,
    clock: Arc<dyn Clock>,
}

impl<L: Ledger, S: BlobStore> AccessMediator<L, S> {
    /// Create a mediator over shared ledger and blob store connections.
    pub fn new(ledger: Arc<L>, store: S, clock: Arc<dyn Clock>) -> Self {
        Self::with_configs(
            ledger,
            store,
            clock,
            ConfirmationConfig::default(),
            StoreRetryConfig::default(),
        )
    }

    /// Create a mediator with explicit polling and retry schedules.
    pub fn with_configs(
        ledger: Arc<L>,
        store: S,
        clock: Arc<dyn Clock>,
        confirmation: ConfirmationConfig,
        store_retry: StoreRetryConfig,
    ) -> Self {
        Self {
            client: ConsentLedgerClient::new(Arc::clone(&ledger)),
            coordinator: TxCoordinator::with_config(ledger, confirmation),
            blobs: VerifyingBlobClient::with_config(store, store_retry),
            clock,
        }
    }

    /// The typed read-side surface (queries, validation, event streams).
    pub fn client(&self) -> &ConsentLedgerClient<L> {
        &self.client
    }

    /// Subscribe to confirmed ledger events, optionally one kind only.
    pub fn events(&self, kind: Option<LedgerEventKind>) -> EventStream {
        self.client.subscribe(kind)
    }

    /// Borrow the blob store backend.
    pub fn blob_store(&self) -> &S {
        self.blobs.backend()
    }

    /// Encrypt and store a record payload, registering its ledger pointer.
    ///
    /// Returns the confirmed pointer together with the object key, which
    /// the owner is responsible for retaining. If the pointer confirmation
    /// times out after the blob was stored, the blob is orphaned but inert
    /// (content-addressed, never referenced); the caller retries `store`
    /// from scratch, since no partial ledger state exists to resume from.
    pub async fn store(
        &self,
        owner: &WalletIdentity,
        payload: &[u8],
        kind: RecordKind,
        deadline: Duration,
    ) -> Result<StoredRecord> {
        let (object, key) = encrypt(payload, &mut OsRng)?;
        let address = self.blobs.put(object.to_blob_bytes()).await?;
        debug!(owner = %owner, %address, ?kind, "ciphertext stored, registering pointer");

        let op = ConsentLedgerClient::<L>::create_record_pointer(owner, address, kind);
        let receipt = self.coordinator.submit_and_confirm(owner, op, deadline).await?;
        let record_id = match receipt.assigned {
            Some(AssignedId::Record(id)) => id,
            _ => {
                return Err(HealthchainError::internal(
                    "pointer confirmation carried no record id",
                ))
            }
        };

        info!(owner = %owner, %record_id, tx_ref = %receipt.tx_ref, "record stored");
        Ok(StoredRecord {
            pointer: RecordPointer {
                record_id,
                owner: owner.clone(),
                storage_address: address,
                kind,
                created_at: receipt.timestamp,
            },
            key,
            tx_ref: receipt.tx_ref,
        })
    }

    /// Issue a consent grant and wait for its confirmation.
    ///
    /// `duration_secs == 0` means no expiry. Returns the grant as stored on
    /// the ledger.
    pub async fn grant(
        &self,
        grantor: &WalletIdentity,
        grantee: &WalletIdentity,
        scope: ConsentScope,
        access_kind: AccessKind,
        purpose: &str,
        duration_secs: u64,
        deadline: Duration,
    ) -> Result<ConsentGrant> {
        let op = ConsentLedgerClient::<L>::grant_consent(
            grantor,
            grantee,
            scope,
            access_kind,
            purpose,
            duration_secs,
        )?;
        let receipt = self.coordinator.submit_and_confirm(grantor, op, deadline).await?;
        let consent_id = match receipt.assigned {
            Some(AssignedId::Consent(id)) => id,
            _ => {
                return Err(HealthchainError::internal(
                    "grant confirmation carried no consent id",
                ))
            }
        };

        info!(grantor = %grantor, grantee = %grantee, %consent_id, "consent granted");
        self.client
            .consent_grant(consent_id)
            .await?
            .ok_or_else(|| HealthchainError::internal("confirmed grant missing from ledger"))
    }

    /// Revoke a consent grant, confirmed before returning.
    ///
    /// Only the original grantor may revoke; revoking an already-revoked
    /// grant succeeds as a no-op.
    pub async fn revoke(
        &self,
        grantor: &WalletIdentity,
        consent_id: ConsentId,
        deadline: Duration,
    ) -> Result<LedgerTxRef> {
        let op = ConsentLedgerClient::<L>::revoke_consent(grantor, consent_id);
        let receipt = self.coordinator.submit_and_confirm(grantor, op, deadline).await?;
        info!(grantor = %grantor, %consent_id, tx_ref = %receipt.tx_ref, "consent revoked");
        Ok(receipt.tx_ref)
    }

    /// Read a record under a consent grant.
    ///
    /// Order is binding: consent validity, then scope, then the blob fetch
    /// and decrypt, then the audit write. A consent or scope failure stops
    /// everything before any blob traffic. Plaintext is released only after
    /// the `RecordAccess` transaction confirms; any confirmation failure
    /// discards the decrypted payload.
    pub async fn request_access(
        &self,
        accessor: &WalletIdentity,
        record_id: RecordId,
        consent_id: ConsentId,
        purpose: &str,
        key: &ObjectKey,
        fields_accessed: Vec<String>,
        deadline: Duration,
    ) -> Result<AccessGrant> {
        let now = self.clock.now();
        if !self.client.validate_consent(consent_id, now).await? {
            return Err(HealthchainError::consent_denied(format!(
                "consent {consent_id} is missing, revoked, or expired"
            )));
        }
        let grant = self
            .client
            .consent_grant(consent_id)
            .await?
            .ok_or_else(|| {
                HealthchainError::consent_denied(format!("consent {consent_id} not found"))
            })?;
        if grant.grantee != *accessor {
            return Err(HealthchainError::consent_denied(format!(
                "consent {consent_id} names grantee {}, not {accessor}",
                grant.grantee
            )));
        }
        if !grant.access_kind.permits_read() {
            return Err(HealthchainError::consent_denied(format!(
                "consent {consent_id} does not permit reading"
            )));
        }

        let pointer = self
            .client
            .record_pointer(record_id)
            .await?
            .ok_or_else(|| HealthchainError::not_found(format!("record {record_id}")))?;
        if !grant.scope.covers(record_id, pointer.kind) {
            return Err(HealthchainError::scope_violation(format!(
                "record {record_id} is outside the scope of consent {consent_id}"
            )));
        }

        let blob = self.blobs.get(&pointer.storage_address).await?;
        let object = EncryptedObject::from_blob_bytes(&blob)?;
        let plaintext = decrypt(&object, key)?;

        // Audit before release: the decrypted payload does not leave this
        // function unless the access transaction confirms.
        let op = ConsentLedgerClient::<L>::record_access(
            record_id,
            accessor,
            AccessKind::Read,
            purpose,
            fields_accessed.clone(),
        );
        let receipt = match self.coordinator.submit_and_confirm(accessor, op, deadline).await {
            Ok(receipt) => receipt,
            Err(HealthchainError::NotAuthorized { message }) => {
                // The ledger is an authorization check point of its own; its
                // rejection of the access entry is an authoritative denial.
                warn!(%record_id, accessor = %accessor, "ledger denied access entry");
                return Err(HealthchainError::consent_denied(message));
            }
            Err(err) => {
                warn!(
                    %record_id,
                    accessor = %accessor,
                    error = %err,
                    "audit write unconfirmed, discarding plaintext"
                );
                return Err(HealthchainError::audit_failure(format!(
                    "access entry for record {record_id} did not confirm: {err}"
                )));
            }
        };
        if receipt.tx_ref.is_empty() {
            return Err(HealthchainError::internal(
                "confirmed access entry carried an empty transaction reference",
            ));
        }

        info!(%record_id, accessor = %accessor, tx_ref = %receipt.tx_ref, "access mediated");
        Ok(AccessGrant {
            plaintext,
            event: AccessEvent {
                record_id,
                accessor: accessor.clone(),
                access_kind: AccessKind::Read,
                purpose: purpose.to_string(),
                timestamp: receipt.timestamp,
                ledger_tx_ref: receipt.tx_ref,
                fields_accessed,
            },
        })
    }
}
