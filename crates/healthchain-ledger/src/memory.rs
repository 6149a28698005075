//! In-process ledger implementation.
//!
//! Used by tests and local deployments. Mirrors the confirmation semantics
//! of a remote node: submitted operations stay `Pending` for a configurable
//! number of status polls, nonces must arrive in strict per-signer sequence,
//! and precondition failures surface as typed reverts after inclusion.
//! Fault injection hooks (reject, revert, stall) let callers exercise every
//! branch of the coordinator's state machine deterministically.

use crate::entry::LedgerOp;
use crate::events::LedgerEvent;
use crate::ledger::{
    AssignedId, Confirmation, FeeEstimate, Ledger, RevertReason, TxId, TxStatus,
};
use async_trait::async_trait;
use healthchain_core::{
    AccessEvent, AccessKind, Clock, ConsentGrant, ConsentId, ConsentStatus, HealthchainError,
    LedgerTxRef, RecordId, RecordPointer, Result, WalletIdentity,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

/// Tuning for the in-process ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryLedgerConfig {
    /// Status polls a transaction stays `Pending` before it is applied
    pub confirmation_polls: u32,
    /// Broadcast buffer for event subscribers
    pub event_buffer: usize,
}

impl Default for InMemoryLedgerConfig {
    fn default() -> Self {
        Self {
            confirmation_polls: 1,
            event_buffer: 64,
        }
    }
}

struct PendingTx {
    signer: WalletIdentity,
    nonce: u64,
    op: LedgerOp,
    remaining_polls: u32,
    stalled: bool,
    forced_revert: Option<String>,
    outcome: Option<TxStatus>,
}

#[derive(Default)]
struct LedgerState {
    records: HashMap<RecordId, RecordPointer>,
    consents: HashMap<ConsentId, ConsentGrant>,
    records_by_owner: HashMap<WalletIdentity, Vec<RecordId>>,
    consents_by_grantor: HashMap<WalletIdentity, Vec<ConsentId>>,
    access_logs: HashMap<RecordId, Vec<AccessEvent>>,
    expected_nonce: HashMap<WalletIdentity, u64>,
    txs: HashMap<TxId, PendingTx>,
    next_record_id: u64,
    next_consent_id: u64,
}

/// Append-only in-process ledger.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
    config: InMemoryLedgerConfig,
    events: broadcast::Sender<LedgerEvent>,
    reject_next: Mutex<Option<String>>,
    revert_next: Mutex<Option<String>>,
    stall_next: AtomicBool,
    fail_fee: AtomicBool,
}

impl InMemoryLedger {
    /// Create a ledger with the default configuration.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(clock, InMemoryLedgerConfig::default())
    }

    /// Create a ledger with an explicit configuration.
    pub fn with_config(clock: Arc<dyn Clock>, config: InMemoryLedgerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            state: Mutex::new(LedgerState::default()),
            clock,
            config,
            events,
            reject_next: Mutex::new(None),
            revert_next: Mutex::new(None),
            stall_next: AtomicBool::new(false),
            fail_fee: AtomicBool::new(false),
        }
    }

    /// Reject the next submission outright (never included).
    pub async fn reject_next_submission(&self, reason: &str) {
        *self.reject_next.lock().await = Some(reason.to_string());
    }

    /// Revert the next submitted transaction after inclusion.
    pub async fn revert_next(&self, reason: &str) {
        *self.revert_next.lock().await = Some(reason.to_string());
    }

    /// Leave the next submitted transaction pending forever.
    pub fn stall_next(&self) {
        self.stall_next.store(true, Ordering::SeqCst);
    }

    /// Make fee estimation fail until cleared.
    pub fn set_fail_fee_estimation(&self, fail: bool) {
        self.fail_fee.store(fail, Ordering::SeqCst);
    }

    fn tx_ref_for(tx: &TxId, signer: &WalletIdentity, nonce: u64) -> LedgerTxRef {
        let mut hasher = blake3::Hasher::new();
        hasher.update(tx.as_uuid().as_bytes());
        hasher.update(signer.as_str().as_bytes());
        hasher.update(&nonce.to_be_bytes());
        LedgerTxRef::new(format!("0x{}", hex::encode(hasher.finalize().as_bytes())))
    }

    /// Apply an included operation against current state.
    ///
    /// Runs at confirmation time, so authorization is evaluated against the
    /// state and clock of inclusion, not submission.
    fn apply(
        state: &mut LedgerState,
        now: u64,
        signer: &WalletIdentity,
        op: &LedgerOp,
        tx_ref: &LedgerTxRef,
    ) -> std::result::Result<(Option<AssignedId>, Option<LedgerEvent>), RevertReason> {
        match op {
            LedgerOp::CreateRecordPointer {
                owner,
                storage_address,
                kind,
            } => {
                if signer != owner {
                    return Err(RevertReason::NotAuthorized(format!(
                        "signer {signer} cannot register records for {owner}"
                    )));
                }
                state.next_record_id += 1;
                let record_id = RecordId::new(state.next_record_id);
                let pointer = RecordPointer {
                    record_id,
                    owner: owner.clone(),
                    storage_address: *storage_address,
                    kind: *kind,
                    created_at: now,
                };
                state.records.insert(record_id, pointer);
                state
                    .records_by_owner
                    .entry(owner.clone())
                    .or_default()
                    .push(record_id);
                Ok((
                    Some(AssignedId::Record(record_id)),
                    Some(LedgerEvent::RecordCreated {
                        record_id,
                        owner: owner.clone(),
                        tx_ref: tx_ref.clone(),
                    }),
                ))
            }

            LedgerOp::GrantConsent {
                grantor,
                grantee,
                scope,
                access_kind,
                purpose,
                duration_secs,
            } => {
                if signer != grantor {
                    return Err(RevertReason::NotAuthorized(format!(
                        "signer {signer} cannot grant consent for {grantor}"
                    )));
                }
                if purpose.trim().is_empty() {
                    return Err(RevertReason::InvalidInput("purpose must not be empty".into()));
                }
                if scope.is_empty() {
                    return Err(RevertReason::InvalidInput("scope names no records".into()));
                }
                state.next_consent_id += 1;
                let consent_id = ConsentId::new(state.next_consent_id);
                let grant = ConsentGrant {
                    consent_id,
                    grantor: grantor.clone(),
                    grantee: grantee.clone(),
                    access_kind: *access_kind,
                    scope: scope.clone(),
                    purpose: purpose.clone(),
                    issued_at: now,
                    expires_at: (*duration_secs > 0).then(|| now.saturating_add(*duration_secs)),
                    status: ConsentStatus::Granted,
                };
                state.consents.insert(consent_id, grant);
                state
                    .consents_by_grantor
                    .entry(grantor.clone())
                    .or_default()
                    .push(consent_id);
                Ok((
                    Some(AssignedId::Consent(consent_id)),
                    Some(LedgerEvent::ConsentGranted {
                        consent_id,
                        grantor: grantor.clone(),
                        grantee: grantee.clone(),
                        tx_ref: tx_ref.clone(),
                    }),
                ))
            }

            LedgerOp::RevokeConsent {
                grantor,
                consent_id,
            } => {
                let grant = state.consents.get_mut(consent_id).ok_or_else(|| {
                    RevertReason::InvalidConsent(format!("unknown consent {consent_id}"))
                })?;
                if signer != grantor || *signer != grant.grantor {
                    return Err(RevertReason::NotAuthorized(format!(
                        "only grantor {} may revoke consent {consent_id}",
                        grant.grantor
                    )));
                }
                if grant.status == ConsentStatus::Revoked {
                    // Idempotent: already revoked is a no-op success.
                    return Ok((None, None));
                }
                grant.status = ConsentStatus::Revoked;
                Ok((
                    None,
                    Some(LedgerEvent::ConsentRevoked {
                        consent_id: *consent_id,
                        grantor: grantor.clone(),
                        tx_ref: tx_ref.clone(),
                    }),
                ))
            }

            LedgerOp::RecordAccess {
                record_id,
                accessor,
                access_kind,
                purpose,
                fields_accessed,
            } => {
                if signer != accessor {
                    return Err(RevertReason::NotAuthorized(format!(
                        "signer {signer} cannot record access for {accessor}"
                    )));
                }
                let pointer = state
                    .records
                    .get(record_id)
                    .ok_or(RevertReason::UnknownRecord(*record_id))?
                    .clone();

                let authorized = pointer.owner == *accessor
                    || state.consents.values().any(|grant| {
                        grant.grantee == *accessor
                            && grant.is_valid_at(now)
                            && grant.scope.covers(*record_id, pointer.kind)
                            && Self::kind_permitted(grant.access_kind, *access_kind)
                    });
                if !authorized {
                    return Err(RevertReason::InvalidConsent(format!(
                        "no valid consent lets {accessor} access record {record_id}"
                    )));
                }

                let event = AccessEvent {
                    record_id: *record_id,
                    accessor: accessor.clone(),
                    access_kind: *access_kind,
                    purpose: purpose.clone(),
                    timestamp: now,
                    ledger_tx_ref: tx_ref.clone(),
                    fields_accessed: fields_accessed.clone(),
                };
                state
                    .access_logs
                    .entry(*record_id)
                    .or_default()
                    .push(event);
                Ok((
                    None,
                    Some(LedgerEvent::RecordAccessed {
                        record_id: *record_id,
                        accessor: accessor.clone(),
                        tx_ref: tx_ref.clone(),
                    }),
                ))
            }
        }
    }

    fn kind_permitted(granted: AccessKind, requested: AccessKind) -> bool {
        match requested {
            AccessKind::Read => granted.permits_read(),
            AccessKind::Write => granted.permits_write(),
            AccessKind::Emergency => granted == AccessKind::Emergency,
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn next_nonce(&self, signer: &WalletIdentity) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state.expected_nonce.get(signer).copied().unwrap_or(0))
    }

    async fn estimate_fee(&self, op: &LedgerOp) -> Result<FeeEstimate> {
        if self.fail_fee.load(Ordering::SeqCst) {
            return Err(HealthchainError::ledger_rejected(
                "fee estimation unavailable",
            ));
        }
        // Deterministic size-proportional estimate.
        let payload = serde_json::to_vec(op)
            .map_err(|e| HealthchainError::serialization(e.to_string()))?;
        let gas_units = 21_000 + 16 * payload.len() as u64;
        Ok(FeeEstimate {
            gas_units,
            fee_microtokens: gas_units * 2,
        })
    }

    async fn submit(&self, signer: &WalletIdentity, nonce: u64, op: LedgerOp) -> Result<TxId> {
        if let Some(reason) = self.reject_next.lock().await.take() {
            return Err(HealthchainError::ledger_rejected(reason));
        }

        let forced_revert = self.revert_next.lock().await.take();
        let stalled = self.stall_next.swap(false, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        let expected = state.expected_nonce.get(signer).copied().unwrap_or(0);
        let tx = TxId::generate();

        let outcome = if nonce != expected {
            Some(TxStatus::Reverted(RevertReason::StaleNonce {
                expected,
                got: nonce,
            }))
        } else {
            state.expected_nonce.insert(signer.clone(), expected + 1);
            None
        };

        debug!(%tx, signer = %signer, nonce, op = op.summary(), "transaction submitted");
        state.txs.insert(
            tx,
            PendingTx {
                signer: signer.clone(),
                nonce,
                op,
                remaining_polls: self.config.confirmation_polls,
                stalled,
                forced_revert,
                outcome,
            },
        );
        Ok(tx)
    }

    async fn transaction_status(&self, tx: &TxId) -> Result<TxStatus> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let pending = state
            .txs
            .get_mut(tx)
            .ok_or_else(|| HealthchainError::not_found(format!("unknown transaction {tx}")))?;

        if let Some(outcome) = &pending.outcome {
            return Ok(outcome.clone());
        }
        if pending.stalled {
            return Ok(TxStatus::Pending);
        }
        if pending.remaining_polls > 0 {
            pending.remaining_polls -= 1;
            return Ok(TxStatus::Pending);
        }

        let signer = pending.signer.clone();
        let nonce = pending.nonce;
        let op = pending.op.clone();
        let forced_revert = pending.forced_revert.take();
        let tx_ref = Self::tx_ref_for(tx, &signer, nonce);

        let status = if let Some(reason) = forced_revert {
            TxStatus::Reverted(RevertReason::InvalidInput(reason))
        } else {
            match Self::apply(&mut state, now, &signer, &op, &tx_ref) {
                Ok((assigned, event)) => {
                    if let Some(event) = event {
                        // No subscribers is fine.
                        let _ = self.events.send(event);
                    }
                    TxStatus::Confirmed(Confirmation {
                        tx_ref,
                        timestamp: now,
                        assigned,
                    })
                }
                Err(reason) => TxStatus::Reverted(reason),
            }
        };

        if let Some(pending) = state.txs.get_mut(tx) {
            pending.outcome = Some(status.clone());
        }
        Ok(status)
    }

    async fn record_pointer(&self, id: RecordId) -> Result<Option<RecordPointer>> {
        Ok(self.state.lock().await.records.get(&id).cloned())
    }

    async fn consent_grant(&self, id: ConsentId) -> Result<Option<ConsentGrant>> {
        Ok(self.state.lock().await.consents.get(&id).cloned())
    }

    async fn records_of(&self, owner: &WalletIdentity) -> Result<Vec<RecordId>> {
        Ok(self
            .state
            .lock()
            .await
            .records_by_owner
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn consents_of(&self, grantor: &WalletIdentity) -> Result<Vec<ConsentId>> {
        Ok(self
            .state
            .lock()
            .await
            .consents_by_grantor
            .get(grantor)
            .cloned()
            .unwrap_or_default())
    }

    async fn access_log(&self, record: RecordId) -> Result<Vec<AccessEvent>> {
        Ok(self
            .state
            .lock()
            .await
            .access_logs
            .get(&record)
            .cloned()
            .unwrap_or_default())
    }

    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use healthchain_core::{ConsentScope, ContentAddress, ManualClock, RecordKind};

    fn ledger() -> (Arc<InMemoryLedger>, ManualClock) {
        let clock = ManualClock::starting_at(1_000);
        let ledger = Arc::new(InMemoryLedger::new(Arc::new(clock.clone())));
        (ledger, clock)
    }

    /// Drive a submitted transaction through pending polls to its outcome.
    async fn settle(ledger: &InMemoryLedger, tx: &TxId) -> TxStatus {
        loop {
            match ledger.transaction_status(tx).await.unwrap() {
                TxStatus::Pending => continue,
                outcome => return outcome,
            }
        }
    }

    fn create_record_op(owner: &WalletIdentity) -> LedgerOp {
        LedgerOp::CreateRecordPointer {
            owner: owner.clone(),
            storage_address: ContentAddress::from_bytes([5u8; 32]),
            kind: RecordKind::LabResult,
        }
    }

    #[tokio::test]
    async fn confirmation_is_polled_not_immediate() {
        let (ledger, _clock) = ledger();
        let owner = WalletIdentity::new("0xpatient");

        let tx = ledger.submit(&owner, 0, create_record_op(&owner)).await.unwrap();
        assert_eq!(ledger.transaction_status(&tx).await.unwrap(), TxStatus::Pending);

        let status = settle(&ledger, &tx).await;
        let confirmation = assert_matches!(status, TxStatus::Confirmed(c) => c);
        assert_eq!(confirmation.assigned, Some(AssignedId::Record(RecordId::new(1))));
        assert!(!confirmation.tx_ref.is_empty());

        let pointer = ledger.record_pointer(RecordId::new(1)).await.unwrap().unwrap();
        assert_eq!(pointer.owner, owner);
        assert_eq!(pointer.created_at, 1_000);
    }

    #[tokio::test]
    async fn stale_nonce_reverts_without_advancing_sequence() {
        let (ledger, _clock) = ledger();
        let owner = WalletIdentity::new("0xpatient");

        let tx = ledger.submit(&owner, 5, create_record_op(&owner)).await.unwrap();
        assert_matches!(
            settle(&ledger, &tx).await,
            TxStatus::Reverted(RevertReason::StaleNonce { expected: 0, got: 5 })
        );

        // The correct nonce is still 0.
        assert_eq!(ledger.next_nonce(&owner).await.unwrap(), 0);
        let tx = ledger.submit(&owner, 0, create_record_op(&owner)).await.unwrap();
        assert_matches!(settle(&ledger, &tx).await, TxStatus::Confirmed(_));
    }

    #[tokio::test]
    async fn registering_for_another_owner_reverts_not_authorized() {
        let (ledger, _clock) = ledger();
        let owner = WalletIdentity::new("0xpatient");
        let intruder = WalletIdentity::new("0xintruder");

        let tx = ledger.submit(&intruder, 0, create_record_op(&owner)).await.unwrap();
        let reason = assert_matches!(settle(&ledger, &tx).await, TxStatus::Reverted(r) => r);
        assert!(reason.is_authorization_failure());
    }

    #[tokio::test]
    async fn revocation_is_grantor_only_and_idempotent() {
        let (ledger, _clock) = ledger();
        let patient = WalletIdentity::new("0xpatient");
        let doctor = WalletIdentity::new("0xdoctor");

        let grant_op = LedgerOp::GrantConsent {
            grantor: patient.clone(),
            grantee: doctor.clone(),
            scope: ConsentScope::AllOfKind(RecordKind::LabResult),
            access_kind: AccessKind::Read,
            purpose: "annual checkup".into(),
            duration_secs: 0,
        };
        let tx = ledger.submit(&patient, 0, grant_op).await.unwrap();
        let confirmation = assert_matches!(settle(&ledger, &tx).await, TxStatus::Confirmed(c) => c);
        let consent_id =
            assert_matches!(confirmation.assigned, Some(AssignedId::Consent(id)) => id);

        // The grantee cannot revoke.
        let tx = ledger
            .submit(
                &doctor,
                0,
                LedgerOp::RevokeConsent {
                    grantor: doctor.clone(),
                    consent_id,
                },
            )
            .await
            .unwrap();
        assert_matches!(
            settle(&ledger, &tx).await,
            TxStatus::Reverted(RevertReason::NotAuthorized(_))
        );

        // The grantor can, twice, and both confirm.
        for nonce in 1..=2 {
            let tx = ledger
                .submit(
                    &patient,
                    nonce,
                    LedgerOp::RevokeConsent {
                        grantor: patient.clone(),
                        consent_id,
                    },
                )
                .await
                .unwrap();
            assert_matches!(settle(&ledger, &tx).await, TxStatus::Confirmed(_));
        }

        let grant = ledger.consent_grant(consent_id).await.unwrap().unwrap();
        assert_eq!(grant.status, ConsentStatus::Revoked);
    }

    #[tokio::test]
    async fn maximal_duration_grant_saturates_instead_of_wrapping() {
        let (ledger, _clock) = ledger();
        let patient = WalletIdentity::new("0xpatient");
        let doctor = WalletIdentity::new("0xdoctor");

        let tx = ledger
            .submit(
                &patient,
                0,
                LedgerOp::GrantConsent {
                    grantor: patient.clone(),
                    grantee: doctor.clone(),
                    scope: ConsentScope::AllOfKind(RecordKind::LabResult),
                    access_kind: AccessKind::Read,
                    purpose: "lifelong research cohort".into(),
                    duration_secs: u64::MAX,
                },
            )
            .await
            .unwrap();
        let confirmation = assert_matches!(settle(&ledger, &tx).await, TxStatus::Confirmed(c) => c);
        let consent_id =
            assert_matches!(confirmation.assigned, Some(AssignedId::Consent(id)) => id);

        // The window clamps to the end of time rather than wrapping into the past.
        let grant = ledger.consent_grant(consent_id).await.unwrap().unwrap();
        assert_eq!(grant.expires_at, Some(u64::MAX));
        assert!(grant.is_valid_at(u64::MAX));
    }

    #[tokio::test]
    async fn record_access_requires_valid_consent_at_inclusion_time() {
        let (ledger, clock) = ledger();
        let patient = WalletIdentity::new("0xpatient");
        let doctor = WalletIdentity::new("0xdoctor");

        let tx = ledger.submit(&patient, 0, create_record_op(&patient)).await.unwrap();
        assert_matches!(settle(&ledger, &tx).await, TxStatus::Confirmed(_));

        // One-hour consent.
        let tx = ledger
            .submit(
                &patient,
                1,
                LedgerOp::GrantConsent {
                    grantor: patient.clone(),
                    grantee: doctor.clone(),
                    scope: ConsentScope::records([RecordId::new(1)]),
                    access_kind: AccessKind::Read,
                    purpose: "checkup".into(),
                    duration_secs: 3_600,
                },
            )
            .await
            .unwrap();
        assert_matches!(settle(&ledger, &tx).await, TxStatus::Confirmed(_));

        let access_op = LedgerOp::RecordAccess {
            record_id: RecordId::new(1),
            accessor: doctor.clone(),
            access_kind: AccessKind::Read,
            purpose: "checkup".into(),
            fields_accessed: vec![],
        };

        let tx = ledger.submit(&doctor, 0, access_op.clone()).await.unwrap();
        assert_matches!(settle(&ledger, &tx).await, TxStatus::Confirmed(_));
        assert_eq!(ledger.access_log(RecordId::new(1)).await.unwrap().len(), 1);

        // Past expiry the stored grant is unchanged but access reverts.
        clock.advance(3_601);
        let tx = ledger.submit(&doctor, 1, access_op).await.unwrap();
        assert_matches!(
            settle(&ledger, &tx).await,
            TxStatus::Reverted(RevertReason::InvalidConsent(_))
        );
        assert_eq!(ledger.access_log(RecordId::new(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fault_injection_covers_reject_revert_and_stall() {
        let (ledger, _clock) = ledger();
        let owner = WalletIdentity::new("0xpatient");

        ledger.reject_next_submission("node refused").await;
        let err = ledger.submit(&owner, 0, create_record_op(&owner)).await.unwrap_err();
        assert_matches!(err, HealthchainError::LedgerRejected { .. });

        ledger.revert_next("simulated precondition failure").await;
        let tx = ledger.submit(&owner, 0, create_record_op(&owner)).await.unwrap();
        assert_matches!(settle(&ledger, &tx).await, TxStatus::Reverted(_));

        ledger.stall_next();
        let tx = ledger.submit(&owner, 1, create_record_op(&owner)).await.unwrap();
        for _ in 0..10 {
            assert_eq!(ledger.transaction_status(&tx).await.unwrap(), TxStatus::Pending);
        }
    }

    #[tokio::test]
    async fn confirmed_entries_are_broadcast() {
        let (ledger, _clock) = ledger();
        let owner = WalletIdentity::new("0xpatient");
        let mut events = ledger.subscribe();

        let tx = ledger.submit(&owner, 0, create_record_op(&owner)).await.unwrap();
        let confirmation = assert_matches!(settle(&ledger, &tx).await, TxStatus::Confirmed(c) => c);

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            LedgerEvent::RecordCreated {
                record_id: RecordId::new(1),
                owner,
                tx_ref: confirmation.tx_ref,
            }
        );
    }
}
