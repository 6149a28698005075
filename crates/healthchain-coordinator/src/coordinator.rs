//! The coordinator and its confirmation schedule.

use healthchain_core::{HealthchainError, LedgerTxRef, Result, WalletIdentity};
use healthchain_ledger::{AssignedId, Ledger, LedgerOp, RevertReason, TxId, TxStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use uuid::Uuid;

/// Polling schedule for confirmation checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Delay before the first status poll, in milliseconds
    pub initial_poll_ms: u64,
    /// Backoff multiplier applied per poll
    pub backoff_multiplier: f64,
    /// Cap on the delay between polls, in milliseconds
    pub max_poll_ms: u64,
    /// Bound on total status polls per wait
    pub max_polls: u32,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            initial_poll_ms: 100,
            backoff_multiplier: 2.0,
            max_poll_ms: 5_000,
            max_polls: 10,
        }
    }
}

impl ConfirmationConfig {
    fn poll_delay(&self, poll: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(poll as i32);
        let ms = (self.initial_poll_ms as f64 * factor).min(self.max_poll_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

/// Coordinator-side state of a submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Handed to the ledger, no status observed yet
    Submitted,
    /// Observed pending, inclusion not yet confirmed
    Pending,
    /// Included and applied
    Confirmed,
    /// Included and reverted, or confirmation given up on
    Failed,
}

/// Handle to a submitted operation awaiting confirmation.
#[derive(Debug, Clone)]
pub struct TxHandle {
    /// Coordinator-local handle identifier
    pub handle_id: Uuid,
    /// Identity that signed the operation
    pub signer: WalletIdentity,
    /// Ledger transaction this handle tracks
    pub tx_id: TxId,
    /// Short name of the submitted operation
    pub op_summary: &'static str,
}

/// Confirmation receipt for a durable operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Confirmed transaction reference
    pub tx_ref: LedgerTxRef,
    /// Ledger timestamp of inclusion (Unix seconds)
    pub timestamp: u64,
    /// Identifier assigned by the operation, if it creates one
    pub assigned: Option<AssignedId>,
    /// Identity that signed the operation
    pub signer: WalletIdentity,
}

/// Submits operations with per-identity nonce discipline and polls them to
/// confirmation.
pub struct TxCoordinator<L> {
    ledger: Arc<L>,
    config: ConfirmationConfig,
    // One lock per signing identity; held across nonce fetch + submit.
    signer_locks: Mutex<HashMap<WalletIdentity, Arc<Mutex<()>>>>,
}

impl<L: Ledger> TxCoordinator<L> {
    /// Create a coordinator with the default polling schedule.
    pub fn new(ledger: Arc<L>) -> Self {
        Self::with_config(ledger, ConfirmationConfig::default())
    }

    /// Create a coordinator with an explicit polling schedule.
    pub fn with_config(ledger: Arc<L>, config: ConfirmationConfig) -> Self {
        Self {
            ledger,
            config,
            signer_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Submit an operation for inclusion.
    ///
    /// Fee estimation runs first; its failure is reported as-is, never
    /// worked around with a higher fee. The per-identity lock guarantees
    /// strictly increasing nonces even under concurrent callers.
    pub async fn submit(&self, signer: &WalletIdentity, op: LedgerOp) -> Result<TxHandle> {
        let fee = self.ledger.estimate_fee(&op).await?;
        debug!(
            signer = %signer,
            op = op.summary(),
            gas_units = fee.gas_units,
            "fee estimated"
        );

        let signer_lock = {
            let mut locks = self.signer_locks.lock().await;
            // Sweep locks no in-flight submission holds, so the map does not
            // grow with every identity ever seen.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(signer.clone()).or_default())
        };
        let _guard = signer_lock.lock().await;

        let nonce = self.ledger.next_nonce(signer).await?;
        let op_summary = op.summary();
        let tx_id = self.ledger.submit(signer, nonce, op).await?;
        debug!(signer = %signer, nonce, %tx_id, op = op_summary, "operation submitted");

        Ok(TxHandle {
            handle_id: Uuid::new_v4(),
            signer: signer.clone(),
            tx_id,
            op_summary,
        })
    }

    /// Poll a submitted operation to its outcome within a deadline.
    ///
    /// Returns the receipt on confirmation. A revert is terminal and maps
    /// to `NotAuthorized` or `Reverted`; exhausting the deadline or the
    /// poll budget maps to `Timeout`, meaning the true outcome is unknown
    /// and the operation must not be treated as completed.
    pub async fn await_confirmation(&self, handle: &TxHandle, deadline: Duration) -> Result<Receipt> {
        timeout(deadline, self.poll_to_outcome(handle))
            .await
            .map_err(|_| {
                warn!(
                    tx = %handle.tx_id,
                    op = handle.op_summary,
                    "confirmation deadline elapsed"
                );
                HealthchainError::timeout(format!(
                    "no confirmation of {} within {:?}",
                    handle.op_summary, deadline
                ))
            })?
    }

    /// Submit and wait for confirmation in one step.
    pub async fn submit_and_confirm(
        &self,
        signer: &WalletIdentity,
        op: LedgerOp,
        deadline: Duration,
    ) -> Result<Receipt> {
        let handle = self.submit(signer, op).await?;
        self.await_confirmation(&handle, deadline).await
    }

    async fn poll_to_outcome(&self, handle: &TxHandle) -> Result<Receipt> {
        let mut state = TxState::Submitted;

        for poll in 0..self.config.max_polls {
            sleep(self.config.poll_delay(poll)).await;

            match self.ledger.transaction_status(&handle.tx_id).await? {
                TxStatus::Pending => {
                    state = TxState::Pending;
                    debug!(tx = %handle.tx_id, poll, ?state, "still pending");
                }
                TxStatus::Confirmed(confirmation) => {
                    debug!(
                        tx = %handle.tx_id,
                        tx_ref = %confirmation.tx_ref,
                        "operation confirmed"
                    );
                    return Ok(Receipt {
                        tx_ref: confirmation.tx_ref,
                        timestamp: confirmation.timestamp,
                        assigned: confirmation.assigned,
                        signer: handle.signer.clone(),
                    });
                }
                TxStatus::Reverted(reason) => {
                    warn!(tx = %handle.tx_id, %reason, "operation reverted");
                    return Err(Self::revert_error(&reason));
                }
            }
        }

        Err(HealthchainError::timeout(format!(
            "poll budget exhausted awaiting {}",
            handle.op_summary
        )))
    }

    fn revert_error(reason: &RevertReason) -> HealthchainError {
        if reason.is_authorization_failure() {
            HealthchainError::not_authorized(reason.to_string())
        } else {
            HealthchainError::reverted(reason.to_string())
        }
    }

    #[cfg(test)]
    async fn signer_lock_count(&self) -> usize {
        self.signer_locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use healthchain_core::{ConsentScope, ContentAddress, ManualClock, RecordId, RecordKind};
    use healthchain_ledger::{ConsentLedgerClient, InMemoryLedger, InMemoryLedgerConfig};

    fn fast_config() -> ConfirmationConfig {
        ConfirmationConfig {
            initial_poll_ms: 1,
            backoff_multiplier: 1.0,
            max_poll_ms: 1,
            max_polls: 8,
        }
    }

    fn setup() -> (Arc<InMemoryLedger>, TxCoordinator<InMemoryLedger>) {
        let clock = Arc::new(ManualClock::starting_at(1_000));
        let ledger = Arc::new(InMemoryLedger::new(clock));
        let coordinator = TxCoordinator::with_config(Arc::clone(&ledger), fast_config());
        (ledger, coordinator)
    }

    fn record_op(owner: &WalletIdentity) -> LedgerOp {
        ConsentLedgerClient::<InMemoryLedger>::create_record_pointer(
            owner,
            ContentAddress::from_bytes([1u8; 32]),
            RecordKind::Report,
        )
    }

    #[tokio::test]
    async fn submit_and_confirm_returns_receipt() {
        let (_ledger, coordinator) = setup();
        let owner = WalletIdentity::new("0xpatient");

        let receipt = coordinator
            .submit_and_confirm(&owner, record_op(&owner), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(!receipt.tx_ref.is_empty());
        assert_eq!(receipt.timestamp, 1_000);
        assert_eq!(receipt.assigned, Some(AssignedId::Record(RecordId::new(1))));
    }

    #[tokio::test]
    async fn stalled_confirmation_times_out_within_deadline() {
        let (ledger, coordinator) = setup();
        let owner = WalletIdentity::new("0xpatient");

        ledger.stall_next();
        let err = coordinator
            .submit_and_confirm(&owner, record_op(&owner), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_matches!(err, HealthchainError::Timeout { .. });
    }

    #[tokio::test]
    async fn poll_budget_bounds_the_wait_even_without_deadline_pressure() {
        let (ledger, coordinator) = setup();
        let owner = WalletIdentity::new("0xpatient");

        ledger.stall_next();
        let err = coordinator
            .submit_and_confirm(&owner, record_op(&owner), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_matches!(err, HealthchainError::Timeout { .. });
    }

    #[tokio::test]
    async fn revert_is_terminal_and_distinct_from_timeout() {
        let (ledger, coordinator) = setup();
        let owner = WalletIdentity::new("0xpatient");

        ledger.revert_next("precondition failed").await;
        let err = coordinator
            .submit_and_confirm(&owner, record_op(&owner), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_matches!(err, HealthchainError::Reverted { .. });
    }

    #[tokio::test]
    async fn authorization_reverts_surface_as_not_authorized() {
        let (_ledger, coordinator) = setup();
        let owner = WalletIdentity::new("0xpatient");
        let intruder = WalletIdentity::new("0xintruder");

        // Intruder signs an op that claims the patient as owner.
        let err = coordinator
            .submit_and_confirm(&intruder, record_op(&owner), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_matches!(err, HealthchainError::NotAuthorized { .. });
    }

    #[tokio::test]
    async fn fee_estimation_failure_is_reported_not_retried() {
        let (ledger, coordinator) = setup();
        let owner = WalletIdentity::new("0xpatient");

        ledger.set_fail_fee_estimation(true);
        let err = coordinator.submit(&owner, record_op(&owner)).await.unwrap_err();
        assert_matches!(err, HealthchainError::LedgerRejected { .. });

        // Nothing was submitted.
        assert_eq!(ledger.next_nonce(&owner).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn idle_signer_locks_are_swept() {
        let (_ledger, coordinator) = setup();
        let first = WalletIdentity::new("0xfirst");
        let second = WalletIdentity::new("0xsecond");

        coordinator
            .submit_and_confirm(&first, record_op(&first), Duration::from_secs(1))
            .await
            .unwrap();
        coordinator
            .submit_and_confirm(&second, record_op(&second), Duration::from_secs(1))
            .await
            .unwrap();

        // The first identity's released lock was dropped by the next submit.
        assert_eq!(coordinator.signer_lock_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_submissions_from_one_identity_never_collide_on_nonce() {
        let (ledger, coordinator) = setup();
        let coordinator = Arc::new(coordinator);
        let owner = WalletIdentity::new("0xpatient");

        let mut joins = Vec::new();
        for _ in 0..8 {
            let coordinator = Arc::clone(&coordinator);
            let owner = owner.clone();
            joins.push(tokio::spawn(async move {
                coordinator
                    .submit_and_confirm(&owner, record_op(&owner), Duration::from_secs(5))
                    .await
            }));
        }

        for join in joins {
            join.await.unwrap().unwrap();
        }
        assert_eq!(ledger.next_nonce(&owner).await.unwrap(), 8);
        assert_eq!(ledger.records_of(&owner).await.unwrap().len(), 8);
    }
}
