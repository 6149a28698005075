//! # Healthchain Coordinator
//!
//! Submits ledger-mutating operations and tracks them to confirmation.
//!
//! Each submitted operation moves through `Submitted → Pending →
//! {Confirmed, Failed}`. Confirmation is polled, never pushed: the
//! coordinator re-checks ledger inclusion on a capped exponential backoff
//! schedule bounded by the caller's deadline, and distinguishes a
//! [`Timeout`](healthchain_core::HealthchainError::Timeout) (outcome
//! unknown) from a revert (included and rejected, never retried).
//!
//! Submission is serialized per signing identity: a per-identity lock spans
//! the nonce fetch and the submit so concurrent callers never collide on a
//! sequence number. This is the only mutual-exclusion domain in the
//! subsystem.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The coordinator and its confirmation schedule
pub mod coordinator;

pub use coordinator::{ConfirmationConfig, Receipt, TxCoordinator, TxHandle, TxState};
