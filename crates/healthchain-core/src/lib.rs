//! # Healthchain Core
//!
//! Shared domain types for the consent-gated record access subsystem.
//!
//! This crate defines the entities the rest of the workspace operates on:
//! identifiers, record pointers, consent grants with their validity rules,
//! audit events, the unified error taxonomy, and the injectable clock used
//! to evaluate time-dependent state.
//!
//! It holds no I/O and no async code. Consent validity, scope coverage, and
//! access-kind permission checks are pure functions over owned data so they
//! can be exercised without a ledger or a store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Strongly typed identifiers and closed enumerations
pub mod types;

/// Consent grants, scopes, and the validity state machine
pub mod consent;

/// Record pointers owned by the ledger
pub mod record;

/// Append-only audit events for mediated access
pub mod audit;

/// Unified error system
pub mod errors;

/// Injectable wall-clock time
pub mod time;

pub use audit::AccessEvent;
pub use consent::{ConsentGrant, ConsentScope, ConsentStatus};
pub use errors::{HealthchainError, Result};
pub use record::RecordPointer;
pub use time::{Clock, ManualClock, SystemClock};
pub use types::{
    AccessKind, ConsentId, ContentAddress, LedgerTxRef, RecordId, RecordKind, WalletIdentity,
};
