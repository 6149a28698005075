//! # Healthchain Ledger
//!
//! Typed operations against an append-only consent ledger.
//!
//! The ledger itself is an external collaborator: this crate consumes it
//! through the narrow [`Ledger`] trait (submit, poll status, read-only
//! queries, event subscription) and never assumes a concrete runtime. The
//! in-process [`InMemoryLedger`] implements the same confirmation semantics
//! as a remote node (pending until polled through, per-signer nonce
//! discipline, reverts with typed reasons) so the coordinator's state
//! machine is testable without a network.
//!
//! [`ConsentLedgerClient`] is the typed surface the mediator uses: validated
//! operation builders for the four mutating entries, pure-read consent
//! validation with derived expiry, and the query/event surface the caller
//! layer consumes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Ledger operations (the entry kinds recorded on chain)
pub mod entry;

/// The abstract ledger boundary
pub mod ledger;

/// In-process ledger implementation
pub mod memory;

/// Typed client over any ledger
pub mod client;

/// Ledger events and subscription streams
pub mod events;

pub use client::ConsentLedgerClient;
pub use entry::LedgerOp;
pub use events::{EventStream, LedgerEvent, LedgerEventKind};
pub use ledger::{AssignedId, Confirmation, FeeEstimate, Ledger, RevertReason, TxId, TxStatus};
pub use memory::{InMemoryLedger, InMemoryLedgerConfig};
