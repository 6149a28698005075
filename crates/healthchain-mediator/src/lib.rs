//! # Healthchain Mediator
//!
//! The orchestrator gating every record read and write through consent
//! validation and audit recording.
//!
//! A write encrypts the payload, stores the ciphertext content-addressed,
//! and registers a ledger pointer; the object key is returned to the owner
//! and never persisted here. A read validates consent and scope before any
//! blob traffic, decrypts with the caller-supplied key, and releases
//! plaintext only together with an audit event backed by a confirmed ledger
//! transaction. If the audit write does not confirm, the already-decrypted
//! plaintext is discarded: audit-before-release is the core correctness
//! property of this subsystem.
//!
//! Dependencies are explicit injected clients shared by reference; the
//! mediator is safe for concurrent use, and the only serialization anywhere
//! below it is the coordinator's per-identity nonce discipline.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The access mediator and its result types
pub mod mediator;

pub use mediator::{AccessGrant, AccessMediator, StoredRecord};
