//! Unified error system for the record access subsystem.
//!
//! Every failure surfaces as a distinct, named condition; conditions are
//! never collapsed into a generic "operation failed". The retry policy is
//! centralized in [`HealthchainError::is_retryable`]: only transient
//! storage/confirmation conditions may cross a retry boundary, and only for
//! idempotent operations.

use serde::{Deserialize, Serialize};

/// Unified error type for all subsystem operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum HealthchainError {
    /// Content-hash or authentication-tag mismatch. Always fatal.
    #[error("Integrity failure: {message}")]
    Integrity {
        /// What failed verification
        message: String,
    },

    /// Blob not present in the store. Not retried.
    #[error("Not found: {message}")]
    NotFound {
        /// What was missing
        message: String,
    },

    /// Blob store backend unreachable or failing. Retried with backoff.
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Backend failure detail
        message: String,
    },

    /// The ledger rejected the operation before inclusion.
    #[error("Ledger rejected: {message}")]
    LedgerRejected {
        /// Rejection detail
        message: String,
    },

    /// Signer is not authorized for the attempted operation.
    #[error("Not authorized: {message}")]
    NotAuthorized {
        /// Authorization failure detail
        message: String,
    },

    /// The operation was included but the ledger rejected its preconditions.
    #[error("Transaction reverted: {reason}")]
    Reverted {
        /// Ledger-side revert reason
        reason: String,
    },

    /// Confirmation not observed within the caller's budget.
    ///
    /// The operation's true outcome is unknown; retrying is the caller's
    /// decision.
    #[error("Timeout: {message}")]
    Timeout {
        /// What was being awaited
        message: String,
    },

    /// Consent invalid (missing, revoked, expired, or wrong grantee).
    #[error("Consent denied: {message}")]
    ConsentDenied {
        /// Denial detail
        message: String,
    },

    /// Requested record is outside the consent grant's scope.
    #[error("Scope violation: {message}")]
    ScopeViolation {
        /// Scope mismatch detail
        message: String,
    },

    /// Data-layer access succeeded but the audit write did not confirm.
    ///
    /// Already-fetched plaintext is discarded; no data leaves the mediator
    /// without a confirmed audit trail.
    #[error("Audit failure: {message}")]
    AuditFailure {
        /// Confirmation failure detail
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Serialization failure detail
        message: String,
    },

    /// Invalid input or configuration.
    #[error("Invalid: {message}")]
    Invalid {
        /// Validation failure detail
        message: String,
    },

    /// Internal invariant violation.
    #[error("Internal error: {message}")]
    Internal {
        /// Internal failure detail
        message: String,
    },
}

/// Result alias using the unified error type
pub type Result<T> = std::result::Result<T, HealthchainError>;

impl HealthchainError {
    /// Create an integrity failure error
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a storage unavailable error
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Create a ledger rejected error
    pub fn ledger_rejected(message: impl Into<String>) -> Self {
        Self::LedgerRejected {
            message: message.into(),
        }
    }

    /// Create a not authorized error
    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::NotAuthorized {
            message: message.into(),
        }
    }

    /// Create a reverted error
    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::Reverted {
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a consent denied error
    pub fn consent_denied(message: impl Into<String>) -> Self {
        Self::ConsentDenied {
            message: message.into(),
        }
    }

    /// Create a scope violation error
    pub fn scope_violation(message: impl Into<String>) -> Self {
        Self::ScopeViolation {
            message: message.into(),
        }
    }

    /// Create an audit failure error
    pub fn audit_failure(message: impl Into<String>) -> Self {
        Self::AuditFailure {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the condition may cross a retry boundary.
    ///
    /// Integrity, authorization, and consent failures are terminal: retrying
    /// an unauthorized or tampered operation cannot succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. } | Self::Timeout { .. })
    }
}
