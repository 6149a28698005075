//! Consent grants, scopes, and the validity state machine.
//!
//! A grant is stored on the ledger as `Granted` and moves to `Revoked` at
//! most once, only by its grantor. Expiry is never a stored transition:
//! validation derives it from `expires_at` at evaluation time, so a grant
//! whose window has passed stays `Granted` on the ledger but validates as
//! invalid.

use crate::types::{AccessKind, ConsentId, RecordId, RecordKind, WalletIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stored status of a consent grant.
///
/// There is deliberately no `Expired` variant; expiry is derived, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentStatus {
    /// Initial state on creation
    Granted,
    /// Irreversibly revoked by the grantor
    Revoked,
}

/// The subset of records a consent grant authorizes access to.
///
/// Fixed at creation. Changing scope means issuing a new grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentScope {
    /// An explicit set of record identifiers
    Records(BTreeSet<RecordId>),
    /// Every record of the owner with the given kind
    AllOfKind(RecordKind),
}

impl ConsentScope {
    /// Scope over an explicit list of records.
    pub fn records(ids: impl IntoIterator<Item = RecordId>) -> Self {
        Self::Records(ids.into_iter().collect())
    }

    /// Whether the scope names no records at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Records(ids) => ids.is_empty(),
            Self::AllOfKind(_) => false,
        }
    }

    /// Whether a record with the given id and kind falls inside this scope.
    pub fn covers(&self, record_id: RecordId, record_kind: RecordKind) -> bool {
        match self {
            Self::Records(ids) => ids.contains(&record_id),
            Self::AllOfKind(kind) => *kind == record_kind,
        }
    }
}

/// A time-bounded, revocable, purpose-scoped consent grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentGrant {
    /// Ledger-assigned identifier
    pub consent_id: ConsentId,
    /// Identity that issued the grant (the patient)
    pub grantor: WalletIdentity,
    /// Identity the grant authorizes (the provider)
    pub grantee: WalletIdentity,
    /// Kind of access authorized
    pub access_kind: AccessKind,
    /// Records the grant covers; fixed at creation
    pub scope: ConsentScope,
    /// Free-text justification; required, non-empty
    pub purpose: String,
    /// Ledger timestamp of issuance (Unix seconds)
    pub issued_at: u64,
    /// Expiry instant; `None` means valid until revoked
    pub expires_at: Option<u64>,
    /// Stored status
    pub status: ConsentStatus,
}

impl ConsentGrant {
    /// Whether the grant's expiry window has passed at `now`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }

    /// Whether the grant is valid at `now`: stored status is `Granted` and
    /// the derived-expiry rule does not invalidate it.
    pub fn is_valid_at(&self, now: u64) -> bool {
        self.status == ConsentStatus::Granted && !self.is_expired_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(expires_at: Option<u64>, status: ConsentStatus) -> ConsentGrant {
        ConsentGrant {
            consent_id: ConsentId::new(1),
            grantor: WalletIdentity::new("0xpatient"),
            grantee: WalletIdentity::new("0xdoctor"),
            access_kind: AccessKind::Read,
            scope: ConsentScope::records([RecordId::new(1)]),
            purpose: "annual checkup".to_string(),
            issued_at: 100,
            expires_at,
            status,
        }
    }

    #[test]
    fn expiry_is_derived_not_stored() {
        let g = grant(Some(200), ConsentStatus::Granted);

        assert!(g.is_valid_at(150));
        assert!(g.is_valid_at(200));
        // Past expiry the stored status is still Granted but validation fails.
        assert!(!g.is_valid_at(201));
        assert_eq!(g.status, ConsentStatus::Granted);
    }

    #[test]
    fn absent_expiry_means_valid_until_revoked() {
        let g = grant(None, ConsentStatus::Granted);
        assert!(g.is_valid_at(u64::MAX));

        let revoked = grant(None, ConsentStatus::Revoked);
        assert!(!revoked.is_valid_at(0));
    }

    #[test]
    fn scope_coverage() {
        let explicit = ConsentScope::records([RecordId::new(1), RecordId::new(3)]);
        assert!(explicit.covers(RecordId::new(1), RecordKind::Report));
        assert!(!explicit.covers(RecordId::new(2), RecordKind::Report));

        let by_kind = ConsentScope::AllOfKind(RecordKind::LabResult);
        assert!(by_kind.covers(RecordId::new(99), RecordKind::LabResult));
        assert!(!by_kind.covers(RecordId::new(99), RecordKind::Imaging));

        assert!(ConsentScope::records([]).is_empty());
        assert!(!by_kind.is_empty());
    }
}
