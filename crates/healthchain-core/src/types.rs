//! Strongly typed identifiers and closed enumerations.

use serde::{Deserialize, Serialize};

/// Cryptographic signing identity used for ledger operations.
///
/// Exactly one identity is active per session context; the transaction
/// coordinator serializes submissions per identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletIdentity(String);

impl WalletIdentity {
    /// Create a new wallet identity from its address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Borrow the underlying address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WalletIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Display for WalletIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger-assigned identifier of a stored record pointer.
///
/// Monotonic per ledger; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Create a record identifier from its raw ledger value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Return the raw identifier.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger-assigned identifier of a consent grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsentId(u64);

impl ConsentId {
    /// Create a consent identifier from its raw ledger value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Return the raw identifier.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConsentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content address of a stored blob: the 32-byte digest of the stored bytes.
///
/// Doubles as the storage key and the integrity reference. Recomputed on
/// every fetch; a mismatch is a fatal integrity failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress([u8; 32]);

impl ContentAddress {
    /// Construct from a raw digest.
    pub const fn from_bytes(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Borrow the raw digest bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as lowercase hex, the form used at API boundaries.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let bytes = hex::decode(s).map_err(|e| {
            crate::HealthchainError::invalid(format!("malformed content address: {e}"))
        })?;
        let digest: [u8; 32] = bytes.try_into().map_err(|_| {
            crate::HealthchainError::invalid("content address must be 32 bytes")
        })?;
        Ok(Self(digest))
    }
}

impl std::fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Reference to a confirmed ledger transaction.
///
/// Non-empty on every audit event the mediator returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerTxRef(String);

impl LedgerTxRef {
    /// Create a transaction reference from its hash string.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Borrow the underlying hash string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the reference is empty (never true for confirmed receipts).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for LedgerTxRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed enumeration of medical record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// General medical report
    Report,
    /// Laboratory result
    LabResult,
    /// Prescription
    Prescription,
    /// Imaging (X-ray, MRI, ...)
    Imaging,
    /// Vaccination record
    Vaccine,
    /// Allergy information
    Allergy,
    /// Emergency contact sheet
    EmergencyContact,
}

impl RecordKind {
    /// Stable wire code used on the ledger.
    pub const fn wire_code(self) -> u8 {
        match self {
            Self::Report => 0,
            Self::LabResult => 1,
            Self::Prescription => 2,
            Self::Imaging => 3,
            Self::Vaccine => 4,
            Self::Allergy => 5,
            Self::EmergencyContact => 6,
        }
    }

    /// Decode a wire code.
    pub const fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Report),
            1 => Some(Self::LabResult),
            2 => Some(Self::Prescription),
            3 => Some(Self::Imaging),
            4 => Some(Self::Vaccine),
            5 => Some(Self::Allergy),
            6 => Some(Self::EmergencyContact),
            _ => None,
        }
    }
}

/// Kind of access a consent grant authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    /// Read-only access
    Read,
    /// Write access
    Write,
    /// Emergency access
    Emergency,
}

impl AccessKind {
    /// Stable wire code used on the ledger.
    pub const fn wire_code(self) -> u8 {
        match self {
            Self::Read => 0,
            Self::Write => 1,
            Self::Emergency => 2,
        }
    }

    /// Decode a wire code.
    pub const fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Read),
            1 => Some(Self::Write),
            2 => Some(Self::Emergency),
            _ => None,
        }
    }

    /// Whether a grant of this kind permits reading record payloads.
    pub const fn permits_read(self) -> bool {
        matches!(self, Self::Read | Self::Emergency)
    }

    /// Whether a grant of this kind permits writing records.
    pub const fn permits_write(self) -> bool {
        matches!(self, Self::Write | Self::Emergency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_round_trip() {
        for code in 0u8..=6 {
            let kind = RecordKind::from_wire_code(code).unwrap();
            assert_eq!(kind.wire_code(), code);
        }
        assert!(RecordKind::from_wire_code(7).is_none());

        for code in 0u8..=2 {
            let kind = AccessKind::from_wire_code(code).unwrap();
            assert_eq!(kind.wire_code(), code);
        }
        assert!(AccessKind::from_wire_code(3).is_none());
    }

    #[test]
    fn content_address_hex_round_trip() {
        let address = ContentAddress::from_bytes([0xab; 32]);
        let parsed = ContentAddress::from_hex(&address.to_hex()).unwrap();
        assert_eq!(address, parsed);

        assert!(ContentAddress::from_hex("abcd").is_err());
        assert!(ContentAddress::from_hex("zz").is_err());
    }

    #[test]
    fn access_kind_permissions() {
        assert!(AccessKind::Read.permits_read());
        assert!(!AccessKind::Read.permits_write());
        assert!(AccessKind::Write.permits_write());
        assert!(!AccessKind::Write.permits_read());
        assert!(AccessKind::Emergency.permits_read());
        assert!(AccessKind::Emergency.permits_write());
    }
}
