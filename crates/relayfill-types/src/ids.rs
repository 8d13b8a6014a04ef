//! Identifiers used throughout relayfill.
//!
//! Order ids are content-derived (SHA-256 over the order fields) so every
//! party computes the same id for the same intent. Receipt ids use UUIDv7 for
//! time-ordered sorting.

use std::fmt;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Content-derived order identifier (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OrderId(pub [u8; 32]);

impl OrderId {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First four bytes as hex, for compact log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 64-character hex string (optional `0x` prefix).
    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = hex::decode(s.strip_prefix("0x").unwrap_or(s)).ok()?;
        let bytes: [u8; 32] = raw.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// ReceiptId
// ---------------------------------------------------------------------------

/// Unique identifier for a settlement receipt. Uses UUIDv7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ReceiptId(pub Uuid);

impl ReceiptId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ReceiptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rcpt:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Address derivation
// ---------------------------------------------------------------------------

/// Derive the account address controlled by an ed25519 verifying key:
/// the last 20 bytes of `SHA-256(key)`.
#[must_use]
pub fn address_from_verifying_key(key: &[u8; 32]) -> Address {
    let hash = Sha256::digest(key);
    Address::from_slice(&hash[12..])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
