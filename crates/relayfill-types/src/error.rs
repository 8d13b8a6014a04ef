//! Error types for the relayfill settlement core.
//!
//! All errors use the `RF_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order / payload errors
//! - 2xx: Balance and custody errors
//! - 3xx: Router errors
//! - 4xx: Replay guard errors
//! - 6xx: Settlement errors
//! - 8xx: Security errors
//! - 9xx: General / internal errors

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::OrderId;

/// Central error enum for all relayfill operations.
///
/// Every variant is terminal for the settlement attempt that raised it.
#[derive(Debug, Error)]
pub enum RelayError {
    // =================================================================
    // Order / Payload Errors (1xx)
    // =================================================================
    /// The order failed shape validation (zero amounts, bad addresses, etc.).
    #[error("RF_ERR_100: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// The order's deadline has passed.
    #[error("RF_ERR_101: Order expired: deadline {deadline}, now {now}")]
    OrderExpired {
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// The ed25519 signature on the order didn't verify, or the signer is
    /// not the requester.
    #[error("RF_ERR_102: Order signature verification failed")]
    InvalidSignature,

    /// The fill payload is malformed or carries a disallowed native value.
    #[error("RF_ERR_103: Invalid fill payload: {reason}")]
    InvalidPayload { reason: String },

    // =================================================================
    // Balance / Custody Errors (2xx)
    // =================================================================
    /// A ledger transfer would overdraw the holder.
    #[error(
        "RF_ERR_200: Insufficient balance of {token} for {holder}: need {needed}, have {available}"
    )]
    InsufficientBalance {
        token: Address,
        holder: Address,
        needed: U256,
        available: U256,
    },

    /// The party funding the order holds less than the input amount.
    #[error("RF_ERR_201: Insufficient input funding from {funder}: need {needed}, have {available}")]
    InsufficientInputFunding {
        funder: Address,
        needed: U256,
        available: U256,
    },

    /// A credit would overflow a 256-bit balance.
    #[error("RF_ERR_202: Balance overflow for {token}")]
    BalanceOverflow { token: Address },

    /// Custody still holds a balance after the sweep step.
    #[error("RF_ERR_203: Custody not cleared: {remaining} of {token} left")]
    CustodyNotCleared { token: Address, remaining: U256 },

    // =================================================================
    // Router Errors (3xx)
    // =================================================================
    /// The external router call failed. The router's internals are opaque,
    /// so every failure collapses into this single signal.
    #[error("RF_ERR_300: Router execution failed: {reason}")]
    RouterExecutionFailed { reason: String },

    // =================================================================
    // Replay Guard Errors (4xx)
    // =================================================================
    /// The order id is already consumed (or reserved by an in-flight fill).
    #[error("RF_ERR_400: Order already filled: {0}")]
    OrderAlreadyFilled(OrderId),

    /// The durable replay store failed to load or append.
    #[error("RF_ERR_401: Replay store error: {0}")]
    Storage(String),

    // =================================================================
    // Settlement Errors (6xx)
    // =================================================================
    /// The recipient received less than the order's minimum output.
    #[error("RF_ERR_600: Slippage violation: delivered {delivered}, minimum {minimum}")]
    SlippageViolation { minimum: U256, delivered: U256 },

    // =================================================================
    // Security Errors (8xx)
    // =================================================================
    /// The caller is not allowed to perform this action.
    #[error("RF_ERR_800: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// Supply conservation invariant violated. Critical safety alert.
    #[error("RF_ERR_801: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("RF_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("RF_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("RF_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk).
    #[error("RF_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, RelayError>;

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
