//! # relayfill-types
//!
//! Shared types, errors, and configuration for the **relayfill** settlement
//! core.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`ReceiptId`], address derivation helpers
//! - **Order model**: [`Order`], [`SignedOrder`]
//! - **Fill payload**: [`FillPayload`], the opaque router instruction set
//! - **Token metadata**: [`TokenInfo`]
//! - **Receipts**: [`SettlementReceipt`]
//! - **Configuration**: [`EngineConfig`], [`ReplayStoreConfig`]
//! - **Errors**: [`RelayError`] with `RF_ERR_` prefix codes
//! - **Constants**: domain tags, limits and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod order;
pub mod payload;
pub mod receipt;
pub mod token;

// Re-export all primary types at crate root for ergonomic imports:
//   use relayfill_types::{Order, SignedOrder, FillPayload, RelayError, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use order::*;
pub use payload::*;
pub use receipt::*;
pub use token::*;

pub use alloy_primitives::{Address, Bytes, U256};

// Constants are accessed via `relayfill_types::constants::FOO`
// (not re-exported to avoid name collisions).
