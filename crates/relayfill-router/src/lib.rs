//! # relayfill-router
//!
//! The settlement core's single point of contact with an external swap
//! router.
//!
//! ## Architecture
//!
//! - **RouterAdapter**: capability trait with one operation, `execute`. The
//!   core never inspects what a payload means; it only measures balances.
//! - **RouterContext**: the only ledger access a router gets. It reads
//!   balances, pulls from the caller within the granted allowance and moves
//!   funds out of accounts the router controls.
//! - **SimulatedRouter**: an in-process router speaking a subset of the
//!   universal-router command set against constant-rate liquidity. Used for
//!   dry runs and tests.
//! - **PayloadBuilder**: encodes commands for the simulated router into a
//!   [`relayfill_types::FillPayload`].

pub mod adapter;
pub mod commands;
pub mod simulated;

pub use adapter::{RouterAdapter, RouterContext, RouterError};
pub use commands::{PayloadBuilder, RouterCommand};
pub use simulated::SimulatedRouter;
