//! # relayfill-settlement
//!
//! Settles signed relay orders: a filler supplies an opaque router payload,
//! the engine runs it on the order's behalf and enforces the outcome.
//!
//! ## Settlement steps
//!
//! 1. Validate the order, its signature, its deadline and the payload
//! 2. Reserve the order id in the replay guard (no double-fill)
//! 3. Pull the input from the funder into custody
//! 4. Call the router, approved for exactly the input amount
//! 5. Sweep custodied output to the recipient, refund residual input
//! 6. Check delivered output against the order's minimum
//! 7. Check supply conservation and that custody is back at its baseline
//! 8. Commit the replay reservation, then the ledger journal
//!
//! Any failure reverts the ledger journal and releases the reservation:
//! a failed settlement leaves no trace.

pub mod engine;
pub mod replay;
pub mod store;

pub use engine::SettlementEngine;
pub use replay::{ReplayGuard, Reservation};
pub use store::{FileReplayStore, MemoryReplayStore, ReplayStore};
