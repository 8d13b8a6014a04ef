//! # relayfill-ledger
//!
//! Balance state for the settlement core.
//!
//! ## Architecture
//!
//! 1. **TokenLedger**: per-(holder, token) balances with a revertible journal
//! 2. **SupplyConservation**: per-token `minted - burned` totals
//! 3. **CustodyRecord**: the engine's own balances before/after a router call
//!
//! ## Atomicity
//!
//! ```text
//! checkpoint() → transfer()* → revert_to(cp) | commit(cp)
//! ```
//!
//! A settlement opens a checkpoint, performs every transfer through the
//! journal, and either commits or reverts all of them at once.

pub mod custody;
pub mod ledger;
pub mod supply;

pub use custody::{CustodyEntry, CustodyRecord};
pub use ledger::{Checkpoint, TokenLedger};
pub use supply::SupplyConservation;
