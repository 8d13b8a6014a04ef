//! Token ledger: the serialized balance state settlement runs against.
//!
//! Tracks per-(holder, token) balances in raw base units. Native value is the
//! token at [`relayfill_types::constants::NATIVE_ASSET`]. Every mutation is
//! checked: either it succeeds in full or the balances are unchanged.
//!
//! While a [`Checkpoint`] is open, mutations are journaled so the whole group
//! can be reverted exactly.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use relayfill_types::{RelayError, Result};

use crate::supply::SupplyConservation;

/// A reversible ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JournalEntry {
    Mint {
        token: Address,
        to: Address,
        amount: U256,
    },
    Burn {
        token: Address,
        from: Address,
        amount: U256,
    },
    Transfer {
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    },
}

/// Position in the journal returned by [`TokenLedger::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a checkpoint must be committed or reverted"]
pub struct Checkpoint(usize);

/// Balances for every account the engine interacts with.
#[derive(Debug, Default)]
pub struct TokenLedger {
    /// Per-(holder, token) balances.
    balances: HashMap<(Address, Address), U256>,
    /// Issuance totals for the conservation check.
    supply: SupplyConservation,
    /// Mutations since the outermost open checkpoint.
    journal: Vec<JournalEntry>,
    /// Number of checkpoints not yet committed or reverted.
    open_checkpoints: usize,
}

impl TokenLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `token` held by `holder`.
    #[must_use]
    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(holder, token))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Create `amount` of `token` in `to`'s account.
    ///
    /// # Errors
    /// Returns [`RelayError::BalanceOverflow`] if the balance would exceed
    /// 256 bits.
    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<()> {
        self.credit(token, to, amount)?;
        self.supply.record_mint(token, amount);
        self.record(JournalEntry::Mint { token, to, amount });
        Ok(())
    }

    /// Destroy `amount` of `token` from `from`'s account.
    ///
    /// # Errors
    /// Returns [`RelayError::InsufficientBalance`] if `from` holds less.
    pub fn burn(&mut self, token: Address, from: Address, amount: U256) -> Result<()> {
        self.debit(token, from, amount)?;
        self.supply.record_burn(token, amount);
        self.record(JournalEntry::Burn {
            token,
            from,
            amount,
        });
        Ok(())
    }

    /// Move `amount` of `token` from `from` to `to`.
    ///
    /// # Errors
    /// Returns [`RelayError::InsufficientBalance`] if `from` holds less than
    /// `amount`; nothing moves in that case.
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(RelayError::InsufficientBalance {
                token,
                holder: from,
                needed: amount,
                available,
            });
        }
        if amount.is_zero() || from == to {
            return Ok(());
        }
        // Check the credit side before touching the debit side.
        self.balance_of(token, to)
            .checked_add(amount)
            .ok_or(RelayError::BalanceOverflow { token })?;
        self.debit(token, from, amount)?;
        self.credit(token, to, amount)?;
        self.record(JournalEntry::Transfer {
            token,
            from,
            to,
            amount,
        });
        Ok(())
    }

    /// Sum of every holder's balance of `token`.
    #[must_use]
    pub fn total_supply(&self, token: Address) -> U256 {
        self.balances
            .iter()
            .filter(|((_, t), _)| *t == token)
            .fold(U256::ZERO, |acc, (_, bal)| acc.saturating_add(*bal))
    }

    /// Verify supply conservation for `token`.
    pub fn verify_supply(&self, token: Address) -> Result<()> {
        self.supply.verify(token, self.total_supply(token))
    }

    #[must_use]
    pub fn supply(&self) -> &SupplyConservation {
        &self.supply
    }

    // -----------------------------------------------------------------
    // Journal
    // -----------------------------------------------------------------

    /// Open a checkpoint. Every mutation from here on can be undone with
    /// [`TokenLedger::revert_to`].
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.open_checkpoints += 1;
        Checkpoint(self.journal.len())
    }

    /// Undo every mutation made since `checkpoint`, newest first.
    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        let undone = self.journal.len().saturating_sub(checkpoint.0);
        while self.journal.len() > checkpoint.0 {
            if let Some(entry) = self.journal.pop() {
                self.undo(entry);
            }
        }
        self.close_checkpoint();
        tracing::debug!(entries = undone, "Ledger reverted to checkpoint");
    }

    /// Keep every mutation made since `checkpoint`. The journal is discarded
    /// once the outermost checkpoint commits.
    pub fn commit(&mut self, checkpoint: Checkpoint) {
        debug_assert!(checkpoint.0 <= self.journal.len());
        self.close_checkpoint();
    }

    /// Whether a checkpoint is currently open.
    #[must_use]
    pub fn in_checkpoint(&self) -> bool {
        self.open_checkpoints > 0
    }

    fn close_checkpoint(&mut self) {
        self.open_checkpoints = self.open_checkpoints.saturating_sub(1);
        if self.open_checkpoints == 0 {
            self.journal.clear();
        }
    }

    fn record(&mut self, entry: JournalEntry) {
        if self.open_checkpoints > 0 {
            self.journal.push(entry);
        }
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Mint { token, to, amount } => {
                self.force_debit(token, to, amount);
                self.supply.unrecord_mint(token, amount);
            }
            JournalEntry::Burn {
                token,
                from,
                amount,
            } => {
                self.force_credit(token, from, amount);
                self.supply.unrecord_burn(token, amount);
            }
            JournalEntry::Transfer {
                token,
                from,
                to,
                amount,
            } => {
                self.force_debit(token, to, amount);
                self.force_credit(token, from, amount);
            }
        }
    }

    // -----------------------------------------------------------------
    // Raw balance arithmetic
    // -----------------------------------------------------------------

    fn credit(&mut self, token: Address, holder: Address, amount: U256) -> Result<()> {
        let entry = self.balances.entry((holder, token)).or_insert(U256::ZERO);
        *entry = entry
            .checked_add(amount)
            .ok_or(RelayError::BalanceOverflow { token })?;
        Ok(())
    }

    fn debit(&mut self, token: Address, holder: Address, amount: U256) -> Result<()> {
        let available = self.balance_of(token, holder);
        let remaining = available
            .checked_sub(amount)
            .ok_or(RelayError::InsufficientBalance {
                token,
                holder,
                needed: amount,
                available,
            })?;
        self.balances.insert((holder, token), remaining);
        Ok(())
    }

    // Undo paths replay a mutation that already succeeded in the other
    // direction, so they cannot underflow or overflow.
    fn force_credit(&mut self, token: Address, holder: Address, amount: U256) {
        let entry = self.balances.entry((holder, token)).or_insert(U256::ZERO);
        *entry = entry.saturating_add(amount);
    }

    fn force_debit(&mut self, token: Address, holder: Address, amount: U256) {
        let entry = self.balances.entry((holder, token)).or_insert(U256::ZERO);
        *entry = entry.saturating_sub(amount);
    }
}
