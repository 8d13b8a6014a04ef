//! Supply conservation invariant checker.
//!
//! Invariant enforced after every settlement:
//! ```text
//! ∀ token: Σ(balances) == Σ(minted) - Σ(burned)
//! ```
//!
//! Settlement only moves balances between accounts. If a settlement changes
//! a token's total, the engine reverts it and raises a critical alert.

use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, U256};
use relayfill_types::{RelayError, Result};

/// Tracks per-token issuance totals.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    /// Total minted per token since genesis.
    minted: HashMap<Address, U256>,
    /// Total burned per token since genesis.
    burned: HashMap<Address, U256>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mint(&mut self, token: Address, amount: U256) {
        let total = self.minted.entry(token).or_insert(U256::ZERO);
        *total = total.saturating_add(amount);
    }

    pub fn record_burn(&mut self, token: Address, amount: U256) {
        let total = self.burned.entry(token).or_insert(U256::ZERO);
        *total = total.saturating_add(amount);
    }

    /// Undo a previously recorded mint (journal revert).
    pub(crate) fn unrecord_mint(&mut self, token: Address, amount: U256) {
        if let Some(total) = self.minted.get_mut(&token) {
            *total = total.saturating_sub(amount);
        }
    }

    /// Undo a previously recorded burn (journal revert).
    pub(crate) fn unrecord_burn(&mut self, token: Address, amount: U256) {
        if let Some(total) = self.burned.get_mut(&token) {
            *total = total.saturating_sub(amount);
        }
    }

    /// Expected total supply: minted - burned.
    #[must_use]
    pub fn expected_supply(&self, token: Address) -> U256 {
        self.total_minted(token)
            .saturating_sub(self.total_burned(token))
    }

    /// Verify that the actual supply matches the expected supply.
    ///
    /// # Errors
    /// Returns [`RelayError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, token: Address, actual_supply: U256) -> Result<()> {
        let expected = self.expected_supply(token);
        if actual_supply != expected {
            return Err(RelayError::SupplyInvariantViolation {
                reason: format!(
                    "Token {token}: actual supply {actual_supply} != expected {expected} \
                     (minted={}, burned={})",
                    self.total_minted(token),
                    self.total_burned(token),
                ),
            });
        }
        Ok(())
    }

    /// All tokens ever minted or burned.
    #[must_use]
    pub fn tracked_tokens(&self) -> Vec<Address> {
        let mut tokens: HashSet<Address> = self.minted.keys().copied().collect();
        tokens.extend(self.burned.keys().copied());
        tokens.into_iter().collect()
    }

    #[must_use]
    pub fn total_minted(&self, token: Address) -> U256 {
        self.minted.get(&token).copied().unwrap_or(U256::ZERO)
    }

    #[must_use]
    pub fn total_burned(&self, token: Address) -> U256 {
        self.burned.get(&token).copied().unwrap_or(U256::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(b: u8) -> Address {
        Address::with_last_byte(b)
    }

    #[test]
    fn empty_supply_is_zero() {
        let sc = SupplyConservation::new();
        assert_eq!(sc.expected_supply(token(1)), U256::ZERO);
        assert!(sc.verify(token(1), U256::ZERO).is_ok());
    }

    #[test]
    fn mints_and_burns_net_out() {
        let mut sc = SupplyConservation::new();
        sc.record_mint(token(1), U256::from(1000u64));
        sc.record_mint(token(1), U256::from(500u64));
        sc.record_burn(token(1), U256::from(300u64));
        assert_eq!(sc.expected_supply(token(1)), U256::from(1200u64));
        assert!(sc.verify(token(1), U256::from(1200u64)).is_ok());
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let mut sc = SupplyConservation::new();
        sc.record_mint(token(1), U256::from(10u64));
        let err = sc.verify(token(1), U256::from(11u64)).unwrap_err();
        assert!(matches!(err, RelayError::SupplyInvariantViolation { .. }));
    }

    #[test]
    fn unrecord_reverses_mint() {
        let mut sc = SupplyConservation::new();
        sc.record_mint(token(1), U256::from(10u64));
        sc.unrecord_mint(token(1), U256::from(10u64));
        assert_eq!(sc.expected_supply(token(1)), U256::ZERO);
    }

    #[test]
    fn tokens_tracked_independently() {
        let mut sc = SupplyConservation::new();
        sc.record_mint(token(1), U256::from(5u64));
        sc.record_mint(token(2), U256::from(50u64));
        assert_eq!(sc.tracked_tokens().len(), 2);
        assert!(sc.verify(token(1), U256::from(5u64)).is_ok());
        assert!(sc.verify(token(2), U256::from(50u64)).is_ok());
    }
}
