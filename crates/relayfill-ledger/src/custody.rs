//! Custody record: the engine's own balances around one router call.
//!
//! The router is a black box. What it did is judged only by how the engine's
//! balances moved: the record snapshots each touched token before the call
//! and again after it. One record lives for exactly one settlement attempt.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use relayfill_types::{RelayError, Result};

use crate::ledger::TokenLedger;

/// Before/after balances of one token held by the custodian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustodyEntry {
    pub before: U256,
    pub after: Option<U256>,
}

/// Per-settlement custody snapshots for the engine account.
#[derive(Debug, Clone)]
pub struct CustodyRecord {
    custodian: Address,
    entries: BTreeMap<Address, CustodyEntry>,
}

impl CustodyRecord {
    #[must_use]
    pub fn new(custodian: Address) -> Self {
        Self {
            custodian,
            entries: BTreeMap::new(),
        }
    }

    /// The account whose balances are recorded.
    #[must_use]
    pub fn custodian(&self) -> Address {
        self.custodian
    }

    /// Snapshot the custodian's balance of `token` before the router call.
    pub fn record_before(&mut self, ledger: &TokenLedger, token: Address) {
        let before = ledger.balance_of(token, self.custodian);
        self.entries.insert(
            token,
            CustodyEntry {
                before,
                after: None,
            },
        );
    }

    /// Snapshot the custodian's balance of `token` after the router call.
    ///
    /// # Errors
    /// Returns [`RelayError::Internal`] if `token` had no "before" snapshot.
    pub fn record_after(&mut self, ledger: &TokenLedger, token: Address) -> Result<U256> {
        let after = ledger.balance_of(token, self.custodian);
        let entry = self.entries.get_mut(&token).ok_or_else(|| {
            RelayError::Internal(format!("custody of {token} recorded after without before"))
        })?;
        entry.after = Some(after);
        Ok(after)
    }

    #[must_use]
    pub fn entry(&self, token: Address) -> Option<CustodyEntry> {
        self.entries.get(&token).copied()
    }

    #[must_use]
    pub fn balance_before(&self, token: Address) -> Option<U256> {
        self.entries.get(&token).map(|e| e.before)
    }

    #[must_use]
    pub fn balance_after(&self, token: Address) -> Option<U256> {
        self.entries.get(&token).and_then(|e| e.after)
    }

    /// How much custody gained of `token` across the call.
    #[must_use]
    pub fn gained(&self, token: Address) -> U256 {
        self.entries
            .get(&token)
            .and_then(|e| e.after.map(|after| after.saturating_sub(e.before)))
            .unwrap_or(U256::ZERO)
    }

    /// Fail unless every recorded token is back at its pre-settlement
    /// balance: whatever custody took in during the settlement has left.
    ///
    /// # Errors
    /// Returns [`RelayError::CustodyNotCleared`] naming the first token with
    /// a leftover balance, or [`RelayError::Internal`] if custody fell below
    /// its starting balance.
    pub fn ensure_cleared(&self, ledger: &TokenLedger) -> Result<()> {
        for (token, entry) in &self.entries {
            let current = ledger.balance_of(*token, self.custodian);
            if current > entry.before {
                return Err(RelayError::CustodyNotCleared {
                    token: *token,
                    remaining: current - entry.before,
                });
            }
            if current < entry.before {
                return Err(RelayError::Internal(format!(
                    "custody of {token} fell from {} to {current}",
                    entry.before
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Address {
        Address::with_last_byte(0xe1)
    }

    fn venue() -> Address {
        Address::with_last_byte(0x77)
    }

    fn dai() -> Address {
        Address::with_last_byte(0x01)
    }

    fn usdc() -> Address {
        Address::with_last_byte(0x02)
    }

    #[test]
    fn records_before_and_after() {
        let mut ledger = TokenLedger::new();
        ledger.mint(dai(), engine(), U256::from(100u64)).unwrap();
        ledger.mint(usdc(), venue(), U256::from(1_000u64)).unwrap();

        let mut custody = CustodyRecord::new(engine());
        custody.record_before(&ledger, dai());
        custody.record_before(&ledger, usdc());

        ledger.transfer(dai(), engine(), venue(), U256::from(100u64)).unwrap();
        ledger.transfer(usdc(), venue(), engine(), U256::from(95u64)).unwrap();
        assert_eq!(custody.record_after(&ledger, dai()).unwrap(), U256::ZERO);
        custody.record_after(&ledger, usdc()).unwrap();

        assert_eq!(custody.balance_before(dai()), Some(U256::from(100u64)));
        assert_eq!(custody.gained(dai()), U256::ZERO);
        assert_eq!(custody.gained(usdc()), U256::from(95u64));
        assert_eq!(custody.balance_before(usdc()), Some(U256::ZERO));
        assert_eq!(custody.balance_after(usdc()), Some(U256::from(95u64)));
    }

    #[test]
    fn after_without_before_is_internal_error() {
        let ledger = TokenLedger::new();
        let mut custody = CustodyRecord::new(engine());
        let err = custody.record_after(&ledger, dai()).unwrap_err();
        assert!(matches!(err, RelayError::Internal(_)));
    }

    #[test]
    fn unrecorded_token_has_no_delta() {
        let custody = CustodyRecord::new(engine());
        assert_eq!(custody.gained(dai()), U256::ZERO);
        assert!(custody.entry(dai()).is_none());
    }

    #[test]
    fn ensure_cleared_reports_leftover() {
        let mut ledger = TokenLedger::new();
        let mut custody = CustodyRecord::new(engine());
        custody.record_before(&ledger, usdc());
        assert!(custody.ensure_cleared(&ledger).is_ok());

        ledger.mint(usdc(), engine(), U256::from(3u64)).unwrap();
        let err = custody.ensure_cleared(&ledger).unwrap_err();
        assert!(matches!(
            err,
            RelayError::CustodyNotCleared { remaining, .. } if remaining == U256::from(3u64)
        ));
    }

    #[test]
    fn ensure_cleared_is_relative_to_baseline() {
        let mut ledger = TokenLedger::new();
        ledger.mint(dai(), engine(), U256::from(10u64)).unwrap();
        let mut custody = CustodyRecord::new(engine());
        custody.record_before(&ledger, dai());
        assert!(custody.ensure_cleared(&ledger).is_ok());

        ledger.burn(dai(), engine(), U256::from(1u64)).unwrap();
        let err = custody.ensure_cleared(&ledger).unwrap_err();
        assert!(matches!(err, RelayError::Internal(_)));
    }
}
