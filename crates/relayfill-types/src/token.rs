//! Token metadata.
//!
//! Ledger amounts are raw base units (`U256`). `TokenInfo` carries the
//! decimals needed to express them as human-scale decimals in receipts and
//! logs, e.g. `95_000_000` USDC base units -> `95`.

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Metadata for a token the engine knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenInfo {
    #[must_use]
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }

    /// The chain's native asset.
    #[must_use]
    pub fn native() -> Self {
        Self::new(constants::NATIVE_ASSET, "ETH", constants::NATIVE_DECIMALS)
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        self.address == constants::NATIVE_ASSET
    }

    /// Express a raw amount in whole-token units.
    #[must_use]
    pub fn to_decimal(&self, amount: U256) -> Option<Decimal> {
        units_to_decimal(amount, self.decimals)
    }

    /// Raw base units for `whole` tokens (`whole * 10^decimals`).
    #[must_use]
    pub fn units(&self, whole: u64) -> U256 {
        U256::from(whole) * U256::from(10u64).pow(U256::from(self.decimals))
    }
}

/// Convert raw base units into a decimal with `decimals` fractional digits.
///
/// Returns `None` when the amount exceeds the 96-bit decimal mantissa.
#[must_use]
pub fn units_to_decimal(amount: U256, decimals: u8) -> Option<Decimal> {
    let raw = u128::try_from(amount).ok()?;
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, u32::from(decimals))
        .ok()
        .map(|d| d.normalize())
}

/// Well-known mainnet tokens for tests.
#[cfg(any(test, feature = "test-helpers"))]
impl TokenInfo {
    pub fn dai() -> Self {
        Self::new(
            alloy_primitives::address!("6B175474E89094C44Da98b954EedeAC495271d0F"),
            "DAI",
            18,
        )
    }

    pub fn usdc() -> Self {
        Self::new(
            alloy_primitives::address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            "USDC",
            6,
        )
    }
}
