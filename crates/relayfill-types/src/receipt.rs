//! Settlement receipts.
//!
//! Every successful settlement produces a [`SettlementReceipt`] recording the
//! balance movements the engine observed and enforced.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, ReceiptId};

/// Outcome of a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub id: ReceiptId,
    pub order_id: OrderId,
    pub filler: Address,
    /// Requester when `payer_is_user`, otherwise the filler.
    pub funder: Address,
    pub recipient: Address,
    pub input_token: Address,
    pub output_token: Address,
    /// Input pulled into custody.
    pub input_pulled: U256,
    /// Input left unspent by the router and returned to the funder.
    pub input_refunded: U256,
    /// Net increase of the recipient's output balance.
    pub output_delivered: U256,
    /// Portion of `output_delivered` that passed through custody.
    pub output_swept: U256,
    /// Native value forwarded with the router call.
    pub native_value: U256,
    /// Output per unit of input consumed, in whole-token units, when both
    /// tokens' decimals are known.
    pub execution_price: Option<Decimal>,
    pub settled_at: DateTime<Utc>,
}

impl SettlementReceipt {
    /// Input actually consumed by the swap.
    #[must_use]
    pub fn input_spent(&self) -> U256 {
        self.input_pulled.saturating_sub(self.input_refunded)
    }

    /// Whether the output travelled through custody before delivery.
    #[must_use]
    pub fn was_custodied(&self) -> bool {
        !self.output_swept.is_zero()
    }
}
