//! The opaque fill payload handed to the router.
//!
//! The core never interprets command bytes or input blobs; it only checks
//! that the payload is well-formed (one input per command, bounded length)
//! and that the attached native value is legal for the order.

use alloy_primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::{Order, RelayError, Result};

/// `(commands, inputs, value)` as produced by a router SDK.
///
/// Serializes with hex-encoded byte fields and a hex `value`, e.g.
/// `{"commands":"0x00","inputs":["0x..."],"value":"0x0"}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FillPayload {
    /// One byte per router command.
    pub commands: Bytes,
    /// One argument blob per command.
    pub inputs: Vec<Bytes>,
    /// Native value forwarded with the router call.
    pub value: U256,
}

impl FillPayload {
    #[must_use]
    pub fn new(commands: impl Into<Bytes>, inputs: Vec<Bytes>, value: U256) -> Self {
        Self {
            commands: commands.into(),
            inputs,
            value,
        }
    }

    /// Number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate `(command byte, input blob)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Bytes)> {
        self.commands.iter().copied().zip(self.inputs.iter())
    }

    /// Structural checks: non-empty, one input per command, at most
    /// `max_commands` commands.
    ///
    /// # Errors
    /// Returns [`RelayError::InvalidPayload`].
    pub fn check_shape(&self, max_commands: usize) -> Result<()> {
        if self.is_empty() {
            return Err(RelayError::InvalidPayload {
                reason: "payload has no commands".to_string(),
            });
        }
        if self.commands.len() != self.inputs.len() {
            return Err(RelayError::InvalidPayload {
                reason: format!(
                    "length mismatch: {} commands, {} inputs",
                    self.commands.len(),
                    self.inputs.len()
                ),
            });
        }
        if self.commands.len() > max_commands {
            return Err(RelayError::InvalidPayload {
                reason: format!(
                    "{} commands exceeds maximum {max_commands}",
                    self.commands.len()
                ),
            });
        }
        Ok(())
    }

    /// Native value rules for filling `order`: zero unless the input is the
    /// native asset, and never more than the order's input amount.
    pub fn check_value_for(&self, order: &Order) -> Result<()> {
        if self.value.is_zero() {
            return Ok(());
        }
        if !order.input_is_native() {
            return Err(RelayError::InvalidPayload {
                reason: format!(
                    "native value {} attached to a fill of token {}",
                    self.value, order.input_token
                ),
            });
        }
        if self.value > order.input_amount {
            return Err(RelayError::InvalidPayload {
                reason: format!(
                    "native value {} exceeds input amount {}",
                    self.value, order.input_amount
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TokenInfo, constants};

    fn payload(n_cmds: usize, n_inputs: usize) -> FillPayload {
        FillPayload::new(
            vec![0u8; n_cmds],
            vec![Bytes::from_static(&[1, 2, 3]); n_inputs],
            U256::ZERO,
        )
    }

    fn token_order() -> Order {
        Order::dummy_swap(
            Order::test_address(1),
            TokenInfo::dai().address,
            TokenInfo::dai().units(100),
            TokenInfo::usdc().address,
            TokenInfo::usdc().units(95),
        )
    }

    #[test]
    fn well_formed_payload_passes() {
        assert!(payload(2, 2).check_shape(8).is_ok());
        assert_eq!(payload(2, 2).iter().count(), 2);
    }

    #[test]
    fn length_mismatch_rejected() {
        let err = payload(2, 1).check_shape(8).unwrap_err();
        assert!(matches!(err, RelayError::InvalidPayload { ref reason } if reason.contains("mismatch")));
    }

    #[test]
    fn empty_and_oversized_rejected() {
        assert!(payload(0, 0).check_shape(8).is_err());
        assert!(payload(9, 9).check_shape(8).is_err());
    }

    #[test]
    fn value_must_be_zero_for_token_input() {
        let order = token_order();
        let mut p = payload(1, 1);
        assert!(p.check_value_for(&order).is_ok());
        p.value = U256::from(1u64);
        assert!(p.check_value_for(&order).is_err());
    }

    #[test]
    fn native_input_allows_value_up_to_amount() {
        let mut order = token_order();
        order.input_token = constants::NATIVE_ASSET;
        let mut p = payload(1, 1);
        p.value = order.input_amount;
        assert!(p.check_value_for(&order).is_ok());
        p.value = order.input_amount + U256::from(1u64);
        assert!(p.check_value_for(&order).is_err());
    }

    #[test]
    fn hex_serde_shape() {
        let p = FillPayload::new(vec![0x00u8], vec![Bytes::from_static(&[0xab])], U256::ZERO);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["commands"], "0x00");
        assert_eq!(json["inputs"][0], "0xab");
        assert_eq!(json["value"], "0x0");
        let back: FillPayload = serde_json::from_value(json).unwrap();
        assert_eq!(p, back);
    }
}
