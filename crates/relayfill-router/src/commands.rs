//! Universal-router command subset understood by [`crate::SimulatedRouter`].
//!
//! Each command byte selects a command type in its low six bits; the high
//! bit marks the command as allowed to revert without failing the whole
//! call. Inputs are ABI-encoded parameter structs.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolType, sol};
use relayfill_types::FillPayload;

use crate::adapter::RouterError;

/// Command type codes and flags.
pub mod command {
    /// High bit: failure of this command is tolerated.
    pub const FLAG_ALLOW_REVERT: u8 = 0x80;
    /// Low six bits select the command type.
    pub const COMMAND_TYPE_MASK: u8 = 0x3f;

    pub const V3_SWAP_EXACT_IN: u8 = 0x00;
    pub const V3_SWAP_EXACT_OUT: u8 = 0x01;
    pub const SWEEP: u8 = 0x04;
    pub const TRANSFER: u8 = 0x05;
}

const fn sentinel(last: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    Address::new(bytes)
}

/// Recipient placeholder resolved to the router's caller.
pub const MSG_SENDER: Address = sentinel(1);
/// Recipient placeholder resolved to the router itself.
pub const ADDRESS_THIS: Address = sentinel(2);
/// Amount placeholder meaning "the router's entire balance".
pub const CONTRACT_BALANCE: U256 = U256::from_limbs([0, 0, 0, 1 << 63]);

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct V3SwapExactInParams {
        address recipient;
        uint256 amountIn;
        uint256 amountOutMin;
        address tokenIn;
        address tokenOut;
        bool payerIsUser;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct V3SwapExactOutParams {
        address recipient;
        uint256 amountOut;
        uint256 amountInMax;
        address tokenIn;
        address tokenOut;
        bool payerIsUser;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct SweepParams {
        address token;
        address recipient;
        uint256 amountMin;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct TransferParams {
        address token;
        address recipient;
        uint256 value;
    }
}

/// A decoded router command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterCommand {
    V3SwapExactIn(V3SwapExactInParams),
    V3SwapExactOut(V3SwapExactOutParams),
    Sweep(SweepParams),
    Transfer(TransferParams),
}

impl RouterCommand {
    /// Command type code, without flags.
    #[must_use]
    pub fn command_type(&self) -> u8 {
        match self {
            Self::V3SwapExactIn(_) => command::V3_SWAP_EXACT_IN,
            Self::V3SwapExactOut(_) => command::V3_SWAP_EXACT_OUT,
            Self::Sweep(_) => command::SWEEP,
            Self::Transfer(_) => command::TRANSFER,
        }
    }

    /// ABI-encode the command's input blob.
    #[must_use]
    pub fn encode_input(&self) -> Bytes {
        let encoded = match self {
            Self::V3SwapExactIn(p) => <V3SwapExactInParams as SolType>::abi_encode(p),
            Self::V3SwapExactOut(p) => <V3SwapExactOutParams as SolType>::abi_encode(p),
            Self::Sweep(p) => <SweepParams as SolType>::abi_encode(p),
            Self::Transfer(p) => <TransferParams as SolType>::abi_encode(p),
        };
        Bytes::from(encoded)
    }

    /// Decode `input` for the command byte `command` (flags are ignored).
    ///
    /// # Errors
    /// [`RouterError::InvalidCommandType`] for unsupported commands,
    /// [`RouterError::Decode`] for malformed input.
    pub fn decode(command: u8, input: &[u8]) -> Result<Self, RouterError> {
        let kind = command & command::COMMAND_TYPE_MASK;
        let decode_err = |e: alloy_sol_types::Error| RouterError::Decode {
            command,
            reason: e.to_string(),
        };
        match kind {
            command::V3_SWAP_EXACT_IN => <V3SwapExactInParams as SolType>::abi_decode(input)
                .map(Self::V3SwapExactIn)
                .map_err(decode_err),
            command::V3_SWAP_EXACT_OUT => <V3SwapExactOutParams as SolType>::abi_decode(input)
                .map(Self::V3SwapExactOut)
                .map_err(decode_err),
            command::SWEEP => <SweepParams as SolType>::abi_decode(input)
                .map(Self::Sweep)
                .map_err(decode_err),
            command::TRANSFER => <TransferParams as SolType>::abi_decode(input)
                .map(Self::Transfer)
                .map_err(decode_err),
            other => Err(RouterError::InvalidCommandType(other)),
        }
    }
}

/// Assembles a [`FillPayload`] from typed commands.
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    commands: Vec<u8>,
    inputs: Vec<Bytes>,
    value: U256,
}

impl PayloadBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn push(mut self, command: RouterCommand) -> Self {
        self.commands.push(command.command_type());
        self.inputs.push(command.encode_input());
        self
    }

    /// Append a command whose failure does not fail the payload.
    #[must_use]
    pub fn push_allow_revert(mut self, command: RouterCommand) -> Self {
        self.commands
            .push(command.command_type() | command::FLAG_ALLOW_REVERT);
        self.inputs.push(command.encode_input());
        self
    }

    /// Append a raw command byte and input, unchecked.
    #[must_use]
    pub fn push_raw(mut self, command: u8, input: impl Into<Bytes>) -> Self {
        self.commands.push(command);
        self.inputs.push(input.into());
        self
    }

    /// Native value to forward with the call.
    #[must_use]
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Exact-input swap.
    #[must_use]
    pub fn swap_exact_in(
        self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        amount_out_min: U256,
        recipient: Address,
        payer_is_user: bool,
    ) -> Self {
        self.push(RouterCommand::V3SwapExactIn(V3SwapExactInParams {
            recipient,
            amountIn: amount_in,
            amountOutMin: amount_out_min,
            tokenIn: token_in,
            tokenOut: token_out,
            payerIsUser: payer_is_user,
        }))
    }

    /// Exact-output swap.
    #[must_use]
    pub fn swap_exact_out(
        self,
        token_in: Address,
        token_out: Address,
        amount_out: U256,
        amount_in_max: U256,
        recipient: Address,
        payer_is_user: bool,
    ) -> Self {
        self.push(RouterCommand::V3SwapExactOut(V3SwapExactOutParams {
            recipient,
            amountOut: amount_out,
            amountInMax: amount_in_max,
            tokenIn: token_in,
            tokenOut: token_out,
            payerIsUser: payer_is_user,
        }))
    }

    /// Sweep the router's whole balance of `token` to `recipient`.
    #[must_use]
    pub fn sweep(self, token: Address, recipient: Address, amount_min: U256) -> Self {
        self.push(RouterCommand::Sweep(SweepParams {
            token,
            recipient,
            amountMin: amount_min,
        }))
    }

    #[must_use]
    pub fn transfer(self, token: Address, recipient: Address, value: U256) -> Self {
        self.push(RouterCommand::Transfer(TransferParams {
            token,
            recipient,
            value,
        }))
    }

    #[must_use]
    pub fn build(self) -> FillPayload {
        FillPayload::new(self.commands, self.inputs, self.value)
    }
}
