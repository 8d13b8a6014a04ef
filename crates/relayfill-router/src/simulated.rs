//! In-process router executing the [`crate::commands`] subset against
//! constant-rate pools.
//!
//! Pool liquidity lives in a separate venue account; the router account
//! itself only ever holds in-transit funds. A swap moves the input into the
//! venue and pays the output from it.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use relayfill_types::FillPayload;
use tracing::debug;

use crate::adapter::{RouterAdapter, RouterContext, RouterError};
use crate::commands::{
    ADDRESS_THIS, CONTRACT_BALANCE, MSG_SENDER, RouterCommand, SweepParams, TransferParams,
    V3SwapExactInParams, V3SwapExactOutParams, command,
};

/// Exchange rate: `amount_out = amount_in * numerator / denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub numerator: U256,
    pub denominator: U256,
}

/// A constant-rate swap router.
#[derive(Debug, Clone)]
pub struct SimulatedRouter {
    address: Address,
    venue: Address,
    pools: HashMap<(Address, Address), Rate>,
    executions: u64,
}

impl SimulatedRouter {
    /// Router at `address` whose liquidity sits in `venue`.
    #[must_use]
    pub fn new(address: Address, venue: Address) -> Self {
        Self {
            address,
            venue,
            pools: HashMap::new(),
            executions: 0,
        }
    }

    /// Add or replace the `token_in -> token_out` pool.
    ///
    /// A zero numerator or denominator removes the pool.
    #[must_use]
    pub fn with_pool(
        mut self,
        token_in: Address,
        token_out: Address,
        numerator: U256,
        denominator: U256,
    ) -> Self {
        self.set_rate(token_in, token_out, numerator, denominator);
        self
    }

    pub fn set_rate(
        &mut self,
        token_in: Address,
        token_out: Address,
        numerator: U256,
        denominator: U256,
    ) {
        if numerator.is_zero() || denominator.is_zero() {
            self.pools.remove(&(token_in, token_out));
        } else {
            self.pools.insert(
                (token_in, token_out),
                Rate {
                    numerator,
                    denominator,
                },
            );
        }
    }

    /// The liquidity account.
    #[must_use]
    pub fn venue(&self) -> Address {
        self.venue
    }

    /// Number of successful `execute` calls.
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.executions
    }

    fn rate(&self, token_in: Address, token_out: Address) -> Result<Rate, RouterError> {
        self.pools
            .get(&(token_in, token_out))
            .copied()
            .ok_or(RouterError::NoPool {
                token_in,
                token_out,
            })
    }

    /// Output for an exact input, rounded down.
    ///
    /// # Errors
    /// [`RouterError::NoPool`] if the pair is not listed.
    pub fn quote_exact_in(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<U256, RouterError> {
        let rate = self.rate(token_in, token_out)?;
        amount_in
            .checked_mul(rate.numerator)
            .map(|n| n / rate.denominator)
            .ok_or_else(|| RouterError::Reverted("quote overflow".to_string()))
    }

    /// Input needed for an exact output, rounded up.
    ///
    /// # Errors
    /// [`RouterError::NoPool`] if the pair is not listed.
    pub fn quote_exact_out(
        &self,
        token_in: Address,
        token_out: Address,
        amount_out: U256,
    ) -> Result<U256, RouterError> {
        let rate = self.rate(token_in, token_out)?;
        amount_out
            .checked_mul(rate.denominator)
            .map(|n| n.div_ceil(rate.numerator))
            .ok_or_else(|| RouterError::Reverted("quote overflow".to_string()))
    }

    fn resolve_recipient(ctx: &RouterContext<'_>, recipient: Address) -> Address {
        match recipient {
            r if r == MSG_SENDER => ctx.caller(),
            r if r == ADDRESS_THIS => ctx.router(),
            r => r,
        }
    }

    /// Bring `amount` of `token` into the router: from the caller when
    /// `payer_is_user`, otherwise it must already be held in transit.
    fn fund_swap(
        ctx: &mut RouterContext<'_>,
        token: Address,
        amount: U256,
        payer_is_user: bool,
    ) -> Result<(), RouterError> {
        if payer_is_user {
            return ctx.pull_from_caller(token, amount);
        }
        let held = ctx.balance_of(token, ctx.router());
        if held < amount {
            return Err(RouterError::Reverted(format!(
                "router holds {held} of {token}, swap needs {amount}"
            )));
        }
        Ok(())
    }

    /// Swap `amount_in` already in the router for `amount_out` paid from
    /// the venue.
    fn settle_swap(
        &self,
        ctx: &mut RouterContext<'_>,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        amount_out: U256,
        recipient: Address,
    ) -> Result<(), RouterError> {
        let available = ctx.balance_of(token_out, self.venue);
        if available < amount_out {
            return Err(RouterError::InsufficientLiquidity {
                token: token_out,
                needed: amount_out,
                available,
            });
        }
        let router = ctx.router();
        ctx.transfer(token_in, router, self.venue, amount_in)?;
        ctx.transfer(token_out, self.venue, recipient, amount_out)?;
        debug!(
            %token_in,
            %token_out,
            %amount_in,
            %amount_out,
            %recipient,
            "Simulated swap"
        );
        Ok(())
    }

    fn swap_exact_in(
        &self,
        ctx: &mut RouterContext<'_>,
        p: &V3SwapExactInParams,
    ) -> Result<(), RouterError> {
        let amount_in = if p.amountIn == CONTRACT_BALANCE {
            ctx.balance_of(p.tokenIn, ctx.router())
        } else {
            p.amountIn
        };
        let amount_out = self.quote_exact_in(p.tokenIn, p.tokenOut, amount_in)?;
        if amount_out < p.amountOutMin {
            return Err(RouterError::TooLittleReceived {
                minimum: p.amountOutMin,
                actual: amount_out,
            });
        }
        Self::fund_swap(ctx, p.tokenIn, amount_in, p.payerIsUser)?;
        let recipient = Self::resolve_recipient(ctx, p.recipient);
        self.settle_swap(ctx, p.tokenIn, p.tokenOut, amount_in, amount_out, recipient)
    }

    fn swap_exact_out(
        &self,
        ctx: &mut RouterContext<'_>,
        p: &V3SwapExactOutParams,
    ) -> Result<(), RouterError> {
        let amount_in = self.quote_exact_out(p.tokenIn, p.tokenOut, p.amountOut)?;
        if amount_in > p.amountInMax {
            return Err(RouterError::TooMuchRequested {
                maximum: p.amountInMax,
                needed: amount_in,
            });
        }
        Self::fund_swap(ctx, p.tokenIn, amount_in, p.payerIsUser)?;
        let recipient = Self::resolve_recipient(ctx, p.recipient);
        self.settle_swap(ctx, p.tokenIn, p.tokenOut, amount_in, p.amountOut, recipient)
    }

    fn sweep(ctx: &mut RouterContext<'_>, p: &SweepParams) -> Result<(), RouterError> {
        let router = ctx.router();
        let balance = ctx.balance_of(p.token, router);
        if balance < p.amountMin {
            return Err(RouterError::Reverted(format!(
                "InsufficientToken: {balance} of {} below {}",
                p.token, p.amountMin
            )));
        }
        let recipient = Self::resolve_recipient(ctx, p.recipient);
        ctx.transfer(p.token, router, recipient, balance)
    }

    fn transfer(ctx: &mut RouterContext<'_>, p: &TransferParams) -> Result<(), RouterError> {
        let router = ctx.router();
        let recipient = Self::resolve_recipient(ctx, p.recipient);
        ctx.transfer(p.token, router, recipient, p.value)
    }

    fn dispatch(
        &self,
        ctx: &mut RouterContext<'_>,
        command: u8,
        input: &[u8],
    ) -> Result<(), RouterError> {
        match RouterCommand::decode(command, input)? {
            RouterCommand::V3SwapExactIn(p) => self.swap_exact_in(ctx, &p),
            RouterCommand::V3SwapExactOut(p) => self.swap_exact_out(ctx, &p),
            RouterCommand::Sweep(p) => Self::sweep(ctx, &p),
            RouterCommand::Transfer(p) => Self::transfer(ctx, &p),
        }
    }
}

impl RouterAdapter for SimulatedRouter {
    fn address(&self) -> Address {
        self.address
    }

    fn venues(&self) -> Vec<Address> {
        vec![self.venue]
    }

    fn execute(
        &mut self,
        ctx: &mut RouterContext<'_>,
        payload: &FillPayload,
    ) -> Result<(), RouterError> {
        if payload.commands.len() != payload.inputs.len() {
            return Err(RouterError::LengthMismatch {
                commands: payload.commands.len(),
                inputs: payload.inputs.len(),
            });
        }
        for (index, (cmd, input)) in payload.iter().enumerate() {
            let allow_revert = cmd & command::FLAG_ALLOW_REVERT != 0;
            let this = &*self;
            match ctx.scoped(|ctx| this.dispatch(ctx, cmd, input)) {
                Ok(()) => {}
                Err(err) if allow_revert => {
                    debug!(index, command = cmd, error = %err, "Command reverted, continuing");
                }
                Err(err) => return Err(err),
            }
        }
        self.executions += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use relayfill_ledger::TokenLedger;

    use super::*;
    use crate::commands::PayloadBuilder;

    fn engine() -> Address {
        Address::with_last_byte(0xe1)
    }

    fn dai() -> Address {
        Address::with_last_byte(0x0d)
    }

    fn usdc() -> Address {
        Address::with_last_byte(0x0c)
    }

    /// 1 DAI-unit -> 0.97 USDC-unit, 10_000 USDC of liquidity.
    fn setup() -> (TokenLedger, SimulatedRouter) {
        let router =
            SimulatedRouter::new(Address::with_last_byte(0xa0), Address::with_last_byte(0x5e))
                .with_pool(dai(), usdc(), U256::from(97u64), U256::from(100u64));
        let mut ledger = TokenLedger::new();
        ledger.mint(dai(), engine(), U256::from(100u64)).unwrap();
        ledger
            .mint(usdc(), router.venue(), U256::from(10_000u64))
            .unwrap();
        (ledger, router)
    }

    #[test]
    fn quotes_round_in_venue_favour() {
        let (_, router) = setup();
        assert_eq!(
            router.quote_exact_in(dai(), usdc(), U256::from(10u64)).unwrap(),
            U256::from(9u64)
        );
        // ceil(10 * 100 / 97) = 11
        assert_eq!(
            router.quote_exact_out(dai(), usdc(), U256::from(10u64)).unwrap(),
            U256::from(11u64)
        );
        assert!(matches!(
            router.quote_exact_in(usdc(), dai(), U256::from(1u64)),
            Err(RouterError::NoPool { .. })
        ));
    }

    #[test]
    fn exact_in_pays_caller() {
        let (mut ledger, mut router) = setup();
        let payload = PayloadBuilder::new()
            .swap_exact_in(dai(), usdc(), U256::from(100u64), U256::from(95u64), MSG_SENDER, true)
            .build();
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        ctx.approve(dai(), U256::from(100u64));
        router.execute(&mut ctx, &payload).unwrap();
        drop(ctx);

        assert_eq!(ledger.balance_of(usdc(), engine()), U256::from(97u64));
        assert_eq!(ledger.balance_of(dai(), engine()), U256::ZERO);
        assert_eq!(ledger.balance_of(dai(), router.venue()), U256::from(100u64));
        assert_eq!(router.executions(), 1);
    }

    #[test]
    fn too_little_received_fails() {
        let (mut ledger, mut router) = setup();
        let payload = PayloadBuilder::new()
            .swap_exact_in(dai(), usdc(), U256::from(100u64), U256::from(98u64), MSG_SENDER, true)
            .build();
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        ctx.approve(dai(), U256::from(100u64));
        let err = router.execute(&mut ctx, &payload).unwrap_err();
        assert!(matches!(err, RouterError::TooLittleReceived { .. }));
        assert_eq!(router.executions(), 0);
    }

    #[test]
    fn swap_to_router_then_sweep() {
        let (mut ledger, mut router) = setup();
        let payload = PayloadBuilder::new()
            .swap_exact_in(dai(), usdc(), U256::from(100u64), U256::ZERO, ADDRESS_THIS, true)
            .sweep(usdc(), MSG_SENDER, U256::from(90u64))
            .build();
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        ctx.approve(dai(), U256::from(100u64));
        router.execute(&mut ctx, &payload).unwrap();
        drop(ctx);
        assert_eq!(ledger.balance_of(usdc(), engine()), U256::from(97u64));
        assert_eq!(ledger.balance_of(usdc(), router.address()), U256::ZERO);
    }

    #[test]
    fn contract_balance_swaps_transit_funds() {
        let (mut ledger, router) = setup();
        let mut router = router.with_pool(usdc(), dai(), U256::from(1u64), U256::from(1u64));
        // 40 DAI -> 38 USDC held in transit, then all of it back to DAI.
        let payload = PayloadBuilder::new()
            .swap_exact_in(dai(), usdc(), U256::from(40u64), U256::ZERO, ADDRESS_THIS, true)
            .swap_exact_in(usdc(), dai(), CONTRACT_BALANCE, U256::ZERO, MSG_SENDER, false)
            .build();
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        ctx.approve(dai(), U256::from(40u64));
        router.execute(&mut ctx, &payload).unwrap();
        drop(ctx);
        assert_eq!(ledger.balance_of(usdc(), router.address()), U256::ZERO);
        assert_eq!(ledger.balance_of(dai(), engine()), U256::from(98u64));
    }

    #[test]
    fn allow_revert_command_is_skipped() {
        let (mut ledger, mut router) = setup();
        let payload = PayloadBuilder::new()
            .swap_exact_in(dai(), usdc(), U256::from(100u64), U256::ZERO, MSG_SENDER, true)
            .push_allow_revert(RouterCommand::Sweep(SweepParams {
                token: dai(),
                recipient: MSG_SENDER,
                amountMin: U256::from(1u64),
            }))
            .build();
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        ctx.approve(dai(), U256::from(100u64));
        router.execute(&mut ctx, &payload).unwrap();
        drop(ctx);
        assert_eq!(ledger.balance_of(usdc(), engine()), U256::from(97u64));
    }

    #[test]
    fn insufficient_liquidity_fails() {
        let (mut ledger, mut router) = setup();
        router.set_rate(dai(), usdc(), U256::from(1_000u64), U256::from(1u64));
        let payload = PayloadBuilder::new()
            .swap_exact_in(dai(), usdc(), U256::from(100u64), U256::ZERO, MSG_SENDER, true)
            .build();
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        ctx.approve(dai(), U256::from(100u64));
        let err = router.execute(&mut ctx, &payload).unwrap_err();
        assert!(matches!(err, RouterError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn exact_out_respects_max_input() {
        let (mut ledger, mut router) = setup();
        let payload = PayloadBuilder::new()
            .swap_exact_out(dai(), usdc(), U256::from(97u64), U256::from(99u64), MSG_SENDER, true)
            .build();
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        ctx.approve(dai(), U256::from(100u64));
        let err = router.execute(&mut ctx, &payload).unwrap_err();
        assert!(matches!(err, RouterError::TooMuchRequested { .. }));
    }

    #[test]
    fn unknown_command_fails_execution() {
        let (mut ledger, mut router) = setup();
        let payload = PayloadBuilder::new().push_raw(0x3f, vec![0u8; 32]).build();
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        let err = router.execute(&mut ctx, &payload).unwrap_err();
        assert!(matches!(err, RouterError::InvalidCommandType(0x3f)));
    }
}
