//! Router adapter boundary.
//!
//! A router receives a [`RouterContext`] and an opaque [`FillPayload`] and
//! either succeeds or fails. Partial execution is never observable: on
//! failure the engine reverts the whole ledger journal, including anything
//! the router moved.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use relayfill_ledger::TokenLedger;
use relayfill_types::{FillPayload, RelayError};
use thiserror::Error;

/// Failures inside a router call. All of them surface to the settlement
/// engine as a single [`RelayError::RouterExecutionFailed`].
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Reverted: {0}")]
    Reverted(String),

    #[error("Invalid command type {0:#04x}")]
    InvalidCommandType(u8),

    #[error("Length mismatch: {commands} commands, {inputs} inputs")]
    LengthMismatch { commands: usize, inputs: usize },

    #[error("Failed to decode input for command {command:#04x}: {reason}")]
    Decode { command: u8, reason: String },

    #[error("Allowance exceeded for {token}: requested {requested}, remaining {remaining}")]
    AllowanceExceeded {
        token: Address,
        requested: U256,
        remaining: U256,
    },

    #[error("Router may not move funds out of {0}")]
    Unauthorized(Address),

    #[error("No pool for {token_in} -> {token_out}")]
    NoPool { token_in: Address, token_out: Address },

    #[error("Insufficient liquidity of {token}: need {needed}, have {available}")]
    InsufficientLiquidity {
        token: Address,
        needed: U256,
        available: U256,
    },

    #[error("V3TooLittleReceived: minimum {minimum}, got {actual}")]
    TooLittleReceived { minimum: U256, actual: U256 },

    #[error("V3TooMuchRequested: maximum {maximum}, needed {needed}")]
    TooMuchRequested { maximum: U256, needed: U256 },

    #[error("Ledger: {0}")]
    Ledger(String),
}

impl From<RelayError> for RouterError {
    fn from(err: RelayError) -> Self {
        Self::Ledger(err.to_string())
    }
}

impl From<RouterError> for RelayError {
    fn from(err: RouterError) -> Self {
        Self::RouterExecutionFailed {
            reason: err.to_string(),
        }
    }
}

/// An external execution engine the settlement core calls into.
pub trait RouterAdapter: Send {
    /// The router's own account.
    fn address(&self) -> Address;

    /// Liquidity accounts, besides [`RouterAdapter::address`], the router
    /// is allowed to move funds out of.
    fn venues(&self) -> Vec<Address> {
        Vec::new()
    }

    /// Execute `payload`. The native value attached to the payload has
    /// already been moved to the router's account.
    fn execute(
        &mut self,
        ctx: &mut RouterContext<'_>,
        payload: &FillPayload,
    ) -> Result<(), RouterError>;
}

/// The ledger view handed to a router for one call.
pub struct RouterContext<'a> {
    ledger: &'a mut TokenLedger,
    caller: Address,
    router: Address,
    venues: Vec<Address>,
    value: U256,
    /// Per-token amount the router may still pull from the caller.
    allowances: HashMap<Address, U256>,
}

impl<'a> RouterContext<'a> {
    pub fn new(
        ledger: &'a mut TokenLedger,
        caller: Address,
        router: &dyn RouterAdapter,
        value: U256,
    ) -> Self {
        Self {
            ledger,
            caller,
            router: router.address(),
            venues: router.venues(),
            value,
            allowances: HashMap::new(),
        }
    }

    /// Allow the router to pull up to `amount` of `token` from the caller.
    pub fn approve(&mut self, token: Address, amount: U256) {
        self.allowances.insert(token, amount);
    }

    /// The account that invoked the router (the settlement engine).
    #[must_use]
    pub fn caller(&self) -> Address {
        self.caller
    }

    #[must_use]
    pub fn router(&self) -> Address {
        self.router
    }

    /// Native value forwarded with the call.
    #[must_use]
    pub fn value(&self) -> U256 {
        self.value
    }

    #[must_use]
    pub fn allowance(&self, token: Address) -> U256 {
        self.allowances.get(&token).copied().unwrap_or(U256::ZERO)
    }

    #[must_use]
    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.ledger.balance_of(token, holder)
    }

    /// Move `amount` of `token` from the caller to the router, spending
    /// allowance.
    pub fn pull_from_caller(&mut self, token: Address, amount: U256) -> Result<(), RouterError> {
        let remaining = self.allowance(token);
        if amount > remaining {
            return Err(RouterError::AllowanceExceeded {
                token,
                requested: amount,
                remaining,
            });
        }
        self.ledger.transfer(token, self.caller, self.router, amount)?;
        self.allowances.insert(token, remaining - amount);
        Ok(())
    }

    /// Move funds out of an account the router controls.
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), RouterError> {
        if from != self.router && !self.venues.contains(&from) {
            return Err(RouterError::Unauthorized(from));
        }
        self.ledger.transfer(token, from, to, amount)?;
        Ok(())
    }

    /// Run `f` as a sub-call: if it fails, its ledger mutations and
    /// allowance spending are undone before the error is returned.
    pub fn scoped<F>(&mut self, f: F) -> Result<(), RouterError>
    where
        F: FnOnce(&mut Self) -> Result<(), RouterError>,
    {
        let checkpoint = self.ledger.checkpoint();
        let allowances = self.allowances.clone();
        match f(self) {
            Ok(()) => {
                self.ledger.commit(checkpoint);
                Ok(())
            }
            Err(err) => {
                self.ledger.revert_to(checkpoint);
                self.allowances = allowances;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopRouter;

    impl RouterAdapter for NoopRouter {
        fn address(&self) -> Address {
            Address::with_last_byte(0xa0)
        }

        fn venues(&self) -> Vec<Address> {
            vec![Address::with_last_byte(0x5e)]
        }

        fn execute(
            &mut self,
            _ctx: &mut RouterContext<'_>,
            _payload: &FillPayload,
        ) -> Result<(), RouterError> {
            Ok(())
        }
    }

    fn token() -> Address {
        Address::with_last_byte(0x01)
    }

    fn engine() -> Address {
        Address::with_last_byte(0xe1)
    }

    #[test]
    fn pull_spends_allowance() {
        let mut ledger = TokenLedger::new();
        ledger.mint(token(), engine(), U256::from(100u64)).unwrap();
        let router = NoopRouter;
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        ctx.approve(token(), U256::from(60u64));

        ctx.pull_from_caller(token(), U256::from(40u64)).unwrap();
        assert_eq!(ctx.allowance(token()), U256::from(20u64));
        let err = ctx.pull_from_caller(token(), U256::from(21u64)).unwrap_err();
        assert!(matches!(err, RouterError::AllowanceExceeded { .. }));
        assert_eq!(ctx.balance_of(token(), router.address()), U256::from(40u64));
    }

    #[test]
    fn cannot_move_caller_funds_directly() {
        let mut ledger = TokenLedger::new();
        ledger.mint(token(), engine(), U256::from(100u64)).unwrap();
        let router = NoopRouter;
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        let err = ctx
            .transfer(token(), engine(), router.address(), U256::from(1u64))
            .unwrap_err();
        assert!(matches!(err, RouterError::Unauthorized(a) if a == engine()));
    }

    #[test]
    fn venue_funds_are_movable() {
        let mut ledger = TokenLedger::new();
        let venue = Address::with_last_byte(0x5e);
        ledger.mint(token(), venue, U256::from(10u64)).unwrap();
        let router = NoopRouter;
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        ctx.transfer(token(), venue, engine(), U256::from(10u64)).unwrap();
        assert_eq!(ctx.balance_of(token(), engine()), U256::from(10u64));
    }

    #[test]
    fn scoped_failure_reverts_sub_call() {
        let mut ledger = TokenLedger::new();
        ledger.mint(token(), engine(), U256::from(100u64)).unwrap();
        let router = NoopRouter;
        let mut ctx = RouterContext::new(&mut ledger, engine(), &router, U256::ZERO);
        ctx.approve(token(), U256::from(100u64));

        let err = ctx
            .scoped(|ctx| {
                ctx.pull_from_caller(token(), U256::from(70u64))?;
                Err(RouterError::Reverted("boom".into()))
            })
            .unwrap_err();
        assert!(matches!(err, RouterError::Reverted(_)));
        assert_eq!(ctx.allowance(token()), U256::from(100u64));
        assert_eq!(ctx.balance_of(token(), engine()), U256::from(100u64));
    }

    #[test]
    fn router_error_maps_to_execution_failed() {
        let err: RelayError = RouterError::InvalidCommandType(0x3f).into();
        assert!(matches!(
            err,
            RelayError::RouterExecutionFailed { ref reason } if reason.contains("0x3f")
        ));
    }
}
