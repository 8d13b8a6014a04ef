//! The settlement engine.
//!
//! One engine owns the token ledger and the router it calls. Settlements are
//! serialized through `&mut self`; the replay guard may be shared between
//! engines through an `Arc`.
//!
//! Every settlement runs inside a ledger checkpoint. The checkpoint is
//! committed only after the replay reservation is durably committed; any
//! error before that point reverts every balance change the settlement (or
//! the router) made.

use std::path::Path;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use relayfill_ledger::{CustodyRecord, TokenLedger};
use relayfill_router::{RouterAdapter, RouterContext};
use relayfill_types::{
    EngineConfig, FillPayload, Order, OrderId, ReceiptId, RelayError, Result, SettlementReceipt,
    SignedOrder, constants,
};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::replay::ReplayGuard;

/// Settles signed relay orders against a router.
pub struct SettlementEngine {
    config: EngineConfig,
    ledger: TokenLedger,
    router: Box<dyn RouterAdapter>,
    replay: Arc<ReplayGuard>,
    settled: u64,
}

impl SettlementEngine {
    /// Engine with the replay guard selected by `config.replay_store`.
    ///
    /// # Errors
    /// Configuration errors, or the replay store failing to load.
    pub fn new(config: EngineConfig, router: Box<dyn RouterAdapter>) -> Result<Self> {
        config.validate()?;
        let replay = ReplayGuard::from_config(&config.replay_store)?;
        Self::with_replay_guard(config, router, Arc::new(replay))
    }

    /// Engine sharing an existing replay guard.
    pub fn with_replay_guard(
        config: EngineConfig,
        router: Box<dyn RouterAdapter>,
        replay: Arc<ReplayGuard>,
    ) -> Result<Self> {
        config.validate()?;
        let engine = config.engine_address;
        if router.address() == engine || router.venues().contains(&engine) {
            return Err(RelayError::Configuration(format!(
                "router accounts must not include the engine account {engine}"
            )));
        }
        info!(
            engine = %engine,
            router = %router.address(),
            chain_id = config.chain_id,
            version = constants::VERSION,
            "Settlement engine ready"
        );
        Ok(Self {
            config,
            ledger: TokenLedger::new(),
            router,
            replay,
            settled: 0,
        })
    }

    /// Load a JSON config from `path` and build an engine from it.
    pub fn from_config_file(path: &Path, router: Box<dyn RouterAdapter>) -> Result<Self> {
        Self::new(EngineConfig::load(path)?, router)
    }

    /// The engine's custody account.
    #[must_use]
    pub fn address(&self) -> Address {
        self.config.engine_address
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn router_address(&self) -> Address {
        self.router.address()
    }

    #[must_use]
    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    /// Direct ledger access, for funding accounts outside settlement.
    pub fn ledger_mut(&mut self) -> &mut TokenLedger {
        &mut self.ledger
    }

    #[must_use]
    pub fn replay_guard(&self) -> &Arc<ReplayGuard> {
        &self.replay
    }

    /// Number of settlements this engine committed.
    #[must_use]
    pub fn settled_count(&self) -> u64 {
        self.settled
    }

    #[must_use]
    pub fn is_consumed(&self, order_id: &OrderId) -> bool {
        self.replay.is_consumed(order_id)
    }

    /// Settle `signed` with `payload`, supplied by `filler`, at the current
    /// time.
    ///
    /// # Errors
    /// See [`SettlementEngine::settle_at`].
    pub fn settle(
        &mut self,
        signed: &SignedOrder,
        payload: &FillPayload,
        filler: Address,
    ) -> Result<SettlementReceipt> {
        self.settle_at(signed, payload, filler, Utc::now())
    }

    /// Settle `signed` as of `now`.
    ///
    /// On error the ledger and replay guard are exactly as they were before
    /// the call.
    ///
    /// # Errors
    /// - `InvalidOrder`, `InvalidSignature`, `InvalidPayload`, `Unauthorized`
    ///   if the request is malformed
    /// - `OrderExpired` if `now` is past the deadline
    /// - `OrderAlreadyFilled` if the id is consumed or being settled
    /// - `InsufficientInputFunding` if the funder cannot cover the input
    /// - `RouterExecutionFailed` if the router call fails
    /// - `SlippageViolation` if the recipient got less than the minimum
    /// - `SupplyInvariantViolation`, `CustodyNotCleared`, `Storage` on
    ///   post-settlement check failures
    pub fn settle_at(
        &mut self,
        signed: &SignedOrder,
        payload: &FillPayload,
        filler: Address,
        now: DateTime<Utc>,
    ) -> Result<SettlementReceipt> {
        let order_id = signed.id();
        if let Err(err) = self.precheck(signed, payload, filler, now) {
            warn!(order = %order_id.short(), %filler, error = %err, "Settlement rejected");
            return Err(err);
        }

        let replay = Arc::clone(&self.replay);
        let reservation = match replay.reserve(order_id) {
            Ok(reservation) => reservation,
            Err(err) => {
                warn!(order = %order_id.short(), %filler, error = %err, "Settlement rejected");
                return Err(err);
            }
        };

        let checkpoint = self.ledger.checkpoint();
        let outcome = self
            .execute(&signed.order, order_id, payload, filler, now)
            .and_then(|receipt| reservation.commit().map(|()| receipt));

        match outcome {
            Ok(receipt) => {
                self.ledger.commit(checkpoint);
                self.settled += 1;
                info!(
                    order = %order_id.short(),
                    receipt = %receipt.id,
                    %filler,
                    recipient = %receipt.recipient,
                    input_spent = %receipt.input_spent(),
                    input_refunded = %receipt.input_refunded,
                    delivered = %receipt.output_delivered,
                    minimum = %signed.order.min_output_amount,
                    custodied = receipt.was_custodied(),
                    native_output = signed.order.output_is_native(),
                    "Order settled"
                );
                Ok(receipt)
            }
            Err(err) => {
                self.ledger.revert_to(checkpoint);
                if matches!(err, RelayError::SupplyInvariantViolation { .. }) {
                    error!(order = %order_id.short(), error = %err, "Supply invariant violated, settlement reverted");
                } else {
                    warn!(order = %order_id.short(), %filler, error = %err, "Settlement rolled back");
                }
                Err(err)
            }
        }
    }

    /// Admission check for a newly submitted order, before any filler picks
    /// it up: shape and chain, signature, a deadline strictly after `now`,
    /// and an id that is neither consumed nor being settled.
    ///
    /// # Errors
    /// `InvalidOrder`, `InvalidSignature` or `OrderAlreadyFilled`.
    pub fn check_submission(&self, signed: &SignedOrder, now: DateTime<Utc>) -> Result<OrderId> {
        let order = &signed.order;
        let order_id = order.id();
        order.validate_new(now)?;
        self.check_chain(order)?;
        signed.verify()?;
        if self.replay.is_consumed(&order_id) || self.replay.is_reserved(&order_id) {
            return Err(RelayError::OrderAlreadyFilled(order_id));
        }
        debug!(order = %order_id.short(), deadline = %order.deadline, "Order accepted for filling");
        Ok(order_id)
    }

    /// Invalidate an unfilled order. Only its requester may cancel it.
    ///
    /// # Errors
    /// `Unauthorized` for any other caller; `OrderAlreadyFilled` if the id
    /// is already consumed or being settled.
    pub fn cancel(&self, order: &Order, caller: Address) -> Result<()> {
        let order_id = order.id();
        if caller != order.requester {
            warn!(order = %order_id.short(), %caller, "Cancel rejected");
            return Err(RelayError::Unauthorized {
                reason: format!("{caller} is not the requester of order {order_id}"),
            });
        }
        self.replay.consume(order_id)?;
        info!(order = %order_id.short(), requester = %caller, "Order cancelled");
        Ok(())
    }

    /// Checks that need no state change.
    fn precheck(
        &self,
        signed: &SignedOrder,
        payload: &FillPayload,
        filler: Address,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let order = &signed.order;
        order.validate_shape()?;
        self.check_chain(order)?;
        let engine = self.config.engine_address;
        if order.recipient == engine {
            return Err(RelayError::InvalidOrder {
                reason: "recipient must not be the engine".to_string(),
            });
        }
        if filler.is_zero() || filler == engine {
            return Err(RelayError::Unauthorized {
                reason: format!("{filler} cannot act as filler"),
            });
        }
        signed.verify()?;
        if order.is_expired_at(now) {
            return Err(RelayError::OrderExpired {
                deadline: order.deadline,
                now,
            });
        }
        payload.check_shape(self.config.max_payload_commands)?;
        payload.check_value_for(order)
    }

    fn check_chain(&self, order: &Order) -> Result<()> {
        if order.chain_id == self.config.chain_id {
            return Ok(());
        }
        Err(RelayError::InvalidOrder {
            reason: format!(
                "order is for chain {}, engine settles on chain {}",
                order.chain_id, self.config.chain_id
            ),
        })
    }

    /// The journaled body of a settlement. The caller reverts on error.
    fn execute(
        &mut self,
        order: &Order,
        order_id: OrderId,
        payload: &FillPayload,
        filler: Address,
        now: DateTime<Utc>,
    ) -> Result<SettlementReceipt> {
        let engine = self.config.engine_address;
        let funder = order.funder(filler);

        let mut custody = CustodyRecord::new(engine);
        custody.record_before(&self.ledger, order.input_token);
        custody.record_before(&self.ledger, order.output_token);

        // 1. Funding
        let available = self.ledger.balance_of(order.input_token, funder);
        if available < order.input_amount {
            return Err(RelayError::InsufficientInputFunding {
                funder,
                needed: order.input_amount,
                available,
            });
        }
        self.ledger
            .transfer(order.input_token, funder, engine, order.input_amount)?;
        debug!(order = %order_id.short(), %funder, amount = %order.input_amount, "Input pulled into custody");

        // 2. Router call
        let recipient_before = self.ledger.balance_of(order.output_token, order.recipient);
        let router = self.router.address();
        if !payload.value.is_zero() {
            self.ledger
                .transfer(constants::NATIVE_ASSET, engine, router, payload.value)?;
        }
        {
            let mut ctx =
                RouterContext::new(&mut self.ledger, engine, self.router.as_ref(), payload.value);
            if !order.input_is_native() {
                ctx.approve(order.input_token, order.input_amount);
            }
            self.router.execute(&mut ctx, payload)?;
        }
        custody.record_after(&self.ledger, order.input_token)?;
        custody.record_after(&self.ledger, order.output_token)?;

        // 3. Sweep output, refund input
        let swept = custody.gained(order.output_token);
        if !swept.is_zero() {
            self.ledger
                .transfer(order.output_token, engine, order.recipient, swept)?;
            debug!(order = %order_id.short(), amount = %swept, recipient = %order.recipient, "Output swept from custody");
        }
        let refunded = custody.gained(order.input_token);
        if !refunded.is_zero() {
            self.ledger
                .transfer(order.input_token, engine, funder, refunded)?;
            debug!(order = %order_id.short(), amount = %refunded, %funder, "Residual input refunded");
        }

        // 4. Minimum output
        let delivered = self
            .ledger
            .balance_of(order.output_token, order.recipient)
            .saturating_sub(recipient_before);
        if delivered < order.min_output_amount {
            return Err(RelayError::SlippageViolation {
                minimum: order.min_output_amount,
                delivered,
            });
        }
        if order.router_must_custody && swept < order.min_output_amount {
            // Output that bypassed custody does not count for custodied orders.
            return Err(RelayError::SlippageViolation {
                minimum: order.min_output_amount,
                delivered: swept,
            });
        }

        // 5. Invariants
        if self.config.verify_supply {
            self.ledger.verify_supply(order.input_token)?;
            self.ledger.verify_supply(order.output_token)?;
        }
        custody.ensure_cleared(&self.ledger)?;

        let input_spent = order.input_amount.saturating_sub(refunded);
        Ok(SettlementReceipt {
            id: ReceiptId::new(),
            order_id,
            filler,
            funder,
            recipient: order.recipient,
            input_token: order.input_token,
            output_token: order.output_token,
            input_pulled: order.input_amount,
            input_refunded: refunded,
            output_delivered: delivered,
            output_swept: swept,
            native_value: payload.value,
            execution_price: self.execution_price(order, input_spent, delivered),
            settled_at: now,
        })
    }

    /// Whole output tokens per whole input token, when both are known.
    fn execution_price(&self, order: &Order, spent: U256, delivered: U256) -> Option<Decimal> {
        let spent = self.config.token(order.input_token)?.to_decimal(spent)?;
        let delivered = self.config.token(order.output_token)?.to_decimal(delivered)?;
        delivered.checked_div(spent).map(|p| p.normalize())
    }
}
