//! Relay orders: the signed intent a filler settles.
//!
//! An [`Order`] is immutable once signed. Its [`OrderId`] is derived from the
//! content, and the requester authorizes it with an ed25519 signature over
//! that id ([`SignedOrder`]).

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{OrderId, RelayError, Result, address_from_verifying_key, constants};

/// What the requester wants filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Chain the order may be settled on.
    pub chain_id: u64,
    /// The account that signed the order.
    pub requester: Address,
    pub input_token: Address,
    pub input_amount: U256,
    pub output_token: Address,
    /// Minimum amount of `output_token` the recipient must receive.
    pub min_output_amount: U256,
    pub recipient: Address,
    pub deadline: DateTime<Utc>,
    /// Distinguishes otherwise identical intents.
    pub nonce: u64,
    /// `true` if the requester supplies the input tokens, `false` if the
    /// filler fronts them.
    pub payer_is_user: bool,
    /// `true` if the router must deliver output to the engine, which then
    /// sweeps it to `recipient`.
    pub router_must_custody: bool,
}

impl Order {
    /// Content-derived identifier.
    ///
    /// `SHA-256("relayfill:order:v1:" || chain_id || requester || input_token
    ///   || input_amount || output_token || min_output_amount || recipient
    ///   || deadline_secs || deadline_nanos || nonce || flags)`
    ///
    /// The deadline is hashed at full precision, so moving it by any amount
    /// changes the id and invalidates the signature.
    #[must_use]
    pub fn id(&self) -> OrderId {
        let mut hasher = Sha256::new();
        hasher.update(constants::ORDER_ID_DOMAIN);
        hasher.update(self.chain_id.to_le_bytes());
        hasher.update(self.requester.as_slice());
        hasher.update(self.input_token.as_slice());
        hasher.update(self.input_amount.to_be_bytes::<32>());
        hasher.update(self.output_token.as_slice());
        hasher.update(self.min_output_amount.to_be_bytes::<32>());
        hasher.update(self.recipient.as_slice());
        hasher.update(self.deadline.timestamp().to_le_bytes());
        hasher.update(self.deadline.timestamp_subsec_nanos().to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.update([u8::from(self.payer_is_user), u8::from(self.router_must_custody)]);
        OrderId(hasher.finalize().into())
    }

    /// Structural checks that hold for the whole life of the order.
    ///
    /// # Errors
    /// Returns [`RelayError::InvalidOrder`] describing the first failed rule.
    pub fn validate_shape(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(RelayError::InvalidOrder {
                reason: reason.to_string(),
            })
        };
        if self.input_amount.is_zero() {
            return invalid("input amount must be positive");
        }
        if self.min_output_amount.is_zero() {
            return invalid("minimum output amount must be positive");
        }
        if self.requester.is_zero() {
            return invalid("requester must be non-zero");
        }
        if self.recipient.is_zero() {
            return invalid("recipient must be non-zero");
        }
        if self.input_token == self.output_token {
            return invalid("input and output token must differ");
        }
        Ok(())
    }

    /// Validation at submission time: shape rules plus a deadline strictly
    /// in the future.
    ///
    /// # Errors
    /// Returns [`RelayError::InvalidOrder`] describing the first failed rule.
    pub fn validate_new(&self, now: DateTime<Utc>) -> Result<()> {
        self.validate_shape()?;
        if self.deadline <= now {
            return Err(RelayError::InvalidOrder {
                reason: format!("deadline {} is not after {now}", self.deadline),
            });
        }
        Ok(())
    }

    /// An order is fillable up to and including its deadline.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    #[must_use]
    pub fn input_is_native(&self) -> bool {
        self.input_token == constants::NATIVE_ASSET
    }

    #[must_use]
    pub fn output_is_native(&self) -> bool {
        self.output_token == constants::NATIVE_ASSET
    }

    /// The account that supplies the input tokens for a fill by `filler`.
    #[must_use]
    pub fn funder(&self, filler: Address) -> Address {
        if self.payer_is_user {
            self.requester
        } else {
            filler
        }
    }

    /// Bytes the requester signs: domain tag followed by the order id.
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(constants::ORDER_SIGNATURE_DOMAIN.len() + 32);
        payload.extend_from_slice(constants::ORDER_SIGNATURE_DOMAIN);
        payload.extend_from_slice(self.id().as_bytes());
        payload
    }
}

/// An order together with the requester's authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOrder {
    pub order: Order,
    /// Raw ed25519 verifying key of the signer.
    pub signer: [u8; 32],
    /// Ed25519 signature over [`Order::signing_payload`].
    pub signature: Vec<u8>,
}

impl SignedOrder {
    /// Sign `order` with the requester's key.
    #[must_use]
    pub fn sign(order: Order, key: &SigningKey) -> Self {
        let signature = key.sign(&order.signing_payload());
        Self {
            signer: key.verifying_key().to_bytes(),
            signature: signature.to_bytes().to_vec(),
            order,
        }
    }

    #[must_use]
    pub fn id(&self) -> OrderId {
        self.order.id()
    }

    /// Check the signature and that the signer controls `order.requester`.
    ///
    /// # Errors
    /// Returns [`RelayError::InvalidSignature`] on any mismatch.
    pub fn verify(&self) -> Result<()> {
        if address_from_verifying_key(&self.signer) != self.order.requester {
            return Err(RelayError::InvalidSignature);
        }
        let key =
            VerifyingKey::from_bytes(&self.signer).map_err(|_| RelayError::InvalidSignature)?;
        let bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| RelayError::InvalidSignature)?;
        key.verify(&self.order.signing_payload(), &Signature::from_bytes(&bytes))
            .map_err(|_| RelayError::InvalidSignature)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    /// Deterministic signing key for tests.
    pub fn test_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    /// Address controlled by [`Order::test_key`].
    pub fn test_address(seed: u8) -> Address {
        address_from_verifying_key(&Self::test_key(seed).verifying_key().to_bytes())
    }

    /// A filler-funded, direct-delivery swap order on the default chain with
    /// a one hour deadline. The requester is also the recipient.
    pub fn dummy_swap(
        requester: Address,
        input_token: Address,
        input_amount: U256,
        output_token: Address,
        min_output_amount: U256,
    ) -> Self {
        Self {
            chain_id: constants::DEFAULT_CHAIN_ID,
            requester,
            input_token,
            input_amount,
            output_token,
            min_output_amount,
            recipient: requester,
            deadline: Utc::now() + chrono::Duration::hours(1),
            nonce: rand::random::<u64>(),
            payer_is_user: false,
            router_must_custody: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenInfo;

    fn order() -> Order {
        Order::dummy_swap(
            Order::test_address(1),
            TokenInfo::dai().address,
            TokenInfo::dai().units(100),
            TokenInfo::usdc().address,
            TokenInfo::usdc().units(95),
        )
    }

    #[test]
    fn id_is_content_derived() {
        let a = order();
        let b = a.clone();
        assert_eq!(a.id(), b.id());

        let mut c = a.clone();
        c.router_must_custody = true;
        assert_ne!(a.id(), c.id());

        let mut d = a.clone();
        d.nonce = a.nonce.wrapping_add(1);
        assert_ne!(a.id(), d.id());

        let mut e = a.clone();
        e.chain_id = 5;
        assert_ne!(a.id(), e.id());
    }

    #[test]
    fn shape_rejects_zero_amounts() {
        let mut o = order();
        o.min_output_amount = U256::ZERO;
        assert!(matches!(
            o.validate_shape(),
            Err(RelayError::InvalidOrder { .. })
        ));

        let mut o = order();
        o.input_amount = U256::ZERO;
        assert!(o.validate_shape().is_err());
    }

    #[test]
    fn shape_rejects_same_token() {
        let mut o = order();
        o.output_token = o.input_token;
        assert!(o.validate_shape().is_err());
    }

    #[test]
    fn new_order_needs_future_deadline() {
        let o = order();
        assert!(o.validate_new(Utc::now()).is_ok());
        assert!(o.validate_new(o.deadline).is_err());
    }

    #[test]
    fn expiry_is_inclusive_of_deadline() {
        let o = order();
        assert!(!o.is_expired_at(o.deadline));
        assert!(o.is_expired_at(o.deadline + chrono::Duration::seconds(1)));
    }

    #[test]
    fn funder_follows_payer_flag() {
        let filler = Order::test_address(9);
        let mut o = order();
        assert_eq!(o.funder(filler), filler);
        o.payer_is_user = true;
        assert_eq!(o.funder(filler), o.requester);
    }

    #[test]
    fn signature_roundtrip() {
        let signed = SignedOrder::sign(order(), &Order::test_key(1));
        assert!(signed.verify().is_ok());
    }

    #[test]
    fn wrong_signer_rejected() {
        let signed = SignedOrder::sign(order(), &Order::test_key(2));
        assert!(matches!(signed.verify(), Err(RelayError::InvalidSignature)));
    }

    #[test]
    fn tampered_order_rejected() {
        let mut signed = SignedOrder::sign(order(), &Order::test_key(1));
        signed.order.min_output_amount = U256::from(1u64);
        assert!(matches!(signed.verify(), Err(RelayError::InvalidSignature)));
    }

    #[test]
    fn subsecond_deadline_shift_rejected() {
        let mut o = order();
        o.deadline = DateTime::from_timestamp(2_000_000_000, 0).unwrap();
        let mut signed = SignedOrder::sign(o, &Order::test_key(1));
        let original = signed.id();

        signed.order.deadline = DateTime::from_timestamp(2_000_000_000, 999_000_000).unwrap();
        assert_ne!(signed.id(), original);
        assert!(matches!(signed.verify(), Err(RelayError::InvalidSignature)));
    }

    #[test]
    fn truncated_signature_rejected() {
        let mut signed = SignedOrder::sign(order(), &Order::test_key(1));
        signed.signature.truncate(10);
        assert!(signed.verify().is_err());
    }

    #[test]
    fn signed_order_serde_roundtrip() {
        let signed = SignedOrder::sign(order(), &Order::test_key(1));
        let json = serde_json::to_string(&signed).unwrap();
        let back: SignedOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(signed, back);
        assert!(back.verify().is_ok());
    }
}
