//! System-wide constants for the relayfill settlement core.

use alloy_primitives::Address;

/// The chain's native asset. Native balances live under the zero address,
/// matching the `address(0)` currency convention used by swap routers.
pub const NATIVE_ASSET: Address = Address::ZERO;

/// Decimals of the native asset.
pub const NATIVE_DECIMALS: u8 = 18;

/// Domain tag hashed into every [`crate::OrderId`].
pub const ORDER_ID_DOMAIN: &[u8] = b"relayfill:order:v1:";

/// Domain tag prefixed to the order id before signing.
pub const ORDER_SIGNATURE_DOMAIN: &[u8] = b"relayfill:order-sig:v1:";

/// Default maximum number of router commands in a single fill payload.
pub const DEFAULT_MAX_PAYLOAD_COMMANDS: usize = 32;

/// Default chain id (Ethereum mainnet).
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Default file name for the durable replay set.
pub const DEFAULT_REPLAY_FILE: &str = "consumed_orders.jsonl";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "relayfill";
