//! Configuration types for the settlement engine.

use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{RelayError, Result, TokenInfo, constants};

/// Configuration for one settlement engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The engine's own account: custody balances live here.
    pub engine_address: Address,
    /// Chain the engine settles on.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Upper bound on router commands per fill payload.
    #[serde(default = "default_max_payload_commands")]
    pub max_payload_commands: usize,
    /// Run the supply conservation check after every settlement.
    #[serde(default = "default_verify_supply")]
    pub verify_supply: bool,
    /// Where consumed order ids are persisted.
    #[serde(default)]
    pub replay_store: ReplayStoreConfig,
    /// Tokens with known decimals (used for receipts and logs).
    #[serde(default)]
    pub tokens: Vec<TokenInfo>,
}

/// Backing store for the replay guard.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayStoreConfig {
    /// Process-local; consumed ids are lost on restart.
    #[default]
    Memory,
    /// Append-only file, one order id per line.
    File { path: PathBuf },
}

fn default_chain_id() -> u64 {
    constants::DEFAULT_CHAIN_ID
}

fn default_max_payload_commands() -> usize {
    constants::DEFAULT_MAX_PAYLOAD_COMMANDS
}

fn default_verify_supply() -> bool {
    true
}

impl EngineConfig {
    /// Defaults for an engine at `engine_address`, native token registered.
    #[must_use]
    pub fn new(engine_address: Address) -> Self {
        Self {
            engine_address,
            chain_id: constants::DEFAULT_CHAIN_ID,
            max_payload_commands: constants::DEFAULT_MAX_PAYLOAD_COMMANDS,
            verify_supply: true,
            replay_store: ReplayStoreConfig::Memory,
            tokens: vec![TokenInfo::native()],
        }
    }

    /// Register a token's metadata.
    #[must_use]
    pub fn with_token(mut self, token: TokenInfo) -> Self {
        self.tokens.retain(|t| t.address != token.address);
        self.tokens.push(token);
        self
    }

    #[must_use]
    pub fn with_replay_store(mut self, store: ReplayStoreConfig) -> Self {
        self.replay_store = store;
        self
    }

    /// Look up metadata for `address`.
    #[must_use]
    pub fn token(&self, address: Address) -> Option<&TokenInfo> {
        self.tokens.iter().find(|t| t.address == address)
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| RelayError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// # Errors
    /// Returns [`RelayError::Configuration`] for an unusable config.
    pub fn validate(&self) -> Result<()> {
        if self.engine_address.is_zero() {
            return Err(RelayError::Configuration(
                "engine_address must be non-zero".to_string(),
            ));
        }
        if self.max_payload_commands == 0 {
            return Err(RelayError::Configuration(
                "max_payload_commands must be > 0".to_string(),
            ));
        }
        for (i, token) in self.tokens.iter().enumerate() {
            if self.tokens[..i].iter().any(|t| t.address == token.address) {
                return Err(RelayError::Configuration(format!(
                    "token {} listed twice",
                    token.address
                )));
            }
        }
        if let ReplayStoreConfig::File { path } = &self.replay_store {
            if path.as_os_str().is_empty() {
                return Err(RelayError::Configuration(
                    "replay_store.path must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
