//! Deployment configuration for the escrow ledger
//!
//! Settings are fixed when the ledger is constructed. They load from a TOML
//! file layered with `STAMPME_`-prefixed environment variables, so
//! `STAMPME_FEE_PERCENTAGE=5` overrides `fee_percentage` from the file.

use crate::{
    error::EscrowError,
    fee::MAX_FEE_PERCENTAGE,
    models::Address,
    EscrowResult,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "STAMPME";

/// Immutable ledger settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Address of the token contract being escrowed
    pub token: Address,
    /// Token account holding all pending escrows
    pub custody: Address,
    /// Receives the platform cut on every release
    pub fee_wallet: Address,
    /// Whole-number percentage taken on release, `0..=100`
    pub fee_percentage: u8,
    /// Only account allowed to release funds
    pub owner: Address,
}

impl LedgerConfig {
    /// Load from `path` and the environment, then validate
    pub fn load(path: impl AsRef<Path>) -> EscrowResult<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .map_err(|e| {
                EscrowError::config(format!("failed to read {}: {}", path.display(), e))
            })?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| EscrowError::config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero addresses and out-of-range fees
    pub fn validate(&self) -> EscrowResult<()> {
        let parties = [
            ("token", self.token),
            ("custody", self.custody),
            ("fee_wallet", self.fee_wallet),
            ("owner", self.owner),
        ];
        for (name, addr) in parties {
            if addr.is_zero() {
                return Err(EscrowError::config(format!(
                    "{} must not be the zero address",
                    name
                )));
            }
        }

        if self.fee_percentage > MAX_FEE_PERCENTAGE {
            return Err(EscrowError::config(format!(
                "fee_percentage {} exceeds {}",
                self.fee_percentage, MAX_FEE_PERCENTAGE
            )));
        }

        if self.custody == self.fee_wallet {
            return Err(EscrowError::config(
                "custody and fee_wallet must be distinct accounts",
            ));
        }

        Ok(())
    }
}
