//! Configuration management
//!
//! Built-in defaults, then an optional `price-guess-node.{toml,json,yaml}`
//! in the working directory, then `PRICE_GUESS_*` environment variables.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Address of the first contract a fresh Hardhat/Anvil account deploys
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub port: u16,
    pub chain_id: u64,
    pub contract_address: String,
    /// Seeds the mock coprocessor key
    pub coprocessor_seed: String,
    pub max_authorization_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8545,
            chain_id: 31337,
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            coprocessor_seed: "price-guess-dev".to_string(),
            max_authorization_days: 365,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        config::Config::builder()
            .set_default("port", i64::from(defaults.port))?
            .set_default("chain_id", defaults.chain_id as i64)?
            .set_default("contract_address", defaults.contract_address)?
            .set_default("coprocessor_seed", defaults.coprocessor_seed)?
            .set_default("max_authorization_days", i64::from(defaults.max_authorization_days))?
            .add_source(config::File::with_name("price-guess-node").required(false))
            .add_source(config::Environment::with_prefix("PRICE_GUESS").try_parsing(true))
            .build()
            .context("Failed to read node configuration")?
            .try_deserialize()
            .context("Invalid node configuration")
    }

    pub fn contract_address(&self) -> Result<Address> {
        self.contract_address
            .parse()
            .context("Invalid contract address")
    }
}
