//! Core configuration.
//!
//! Every optional knob of the builders and the orchestrator, with its default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::network::{BtcTestnetType, Network};
use crate::core::scripts::ScriptRegistry;
use crate::error::{Error, Result};
use crate::utils::constants::*;

// ═══════════════════════════════════════════════════════════════════════════════
// RGB++ CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// RGB++ core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RgbppConfig {
    /// CKB network (mainnet or testnet)
    pub network: Network,
    /// Bitcoin test network paired with CKB testnet
    pub btc_testnet_type: BtcTestnetType,
    /// CKB fee rate in shannons per 1000 bytes
    pub ckb_fee_rate: u64,
    /// BTC fee rate in sat/vB
    pub btc_fee_rate: u64,
    /// Signature bytes reserved per lock group when sizing fees
    pub witness_lock_placeholder_size: usize,
    /// Fee reserved before the transaction size is known, in shannons
    pub initial_fee_budget: u64,
    /// Confirmations a BTC time lock waits for
    pub btc_time_lock_confirmations: u32,
    /// Value of every BTC output carrying RGB++ assets, in sats
    pub rgbpp_utxo_value: u64,
    /// Confirmations requested for the SPV proof
    pub spv_proof_confirmations: u32,
}

impl Default for RgbppConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            btc_testnet_type: BtcTestnetType::Testnet3,
            ckb_fee_rate: DEFAULT_CKB_FEE_RATE,
            btc_fee_rate: DEFAULT_BTC_FEE_RATE,
            witness_lock_placeholder_size: SECP256K1_WITNESS_LOCK_SIZE,
            initial_fee_budget: INITIAL_FEE_BUDGET,
            btc_time_lock_confirmations: BTC_TIME_LOCK_CONFIRMATIONS,
            rgbpp_utxo_value: RGBPP_UTXO_DUST,
            spv_proof_confirmations: 0,
        }
    }
}

impl RgbppConfig {
    /// Defaults for a network
    pub fn new(network: Network) -> Self {
        Self {
            network,
            ..Default::default()
        }
    }

    /// Script registry for the configured network
    pub fn scripts(&self) -> ScriptRegistry {
        ScriptRegistry::new(self.network, self.btc_testnet_type)
    }

    /// Bitcoin network paired with the configured CKB network
    pub fn btc_network(&self) -> bitcoin::Network {
        self.network.btc_network(self.btc_testnet_type)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from `RGBPP_*` environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(network) = std::env::var("RGBPP_NETWORK") {
            config.network = network.parse()?;
        }

        if let Ok(testnet_type) = std::env::var("RGBPP_BTC_TESTNET_TYPE") {
            config.btc_testnet_type = testnet_type.parse()?;
        }

        if let Some(rate) = env_number("RGBPP_CKB_FEE_RATE")? {
            config.ckb_fee_rate = rate;
        }

        if let Some(rate) = env_number("RGBPP_BTC_FEE_RATE")? {
            config.btc_fee_rate = rate;
        }

        if let Some(value) = env_number("RGBPP_UTXO_VALUE")? {
            config.rgbpp_utxo_value = value;
        }

        if let Some(confirmations) = env_number("RGBPP_BTC_TIME_LOCK_CONFIRMATIONS")? {
            config.btc_time_lock_confirmations = confirmations;
        }

        if let Some(confirmations) = env_number("RGBPP_SPV_PROOF_CONFIRMATIONS")? {
            config.spv_proof_confirmations = confirmations;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ckb_fee_rate < MIN_CKB_FEE_RATE {
            return Err(Error::Config(format!(
                "ckb_fee_rate {} is below the node minimum {}",
                self.ckb_fee_rate, MIN_CKB_FEE_RATE
            )));
        }

        if self.btc_fee_rate == 0 {
            return Err(Error::Config("btc_fee_rate must be greater than 0".into()));
        }

        if self.rgbpp_utxo_value < DUST_LIMIT_SATS {
            return Err(Error::Config(format!(
                "rgbpp_utxo_value {} is below the dust limit {}",
                self.rgbpp_utxo_value, DUST_LIMIT_SATS
            )));
        }

        if self.witness_lock_placeholder_size == 0 {
            return Err(Error::Config(
                "witness_lock_placeholder_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} is not a number: {}", key, raw))),
        Err(_) => Ok(None),
    }
}
