//! Chain and network identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One of the two ledgers an RGB++ asset can live on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Bitcoin
    Bitcoin,
    /// Nervos CKB
    Ckb,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Bitcoin => write!(f, "BTC"),
            Chain::Ckb => write!(f, "CKB"),
        }
    }
}

/// CKB network the scripts are deployed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Mainnet (Mirana), paired with Bitcoin mainnet
    Mainnet,
    /// Testnet (Pudge), paired with a Bitcoin test network
    #[default]
    Testnet,
}

impl Network {
    /// Whether this is mainnet
    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }

    /// Bitcoin network paired with this CKB network
    pub fn btc_network(&self, testnet_type: BtcTestnetType) -> bitcoin::Network {
        match (self, testnet_type) {
            (Network::Mainnet, _) => bitcoin::Network::Bitcoin,
            (Network::Testnet, BtcTestnetType::Testnet3) => bitcoin::Network::Testnet,
            (Network::Testnet, BtcTestnetType::Signet) => bitcoin::Network::Signet,
        }
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "mirana" => Ok(Network::Mainnet),
            "testnet" | "pudge" => Ok(Network::Testnet),
            other => Err(Error::Config(format!("unknown network: {}", other))),
        }
    }
}

/// Bitcoin test network an RGB++ testnet deployment is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BtcTestnetType {
    /// Bitcoin testnet3
    #[default]
    Testnet3,
    /// Bitcoin signet
    Signet,
}

impl FromStr for BtcTestnetType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "testnet" | "testnet3" => Ok(BtcTestnetType::Testnet3),
            "signet" => Ok(BtcTestnetType::Signet),
            other => Err(Error::Config(format!("unknown BTC testnet type: {}", other))),
        }
    }
}
