//! Caller-facing descriptions of cross-chain operations.
//!
//! Intents are per-call values; nothing here is persisted.

use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use crate::btc::signer::SignInput;
use crate::ckb::types::Script;
use crate::codec::rgbpp::RgbppLockArgs;
use crate::codec::spore::ClusterData;
use crate::codec::token_info::TokenInfo;
use crate::core::network::Chain;
use crate::core::scripts::{ScriptKind, ScriptRegistry};
use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// ASSETS
// ═══════════════════════════════════════════════════════════════════════════════

/// Which asset an operation moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AssetIdentity {
    /// Fungible xUDT, by type args
    Xudt {
        /// xUDT type script args
        #[serde(with = "crate::utils::hex::bytes")]
        type_args: Vec<u8>,
    },
    /// A single spore, by type args
    Spore {
        /// Spore type script args (the spore id)
        #[serde(with = "crate::utils::hex::bytes")]
        type_args: Vec<u8>,
    },
    /// A cluster, by its data
    Cluster(ClusterData),
}

impl AssetIdentity {
    /// Type script of the asset on the registry's network
    pub fn type_script(&self, scripts: &ScriptRegistry) -> Result<Script> {
        match self {
            AssetIdentity::Xudt { type_args } => Ok(scripts.xudt_type(type_args.clone())),
            AssetIdentity::Spore { type_args } => {
                Ok(scripts.script(ScriptKind::Spore, type_args.clone()))
            }
            AssetIdentity::Cluster(data) => Err(Error::invalid_param(
                "asset",
                format!("cluster {} has no transferable type script", data.name),
            )),
        }
    }

    /// Whether the asset is moved as a whole cell
    pub fn is_whole_cell(&self) -> bool {
        !matches!(self, AssetIdentity::Xudt { .. })
    }

    /// Type script kind the asset resolves to
    pub fn script_kind(&self) -> ScriptKind {
        match self {
            AssetIdentity::Xudt { .. } => ScriptKind::Xudt,
            AssetIdentity::Spore { .. } => ScriptKind::Spore,
            AssetIdentity::Cluster(_) => ScriptKind::Cluster,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARTIES & RECEIVERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Where an amount goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Receiver {
    /// A new output of the BTC transaction paying this address
    BtcAddress {
        /// BTC address
        address: String,
        /// Amount (ignored for whole-cell assets)
        amount: u128,
    },
    /// An existing BTC outpoint, for CKB→BTC leaps
    BtcOutPoint {
        /// BTC txid
        txid: Txid,
        /// Output index
        vout: u32,
        /// Amount (ignored for whole-cell assets)
        amount: u128,
    },
    /// A CKB lock
    Ckb {
        /// Receiving lock
        lock: Script,
        /// Amount (ignored for whole-cell assets)
        amount: u128,
    },
}

impl Receiver {
    /// Amount moved to this receiver
    pub fn amount(&self) -> u128 {
        match self {
            Receiver::BtcAddress { amount, .. }
            | Receiver::BtcOutPoint { amount, .. }
            | Receiver::Ckb { amount, .. } => *amount,
        }
    }

    /// Chain the receiver lives on
    pub fn chain(&self) -> Chain {
        match self {
            Receiver::BtcAddress { .. } | Receiver::BtcOutPoint { .. } => Chain::Bitcoin,
            Receiver::Ckb { .. } => Chain::Ckb,
        }
    }
}

/// Bitcoin wallet taking part in an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcParty {
    /// Address holding the source UTXOs, also the change address
    pub address: String,
    /// Hex public key, when the wallet signs by key
    #[serde(default)]
    pub public_key: Option<String>,
}

impl BtcParty {
    /// How the wallet should pick the key for this party's inputs
    pub fn sign_input(&self) -> SignInput {
        match &self.public_key {
            Some(key) => SignInput::ByPublicKey(key.clone()),
            None => SignInput::ByAddress(self.address.clone()),
        }
    }
}

/// CKB wallet taking part in an operation: the asset owner for CKB sources,
/// the fee payer for RGB++ transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CkbParty {
    /// Owner lock
    pub lock: Script,
}

/// Per-call fee overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParams {
    /// CKB fee rate in shannons per 1000 bytes
    #[serde(default)]
    pub ckb_fee_rate: Option<u64>,
    /// BTC fee rate in sat/vB
    #[serde(default)]
    pub btc_fee_rate: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// INTENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Move an asset within or across chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIntent {
    /// Chain the asset leaves
    pub source_chain: Chain,
    /// Chain the asset arrives on
    pub destination_chain: Chain,
    /// Asset moved
    pub asset: AssetIdentity,
    /// Receivers, in output order
    pub receivers: Vec<Receiver>,
    /// BTC wallet holding the source UTXOs
    #[serde(default)]
    pub btc_party: Option<BtcParty>,
    /// CKB wallet owning the asset or paying the CKB fee
    #[serde(default)]
    pub ckb_party: Option<CkbParty>,
    /// Fee overrides
    #[serde(default)]
    pub fee: FeeParams,
}

impl TransferIntent {
    /// Check the intent is complete and consistent before anything is built
    pub fn validate(&self) -> Result<()> {
        if self.receivers.is_empty() {
            return Err(Error::invalid_param("receivers", "at least one receiver is required"));
        }
        if self.asset.is_whole_cell() && self.receivers.len() != 1 {
            return Err(Error::invalid_param(
                "receivers",
                "a whole-cell asset goes to exactly one receiver",
            ));
        }
        if !self.asset.is_whole_cell() && self.receivers.iter().any(|r| r.amount() == 0) {
            return Err(Error::ZeroAmount);
        }
        if matches!(self.asset, AssetIdentity::Cluster(_)) {
            return Err(Error::invalid_param("asset", "clusters are not transferable"));
        }

        for (index, receiver) in self.receivers.iter().enumerate() {
            let expected = match (self.source_chain, receiver) {
                (_, Receiver::Ckb { .. }) => self.destination_chain == Chain::Ckb,
                (Chain::Bitcoin, Receiver::BtcAddress { .. }) => self.destination_chain == Chain::Bitcoin,
                (Chain::Ckb, Receiver::BtcOutPoint { .. }) => self.destination_chain == Chain::Bitcoin,
                _ => false,
            };
            if !expected {
                return Err(Error::invalid_param(
                    format!("receivers[{}]", index),
                    format!(
                        "receiver does not fit a {} to {} transfer",
                        self.source_chain, self.destination_chain
                    ),
                ));
            }
        }

        if self.source_chain == Chain::Bitcoin && self.btc_party.is_none() {
            return Err(Error::invalid_param("btc_party", "required when the source is BTC"));
        }
        if self.ckb_party.is_none() {
            let reason = match self.source_chain {
                Chain::Ckb => "required as the asset owner",
                Chain::Bitcoin => "required to pay the CKB fee",
            };
            return Err(Error::invalid_param("ckb_party", reason));
        }
        Ok(())
    }
}

/// Issue an xUDT bound to Bitcoin from a prepared launch cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchIntent {
    /// Outpoint the launch cell is bound to, spent by the BTC transaction
    pub owned_utxo: RgbppLockArgs,
    /// Token metadata
    pub token_info: TokenInfo,
    /// Supply in whole tokens, scaled by `10^decimal`
    pub total_supply: u128,
    /// BTC wallet owning `owned_utxo`; receives the supply
    pub btc_party: BtcParty,
    /// CKB fee payer
    pub ckb_party: CkbParty,
    /// Fee overrides
    #[serde(default)]
    pub fee: FeeParams,
}

impl LaunchIntent {
    /// Check the intent before anything is built
    pub fn validate(&self) -> Result<()> {
        if self.total_supply == 0 {
            return Err(Error::ZeroAmount);
        }
        if self.owned_utxo.is_placeholder() {
            return Err(Error::invalid_param(
                "owned_utxo",
                "must reference a broadcast BTC transaction",
            ));
        }
        Ok(())
    }
}
