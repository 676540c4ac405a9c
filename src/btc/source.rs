//! Bitcoin data source.
//!
//! UTXO listing, transaction lookup, broadcast and SPV proofs come from an
//! external service behind [`BtcDataSource`]. [`MemoryBtcSource`] serves
//! tests and offline tooling.

use async_trait::async_trait;
use bitcoin::consensus::encode::{deserialize, serialize_hex};
use bitcoin::{Transaction, Txid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

use crate::btc::utxo::Utxo;
use crate::ckb::types::OutPoint;
use crate::core::network::Chain;
use crate::error::{Error, Result};
use crate::utils::hex;

/// What the data source knows about a BTC transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcTransactionInfo {
    /// Transaction id
    pub txid: Txid,
    /// Whether the transaction is in a block
    pub confirmed: bool,
    /// Height of the including block
    pub block_height: Option<u32>,
}

/// SPV proof of a BTC transaction, checked on CKB by the SPV client cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpvProof {
    /// CKB cell holding the SPV client the proof verifies against
    pub spv_client: OutPoint,
    /// Proof bytes
    #[serde(with = "hex::bytes")]
    pub proof: Vec<u8>,
}

/// Source of Bitcoin chain data
#[async_trait]
pub trait BtcDataSource: Send + Sync {
    /// Unspent outputs of `address`
    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>>;

    /// A transaction, if known
    async fn get_transaction(&self, txid: &Txid) -> Result<Option<BtcTransactionInfo>>;

    /// One page of `address` history, newest first, strictly after `after_txid`
    async fn get_address_transactions(
        &self,
        address: &str,
        after_txid: Option<&Txid>,
    ) -> Result<Vec<BtcTransactionInfo>>;

    /// Broadcast a raw transaction, returning its txid
    async fn broadcast(&self, tx_hex: &str) -> Result<Txid>;

    /// SPV proof for `txid` at `confirmations` depth
    async fn get_rgbpp_spv_proof(&self, txid: &Txid, confirmations: u32) -> Result<SpvProof>;
}

/// Broadcast `tx` once; every failure surfaces as a Bitcoin submission error
pub async fn broadcast_transaction(source: &dyn BtcDataSource, tx: &Transaction) -> Result<Txid> {
    let txid = source.broadcast(&serialize_hex(tx)).await.map_err(|e| match e {
        Error::NetworkSubmission { .. } => e,
        other => Error::NetworkSubmission {
            chain: Chain::Bitcoin,
            reason: other.to_string(),
        },
    })?;
    info!("BTC transaction {} broadcast", txid);
    Ok(txid)
}

/// Walk `address` history page by page, up to `max_pages`
pub async fn address_history(
    source: &dyn BtcDataSource,
    address: &str,
    max_pages: usize,
) -> Result<Vec<BtcTransactionInfo>> {
    let mut history: Vec<BtcTransactionInfo> = Vec::new();

    for _ in 0..max_pages {
        let cursor = history.last().map(|tx| tx.txid);
        let page = source.get_address_transactions(address, cursor.as_ref()).await?;
        if page.is_empty() {
            break;
        }
        history.extend(page);
    }

    Ok(history)
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct MemoryState {
    utxos: HashMap<String, Vec<Utxo>>,
    history: HashMap<String, Vec<BtcTransactionInfo>>,
    transactions: HashMap<Txid, BtcTransactionInfo>,
    broadcasts: Vec<Transaction>,
    broadcast_error: Option<String>,
}

/// In-memory data source (for testing and offline use)
#[derive(Debug)]
pub struct MemoryBtcSource {
    state: RwLock<MemoryState>,
    spv_client: OutPoint,
    page_size: usize,
}

impl MemoryBtcSource {
    /// Create a source whose proofs point at `spv_client`
    pub fn new(spv_client: OutPoint) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            spv_client,
            page_size: 10,
        }
    }

    /// Set the history page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|e| Error::DataSource(format!("Lock error: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|e| Error::DataSource(format!("Lock error: {}", e)))
    }

    /// Add an unspent output to `address`
    pub fn add_utxo(&self, address: &str, utxo: Utxo) -> Result<()> {
        self.write()?.utxos.entry(address.to_string()).or_default().push(utxo);
        Ok(())
    }

    /// Record a transaction in `address` history, newest first
    pub fn add_history(&self, address: &str, info: BtcTransactionInfo) -> Result<()> {
        let mut state = self.write()?;
        state.transactions.insert(info.txid, info.clone());
        state.history.entry(address.to_string()).or_default().insert(0, info);
        Ok(())
    }

    /// Mark a known transaction as mined at `height`
    pub fn confirm(&self, txid: &Txid, height: u32) -> Result<()> {
        let mut state = self.write()?;
        let info = state
            .transactions
            .get_mut(txid)
            .ok_or_else(|| Error::DataSource(format!("unknown transaction {}", txid)))?;
        info.confirmed = true;
        info.block_height = Some(height);
        Ok(())
    }

    /// Make every following broadcast fail with `reason`
    pub fn fail_broadcasts(&self, reason: impl Into<String>) -> Result<()> {
        self.write()?.broadcast_error = Some(reason.into());
        Ok(())
    }

    /// Transactions accepted so far
    pub fn broadcasts(&self) -> Result<Vec<Transaction>> {
        Ok(self.read()?.broadcasts.clone())
    }
}

#[async_trait]
impl BtcDataSource for MemoryBtcSource {
    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>> {
        Ok(self.read()?.utxos.get(address).cloned().unwrap_or_default())
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<Option<BtcTransactionInfo>> {
        Ok(self.read()?.transactions.get(txid).cloned())
    }

    async fn get_address_transactions(
        &self,
        address: &str,
        after_txid: Option<&Txid>,
    ) -> Result<Vec<BtcTransactionInfo>> {
        let state = self.read()?;
        let history = state.history.get(address).map(Vec::as_slice).unwrap_or_default();
        let start = match after_txid {
            Some(cursor) => history
                .iter()
                .position(|tx| &tx.txid == cursor)
                .map_or(history.len(), |i| i + 1),
            None => 0,
        };
        Ok(history.iter().skip(start).take(self.page_size).cloned().collect())
    }

    async fn broadcast(&self, tx_hex: &str) -> Result<Txid> {
        let mut state = self.write()?;
        if let Some(reason) = &state.broadcast_error {
            return Err(Error::NetworkSubmission {
                chain: Chain::Bitcoin,
                reason: reason.clone(),
            });
        }

        let tx: Transaction = deserialize(&hex::from_hex(tx_hex)?)
            .map_err(|e| Error::encoding("BTC transaction", e.to_string()))?;
        let txid = tx.compute_txid();

        for input in &tx.input {
            for utxos in state.utxos.values_mut() {
                utxos.retain(|u| u.outpoint() != input.previous_output);
            }
        }
        state.transactions.insert(
            txid,
            BtcTransactionInfo {
                txid,
                confirmed: false,
                block_height: None,
            },
        );
        state.broadcasts.push(tx);
        Ok(txid)
    }

    async fn get_rgbpp_spv_proof(&self, txid: &Txid, _confirmations: u32) -> Result<SpvProof> {
        if !self.read()?.transactions.contains_key(txid) {
            return Err(Error::DataSource(format!("no proof for unknown transaction {}", txid)));
        }
        Ok(SpvProof {
            spv_client: self.spv_client.clone(),
            proof: txid.to_string().into_bytes(),
        })
    }
}
