//! RGB++ binding layouts.
//!
//! - RGB++ lock args: `u32_le out_index ‖ btc_txid` (36 bytes)
//! - BTC time lock args: `table BTCTimeLock { lock_script, after, btc_txid }`
//! - RGB++ unlock witness: `table RGBPPUnlock { version, extra_data, btc_tx, btc_tx_proof }`
//!
//! BTC txids are stored in Bitcoin's internal byte order, the reverse of the
//! hex shown by block explorers.

use bitcoin::hashes::Hash;
use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use crate::ckb::types::Script;
use crate::codec::hash::H256;
use crate::codec::molecule::*;
use crate::error::{Error, Result};
use crate::utils::constants::{RGBPP_LOCK_ARGS_SIZE, RGBPP_TX_ID_PLACEHOLDER, RGBPP_UNLOCK_VERSION};

// ═══════════════════════════════════════════════════════════════════════════════
// RGB++ LOCK ARGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Binds a CKB cell to a Bitcoin outpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RgbppLockArgs {
    /// Output index in the BTC transaction
    pub out_index: u32,
    /// BTC txid, internal byte order
    pub btc_txid: H256,
}

impl RgbppLockArgs {
    /// Args for a known Bitcoin outpoint
    pub fn new(out_index: u32, txid: &Txid) -> Self {
        Self {
            out_index,
            btc_txid: H256(txid.to_byte_array()),
        }
    }

    /// Args whose BTC txid is filled in once the BTC transaction is broadcast
    pub fn placeholder(out_index: u32) -> Self {
        Self {
            out_index,
            btc_txid: H256(RGBPP_TX_ID_PLACEHOLDER),
        }
    }

    /// Whether the txid is still the placeholder
    pub fn is_placeholder(&self) -> bool {
        self.btc_txid.0 == RGBPP_TX_ID_PLACEHOLDER
    }

    /// The bound BTC txid
    pub fn txid(&self) -> Txid {
        Txid::from_byte_array(self.btc_txid.0)
    }

    /// Encode to lock args
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RGBPP_LOCK_ARGS_SIZE);
        out.extend_from_slice(&pack_u32(self.out_index));
        out.extend_from_slice(&self.btc_txid.0);
        out
    }

    /// Decode lock args; any width other than 36 bytes is rejected
    pub fn decode(args: &[u8]) -> Result<Self> {
        if args.len() != RGBPP_LOCK_ARGS_SIZE {
            return Err(Error::MalformedBindingArgs {
                expected: RGBPP_LOCK_ARGS_SIZE,
                actual: args.len(),
            });
        }
        Ok(Self {
            out_index: unpack_u32(&args[..4], "RgbppLockArgs.out_index")?,
            btc_txid: H256::from_slice(&args[4..])?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BTC TIME LOCK ARGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Credits a cell to `lock_script` once `btc_txid` has `after` confirmations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcTimeLockArgs {
    /// Lock the cell is released to
    pub lock_script: Script,
    /// Required BTC confirmations
    pub after: u32,
    /// BTC txid, internal byte order
    pub btc_txid: H256,
}

impl BtcTimeLockArgs {
    /// Args whose BTC txid is filled in once the BTC transaction is broadcast
    pub fn placeholder(lock_script: Script, after: u32) -> Self {
        Self {
            lock_script,
            after,
            btc_txid: H256(RGBPP_TX_ID_PLACEHOLDER),
        }
    }

    /// Whether the txid is still the placeholder
    pub fn is_placeholder(&self) -> bool {
        self.btc_txid.0 == RGBPP_TX_ID_PLACEHOLDER
    }

    /// Molecule encoding
    pub fn encode(&self) -> Vec<u8> {
        pack_table(&[
            self.lock_script.to_bytes(),
            pack_u32(self.after).to_vec(),
            self.btc_txid.0.to_vec(),
        ])
    }

    /// Decode the molecule encoding
    pub fn decode(args: &[u8]) -> Result<Self> {
        let fields = unpack_table(args, 3, "BTCTimeLock")?;
        Ok(Self {
            lock_script: Script::from_slice(fields[0])?,
            after: unpack_u32(fields[1], "BTCTimeLock.after")?,
            btc_txid: H256::from_slice(fields[2])?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RGB++ UNLOCK WITNESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Number of inputs and outputs covered by the commitment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraCommitmentData {
    /// Committed inputs
    pub input_len: u8,
    /// Committed outputs
    pub output_len: u8,
}

/// Witness lock of an RGB++ input: the BTC transaction and its SPV proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbppUnlock {
    /// Witness version
    pub version: u16,
    /// Committed range
    pub extra_data: ExtraCommitmentData,
    /// BTC transaction without witness data
    pub btc_tx: Vec<u8>,
    /// SPV proof of the BTC transaction
    pub btc_tx_proof: Vec<u8>,
}

impl RgbppUnlock {
    /// Current-version unlock
    pub fn new(extra_data: ExtraCommitmentData, btc_tx: Vec<u8>, btc_tx_proof: Vec<u8>) -> Self {
        Self {
            version: RGBPP_UNLOCK_VERSION,
            extra_data,
            btc_tx,
            btc_tx_proof,
        }
    }

    /// Molecule encoding
    pub fn encode(&self) -> Vec<u8> {
        pack_table(&[
            pack_u16(self.version).to_vec(),
            vec![self.extra_data.input_len, self.extra_data.output_len],
            pack_bytes(&self.btc_tx),
            pack_bytes(&self.btc_tx_proof),
        ])
    }

    /// Decode the molecule encoding
    pub fn decode(data: &[u8]) -> Result<Self> {
        let fields = unpack_table(data, 4, "RGBPPUnlock")?;
        let extra_data = match fields[1] {
            [input_len, output_len] => ExtraCommitmentData {
                input_len: *input_len,
                output_len: *output_len,
            },
            other => {
                return Err(Error::encoding(
                    "RGBPPUnlock.extra_data",
                    format!("expected 2 bytes, got {}", other.len()),
                ))
            }
        };
        Ok(Self {
            version: unpack_u16(fields[0], "RGBPPUnlock.version")?,
            extra_data,
            btc_tx: unpack_bytes(fields[2], "RGBPPUnlock.btc_tx")?,
            btc_tx_proof: unpack_bytes(fields[3], "RGBPPUnlock.btc_tx_proof")?,
        })
    }
}
