//! Bitcoin UTXOs as returned by the data source.

use bitcoin::{Amount, OutPoint, ScriptBuf, TxOut, Txid};
use serde::{Deserialize, Serialize};

use crate::codec::rgbpp::RgbppLockArgs;
use crate::selector::Valued;

/// Represents an unspent transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Transaction ID containing this output
    pub txid: Txid,
    /// Output index within the transaction
    pub vout: u32,
    /// Value in satoshis
    pub value: u64,
    /// The locking script (scriptPubKey)
    pub script_pubkey: ScriptBuf,
    /// Whether the output is in a block
    #[serde(default)]
    pub confirmed: bool,
}

impl Utxo {
    /// Create a new confirmed UTXO
    pub fn new(txid: Txid, vout: u32, value: u64, script_pubkey: ScriptBuf) -> Self {
        Self {
            txid,
            vout,
            value,
            script_pubkey,
            confirmed: true,
        }
    }

    /// Get the outpoint for this UTXO
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }

    /// Convert to TxOut
    pub fn to_tx_out(&self) -> TxOut {
        TxOut {
            value: Amount::from_sat(self.value),
            script_pubkey: self.script_pubkey.clone(),
        }
    }

    /// Whether spending this output takes a taproot key-path witness
    pub fn is_p2tr(&self) -> bool {
        self.script_pubkey.is_p2tr()
    }

    /// RGB++ lock args binding CKB cells to this output
    pub fn rgbpp_lock_args(&self) -> RgbppLockArgs {
        RgbppLockArgs::new(self.vout, &self.txid)
    }
}

impl Valued for Utxo {
    fn value(&self) -> u64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn test_txid() -> Txid {
        Txid::from_str("0000000000000000000000000000000000000000000000000000000000000001").unwrap()
    }

    #[test]
    fn test_utxo_creation() {
        let utxo = Utxo::new(test_txid(), 2, 100_000, ScriptBuf::new());

        assert_eq!(Valued::value(&utxo), 100_000);
        assert!(utxo.confirmed);
        assert!(!utxo.is_p2tr());
        assert_eq!(utxo.outpoint().vout, 2);
    }

    #[test]
    fn test_rgbpp_lock_args_bind_outpoint() {
        let utxo = Utxo::new(test_txid(), 3, 546, ScriptBuf::new());
        let args = utxo.rgbpp_lock_args();
        assert_eq!(args.out_index, 3);
        assert_eq!(args.txid(), test_txid());
        // Displayed hex ends in 01, so the internal order starts with it
        assert_eq!(args.btc_txid.0[0], 1);
    }
}
