//! RGB++ PSBT construction and finalization.
//!
//! An RGB++ BTC transaction spends the UTXOs bound to the moved cells first,
//! then fee UTXOs picked by the selector. Its outputs are the commitment at
//! index 0, the outputs the CKB side binds to, and change last.

use std::collections::HashSet;

use bitcoin::consensus::encode::serialize;
use bitcoin::psbt::Psbt;
use bitcoin::{
    absolute::LockTime, transaction::Version, Amount, OutPoint, ScriptBuf, Sequence, Transaction,
    TxIn, TxOut, Witness,
};
use serde::{Deserialize, Serialize};

use crate::btc::utxo::Utxo;
use crate::error::{Error, Result};
use crate::selector::{select_inputs, CandidateFilter};
use crate::utils::constants::DUST_LIMIT_SATS;

/// Estimated virtual size for different input types
pub mod vsize {
    /// P2WPKH input vsize
    pub const P2WPKH_INPUT: u64 = 68;
    /// P2TR key path input vsize
    pub const P2TR_KEYPATH_INPUT: u64 = 58;
    /// Standard output vsize
    pub const P2WPKH_OUTPUT: u64 = 31;
    /// OP_RETURN output carrying 32 bytes
    pub const OP_RETURN_OUTPUT: u64 = 43;
    /// Transaction overhead
    pub const TX_OVERHEAD: u64 = 11;

    /// vsize of spending `utxo`
    pub fn input(utxo: &super::Utxo) -> u64 {
        if utxo.is_p2tr() {
            P2TR_KEYPATH_INPUT
        } else {
            P2WPKH_INPUT
        }
    }

    /// vsize of an output: value, script length and script
    pub fn output(txout: &super::TxOut) -> u64 {
        9 + txout.script_pubkey.len() as u64
    }
}

/// Fee rate in satoshis per virtual byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRate(u64);

impl FeeRate {
    /// Minimum relay fee (1 sat/vB)
    pub const MIN: Self = Self(1);

    /// Create from sat/vB
    pub fn from_sat_per_vb(rate: u64) -> Self {
        Self(rate.max(1))
    }

    /// Get rate as sat/vB
    pub fn sat_per_vb(&self) -> u64 {
        self.0
    }

    /// Calculate fee for a given vsize
    pub fn fee_for_vsize(&self, vsize: u64) -> u64 {
        self.0.saturating_mul(vsize)
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self(crate::utils::constants::DEFAULT_BTC_FEE_RATE)
    }
}

/// Unsigned PSBT with the choices made while building it
#[derive(Debug, Clone)]
pub struct BuiltPsbt {
    /// The PSBT, every input carrying its witness UTXO
    pub psbt: Psbt,
    /// Fee UTXOs appended after the RGB++ inputs
    pub fee_inputs: Vec<Utxo>,
    /// Fee paid, in sats
    pub fee: u64,
    /// Change value, if a change output was added
    pub change: Option<u64>,
}

/// Build an unsigned RGB++ PSBT.
///
/// `outputs` must start with the commitment output. Fee UTXOs are chosen from
/// `fee_candidates`, in order, skipping the RGB++ inputs and anything
/// `filter` rejects. Change below the dust limit is left to the miner.
pub fn build_rgbpp_psbt(
    rgbpp_inputs: &[Utxo],
    outputs: Vec<TxOut>,
    fee_candidates: &[Utxo],
    change_script: ScriptBuf,
    fee_rate: FeeRate,
    filter: Option<&dyn CandidateFilter<Utxo>>,
) -> Result<BuiltPsbt> {
    if !outputs.first().is_some_and(|o| o.script_pubkey.is_op_return()) {
        return Err(Error::InvariantViolation(
            "output 0 must carry the commitment".into(),
        ));
    }

    let sum_in: u64 = rgbpp_inputs.iter().map(|u| u.value).sum();
    let sum_out: u64 = outputs.iter().map(|o| o.value.to_sat()).sum();
    let change_vsize = 9 + change_script.len() as u64;
    let base_vsize = vsize::TX_OVERHEAD
        + rgbpp_inputs.iter().map(vsize::input).sum::<u64>()
        + outputs.iter().map(vsize::output).sum::<u64>()
        + change_vsize;

    let bound: HashSet<OutPoint> = rgbpp_inputs.iter().map(Utxo::outpoint).collect();
    let accept = |utxo: &Utxo| {
        !bound.contains(&utxo.outpoint()) && filter.map_or(true, |f| f.accept(utxo))
    };

    let mut assumed_inputs = 0u64;
    let (fee_inputs, fee) = loop {
        let target = (sum_out + fee_rate.fee_for_vsize(base_vsize)).saturating_sub(sum_in);
        let budget = fee_rate.fee_for_vsize(vsize::P2WPKH_INPUT * assumed_inputs);
        let selection = select_inputs(fee_candidates, target, budget, Some(&accept)).map_err(
            |e| match e {
                Error::InsufficientCapacity { required, available } => {
                    Error::InsufficientBtcBalance {
                        required: required + sum_in,
                        available: available + sum_in,
                    }
                }
                other => other,
            },
        )?;

        let vsize = base_vsize + selection.selected.iter().map(vsize::input).sum::<u64>();
        let fee = fee_rate.fee_for_vsize(vsize);
        if sum_in + selection.sum_value >= sum_out + fee {
            break (selection.selected, fee);
        }
        assumed_inputs = selection.selected.len() as u64 + 1;
    };

    let total_in = sum_in + fee_inputs.iter().map(|u| u.value).sum::<u64>();
    let change = total_in - sum_out - fee;

    let input: Vec<TxIn> = rgbpp_inputs
        .iter()
        .chain(fee_inputs.iter())
        .map(|u| TxIn {
            previous_output: u.outpoint(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::default(),
        })
        .collect();

    let mut output = outputs;
    let change = if change >= DUST_LIMIT_SATS {
        output.push(TxOut {
            value: Amount::from_sat(change),
            script_pubkey: change_script,
        });
        Some(change)
    } else {
        None
    };

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output,
    };

    let mut psbt = Psbt::from_unsigned_tx(tx).map_err(|e| Error::Psbt(e.to_string()))?;
    for (psbt_input, utxo) in psbt
        .inputs
        .iter_mut()
        .zip(rgbpp_inputs.iter().chain(fee_inputs.iter()))
    {
        psbt_input.witness_utxo = Some(utxo.to_tx_out());
    }

    Ok(BuiltPsbt {
        psbt,
        fee_inputs,
        fee: total_in - sum_out - change.unwrap_or(0),
        change,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION & FINALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Hex of the serialized PSBT, as handed to wallets
pub fn psbt_to_hex(psbt: &Psbt) -> String {
    hex::encode(psbt.serialize())
}

/// Parse a PSBT returned by a wallet
pub fn psbt_from_hex(psbt_hex: &str) -> Result<Psbt> {
    let bytes = crate::utils::hex::from_hex(psbt_hex)?;
    Psbt::deserialize(&bytes).map_err(|e| Error::Psbt(e.to_string()))
}

/// Turn signatures into final witnesses: `[sig, pubkey]` for P2WPKH, `[sig]`
/// for a taproot key path. Inputs already finalized are left alone.
pub fn finalize_psbt(psbt: &mut Psbt) -> Result<()> {
    for (index, input) in psbt.inputs.iter_mut().enumerate() {
        if input.final_script_witness.is_some() {
            continue;
        }

        let witness = if let Some(signature) = &input.tap_key_sig {
            Witness::p2tr_key_spend(signature)
        } else if let Some((pubkey, signature)) = input.partial_sigs.iter().next() {
            Witness::p2wpkh(signature, &pubkey.inner)
        } else {
            return Err(Error::Psbt(format!("input {} is not signed", index)));
        };

        input.final_script_witness = Some(witness);
        input.partial_sigs.clear();
        input.tap_key_sig = None;
        input.bip32_derivation.clear();
        input.tap_key_origins.clear();
    }
    Ok(())
}

/// Finalize and extract the network transaction
pub fn extract_transaction(mut psbt: Psbt) -> Result<Transaction> {
    finalize_psbt(&mut psbt)?;
    Ok(psbt.extract_tx_unchecked_fee_rate())
}

/// Serialization of `tx` without witness data, as embedded in the unlock witness
pub fn strip_witness(tx: &Transaction) -> Vec<u8> {
    let mut stripped = tx.clone();
    for input in &mut stripped.input {
        input.witness = Witness::default();
    }
    serialize(&stripped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btc::scripts::OpReturnBuilder;
    use bitcoin::hashes::Hash;
    use bitcoin::Txid;

    fn p2wpkh_script() -> ScriptBuf {
        ScriptBuf::new_p2wpkh(&bitcoin::WPubkeyHash::from_byte_array([7; 20]))
    }

    fn utxo(n: u8, value: u64) -> Utxo {
        Utxo::new(Txid::from_byte_array([n; 32]), 0, value, p2wpkh_script())
    }

    fn outputs() -> Vec<TxOut> {
        vec![
            OpReturnBuilder::commitment_output(&[1; 32]).unwrap(),
            TxOut {
                value: Amount::from_sat(546),
                script_pubkey: p2wpkh_script(),
            },
        ]
    }

    #[test]
    fn test_fee_rate_minimum() {
        assert_eq!(FeeRate::from_sat_per_vb(0), FeeRate::MIN);
        assert_eq!(FeeRate::from_sat_per_vb(10).fee_for_vsize(100), 1_000);
    }

    #[test]
    fn test_output_vsize_matches_constants() {
        let out = &outputs();
        assert_eq!(vsize::output(&out[0]), vsize::OP_RETURN_OUTPUT);
        assert_eq!(vsize::output(&out[1]), vsize::P2WPKH_OUTPUT);
    }

    #[test]
    fn test_layout_rgbpp_inputs_first_change_last() {
        let rgbpp = vec![utxo(1, 546)];
        let candidates = vec![utxo(1, 546), utxo(2, 1_000), utxo(3, 50_000)];
        let built = build_rgbpp_psbt(
            &rgbpp,
            outputs(),
            &candidates,
            p2wpkh_script(),
            FeeRate::from_sat_per_vb(10),
            None,
        )
        .unwrap();

        let tx = &built.psbt.unsigned_tx;
        assert_eq!(tx.input[0].previous_output, rgbpp[0].outpoint());
        assert!(tx.input.iter().skip(1).all(|i| i.previous_output != rgbpp[0].outpoint()));
        assert!(tx.output[0].script_pubkey.is_op_return());
        assert_eq!(tx.output.len(), 3);
        assert!(built.psbt.inputs.iter().all(|i| i.witness_utxo.is_some()));

        let total_in: u64 = 546 + built.fee_inputs.iter().map(|u| u.value).sum::<u64>();
        let total_out: u64 = tx.output.iter().map(|o| o.value.to_sat()).sum();
        assert_eq!(total_in - total_out, built.fee);
    }

    #[test]
    fn test_filter_hook_skips_candidates() {
        let candidates = vec![utxo(2, 100_000), utxo(3, 100_000)];
        let skip_first = |u: &Utxo| u.txid != Txid::from_byte_array([2; 32]);
        let built = build_rgbpp_psbt(
            &[utxo(1, 546)],
            outputs(),
            &candidates,
            p2wpkh_script(),
            FeeRate::default(),
            Some(&skip_first),
        )
        .unwrap();
        assert_eq!(built.fee_inputs, vec![utxo(3, 100_000)]);
    }

    #[test]
    fn test_insufficient_btc() {
        let err = build_rgbpp_psbt(
            &[utxo(1, 546)],
            outputs(),
            &[utxo(2, 600)],
            p2wpkh_script(),
            FeeRate::from_sat_per_vb(10),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InsufficientBtcBalance { .. }));
    }

    #[test]
    fn test_missing_commitment_rejected() {
        let mut outs = outputs();
        outs.remove(0);
        let err = build_rgbpp_psbt(&[], outs, &[], p2wpkh_script(), FeeRate::MIN, None).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_unsigned_psbt_cannot_finalize() {
        let built = build_rgbpp_psbt(
            &[utxo(1, 546)],
            outputs(),
            &[utxo(2, 100_000)],
            p2wpkh_script(),
            FeeRate::MIN,
            None,
        )
        .unwrap();
        let hex = psbt_to_hex(&built.psbt);
        let parsed = psbt_from_hex(&hex).unwrap();
        assert_eq!(parsed, built.psbt);
        assert!(matches!(extract_transaction(parsed), Err(Error::Psbt(_))));
    }

    #[test]
    fn test_strip_witness() {
        let mut tx = outputs_tx();
        tx.input[0].witness = Witness::from_slice(&[vec![1u8; 72], vec![2u8; 33]]);
        let stripped = strip_witness(&tx);
        tx.input[0].witness = Witness::default();
        assert_eq!(stripped, serialize(&tx));
    }

    fn outputs_tx() -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: utxo(1, 546).outpoint(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            }],
            output: outputs(),
        }
    }
}
