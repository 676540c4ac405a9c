//! CKB fee estimation and change settlement.

use tracing::debug;

use crate::ckb::types::{CkbTransaction, Witness, WitnessArgs};
use crate::error::{Error, Result};

/// Fee for `tx_size` bytes at `fee_rate` shannons per 1000 bytes, rounded up
pub fn calculate_transaction_fee(tx_size: usize, fee_rate: u64) -> u64 {
    let product = (tx_size as u128) * (fee_rate as u128);
    product.div_ceil(1000) as u64
}

/// Fee for a transaction of `tx_size` bytes plus a signature placeholder
pub fn estimate_fee(tx_size: usize, fee_rate: u64, witness_placeholder_size: usize) -> u64 {
    calculate_transaction_fee(tx_size + witness_placeholder_size, fee_rate)
}

/// Serialized size of `tx` once every structured witness with an empty lock
/// carries a `witness_lock_size`-byte signature
pub fn signed_size(tx: &CkbTransaction, witness_lock_size: usize) -> usize {
    let mut signed = tx.clone();
    for witness in &mut signed.witnesses {
        if let Witness::Args(args @ WitnessArgs { lock: None, .. }) = witness {
            args.lock = Some(vec![0u8; witness_lock_size]);
        }
    }
    signed.serialized_size_in_block()
}

/// Fee for `tx` at its signed size
pub fn estimate_tx_fee(tx: &CkbTransaction, fee_rate: u64, witness_lock_size: usize) -> u64 {
    calculate_transaction_fee(signed_size(tx, witness_lock_size), fee_rate)
}

/// Re-set the final change output so that inputs cover outputs plus the real fee.
///
/// The last output must be a pure change cell: no type script and empty data.
/// Capacity is a fixed-width field, so a single pass is exact. Returns the fee.
pub fn settle_change(
    tx: &mut CkbTransaction,
    sum_inputs_capacity: u64,
    fee_rate: u64,
    witness_lock_size: usize,
) -> Result<u64> {
    tx.check_alignment()?;
    let last = tx
        .outputs
        .len()
        .checked_sub(1)
        .ok_or_else(|| Error::InvariantViolation("transaction has no change output".into()))?;

    if tx.outputs[last].type_.is_some() || !tx.outputs_data[last].is_empty() {
        return Err(Error::InvariantViolation(
            "last output is not a pure change cell".into(),
        ));
    }

    let fee = estimate_tx_fee(tx, fee_rate, witness_lock_size);
    let committed: u64 = tx.outputs[..last].iter().map(|o| o.capacity).sum();
    let min_change = tx.outputs[last].occupied_capacity(0);

    let available = sum_inputs_capacity
        .checked_sub(committed)
        .and_then(|rest| rest.checked_sub(fee))
        .ok_or(Error::InsufficientFee {
            required: committed.saturating_add(fee).saturating_add(min_change),
            available: sum_inputs_capacity,
        })?;

    if available < min_change {
        return Err(Error::InsufficientFee {
            required: min_change,
            available,
        });
    }

    tx.outputs[last].capacity = available;
    debug!("Settled change to {} shannons with fee {}", available, fee);
    Ok(fee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckb::types::{CellInput, CellOutput, HashType, OutPoint, Script};
    use crate::codec::hash::H256;
    use crate::utils::constants::CKB_UNIT;

    fn lock() -> Script {
        Script::new(H256([1; 32]), HashType::Type, vec![0; 20])
    }

    fn two_output_tx() -> CkbTransaction {
        let mut tx = CkbTransaction::default();
        tx.inputs.push(CellInput::new(OutPoint::new(H256([9; 32]), 0)));
        tx.witnesses.push(Witness::empty_args());
        tx.push_output(CellOutput::new(100 * CKB_UNIT, lock(), None), vec![]);
        tx.push_output(CellOutput::new(0, lock(), None), vec![]);
        tx
    }

    #[test]
    fn test_fee_rounds_up() {
        assert_eq!(calculate_transaction_fee(1000, 1000), 1000);
        assert_eq!(calculate_transaction_fee(1001, 1000), 1001);
        assert_eq!(calculate_transaction_fee(1, 1100), 2);
        assert_eq!(calculate_transaction_fee(0, 1100), 0);
        assert_eq!(estimate_fee(435, 1000, 65), 500);
    }

    #[test]
    fn test_settle_change_conserves_capacity() {
        let mut tx = two_output_tx();
        let inputs = 500 * CKB_UNIT;
        let fee = settle_change(&mut tx, inputs, 1100, 65).unwrap();

        assert!(fee > 0);
        assert_eq!(tx.outputs_capacity() + fee, inputs);
        assert_eq!(fee, estimate_tx_fee(&tx, 1100, 65));
    }

    #[test]
    fn test_fee_covers_signed_size() {
        let mut tx = two_output_tx();
        tx.inputs.push(CellInput::new(OutPoint::new(H256([8; 32]), 0)));
        tx.witnesses.push(Witness::empty_args());
        let inputs = 500 * CKB_UNIT;
        let fee = settle_change(&mut tx, inputs, 1000, 65).unwrap();

        for witness in &mut tx.witnesses {
            *witness = Witness::Args(WitnessArgs::with_lock(vec![1; 65]));
        }
        assert_eq!(fee, calculate_transaction_fee(tx.serialized_size_in_block(), 1000));
        assert_eq!(signed_size(&tx, 65), tx.serialized_size_in_block());
    }

    #[test]
    fn test_change_below_occupied_fails() {
        let mut tx = two_output_tx();
        let err = settle_change(&mut tx, 130 * CKB_UNIT, 1100, 65).unwrap_err();
        assert!(matches!(err, Error::InsufficientFee { required, .. } if required == 61 * CKB_UNIT));
    }

    #[test]
    fn test_negative_change_fails() {
        let mut tx = two_output_tx();
        let err = settle_change(&mut tx, 50 * CKB_UNIT, 1100, 65).unwrap_err();
        assert!(matches!(err, Error::InsufficientFee { .. }));
    }

    #[test]
    fn test_typed_last_output_rejected() {
        let mut tx = two_output_tx();
        tx.outputs_data[1] = vec![0; 16];
        let err = settle_change(&mut tx, 500 * CKB_UNIT, 1100, 65).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }
}
