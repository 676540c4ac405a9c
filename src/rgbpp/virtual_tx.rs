//! CKB virtual transactions of RGB++ operations.
//!
//! A virtual transaction spends RGB++ cells and creates outputs bound to BTC
//! outputs that do not exist yet: their lock args carry the placeholder txid
//! and the index of the BTC output they will bind to. The committed range is
//! fee-neutral (inputs and outputs carry equal capacity, topped up by the
//! paymaster when outputs need more), so the commitment never depends on
//! the fee.
//!
//! Once the BTC transaction is broadcast, [`bind_btc_txid`] and
//! [`attach_unlock`] finish the committed part and [`add_paymaster`] appends
//! the fee payer's cells after it.

use bitcoin::{Transaction, Txid};
use tracing::debug;

use crate::btc::psbt::strip_witness;
use crate::btc::source::SpvProof;
use crate::ckb::builder::{placeholder_witnesses, unique_type_args, BuiltTransaction, TOKEN_INFO_OUTPUT_INDEX};
use crate::ckb::capacity::{cell_capacity, rgbpp_udt_cell_capacity, CellKind};
use crate::ckb::fee::settle_change;
use crate::ckb::types::{CellDep, CellOutput, CkbTransaction, DepType, LiveCell, Script, Witness, WitnessArgs};
use crate::codec::encode_udt_amount;
use crate::codec::rgbpp::{BtcTimeLockArgs, ExtraCommitmentData, RgbppLockArgs, RgbppUnlock};
use crate::codec::token_info::TokenInfo;
use crate::core::scripts::{ScriptKind, ScriptRegistry};
use crate::error::{Error, Result};
use crate::rgbpp::commitment::{calculate_commitment, commitment_range};
use crate::utils::constants::{CKB_UNIT, RGBPP_LOCK_ARGS_SIZE, RGBPP_WITNESS_PLACEHOLDER};

// ═══════════════════════════════════════════════════════════════════════════════
// VIRTUAL TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Where a moved asset ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The next BTC output of the RGB++ transaction
    Btc {
        /// Amount (ignored for whole-cell assets)
        amount: u128,
    },
    /// A CKB lock, through a BTC time lock
    Ckb {
        /// Lock released to after the confirmations
        lock: Script,
        /// Amount (ignored for whole-cell assets)
        amount: u128,
    },
}

impl Destination {
    fn amount(&self) -> u128 {
        match self {
            Destination::Btc { amount } | Destination::Ckb { amount, .. } => *amount,
        }
    }
}

/// The committed part of an RGB++ CKB transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualTransaction {
    /// Inputs, outputs, deps and placeholder witnesses of the committed range
    pub tx: CkbTransaction,
    /// Cells behind the inputs
    pub input_cells: Vec<LiveCell>,
    /// Committed range
    pub extra: ExtraCommitmentData,
    /// Commitment carried by the BTC transaction's OP_RETURN
    pub commitment: [u8; 32],
    /// BTC outputs (after the OP_RETURN) the outputs are bound to
    pub btc_outputs: u32,
    /// Asset change bound to the last BTC output, if any
    pub asset_change: Option<u128>,
}

impl VirtualTransaction {
    fn seal(
        tx: CkbTransaction,
        input_cells: Vec<LiveCell>,
        btc_outputs: u32,
        asset_change: Option<u128>,
    ) -> Result<Self> {
        let extra = commitment_range(&tx)?;
        let commitment = calculate_commitment(&tx, extra)?;
        Ok(Self {
            tx,
            input_cells,
            extra,
            commitment,
            btc_outputs,
            asset_change,
        })
    }

    /// Capacity of the committed inputs
    pub fn inputs_capacity(&self) -> u64 {
        self.input_cells.iter().map(LiveCell::capacity).sum()
    }
}

/// Spend `cells` with RGB++ placeholder witnesses
fn spend_rgbpp_cells(tx: &mut CkbTransaction, cells: &[LiveCell]) {
    tx.inputs = cells.iter().map(LiveCell::as_input).collect();
    tx.witnesses = cells
        .iter()
        .map(|_| Witness::Raw(RGBPP_WITNESS_PLACEHOLDER.to_vec()))
        .collect();
}

fn add_deps(tx: &mut CkbTransaction, scripts: &ScriptRegistry, kind: ScriptKind) {
    for dep in scripts.cell_deps(kind) {
        tx.add_cell_dep(dep);
    }
}

/// Lock of an output bound to BTC output `index` or released to `lock`
fn destination_lock(
    scripts: &ScriptRegistry,
    destination: &Destination,
    btc_index: &mut u32,
    confirmations: u32,
) -> Script {
    match destination {
        Destination::Btc { .. } => {
            *btc_index += 1;
            scripts.rgbpp_lock(&RgbppLockArgs::placeholder(*btc_index))
        }
        Destination::Ckb { lock, .. } => {
            scripts.btc_time_lock(&BtcTimeLockArgs::placeholder(lock.clone(), confirmations))
        }
    }
}

/// Move surplus input capacity onto `index` so the range stays fee-neutral
fn balance_capacity(tx: &mut CkbTransaction, inputs_capacity: u64, index: usize) {
    let surplus = inputs_capacity.saturating_sub(tx.outputs_capacity());
    if let Some(output) = tx.outputs.get_mut(index) {
        output.capacity += surplus;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Virtual transaction moving xUDT out of `rgbpp_cells`.
///
/// Destinations are output in order; BTC destinations bind to BTC outputs
/// 1, 2, … and asset change binds to the output after the last of them.
pub fn build_xudt_virtual_tx(
    scripts: &ScriptRegistry,
    rgbpp_cells: &[LiveCell],
    xudt_type: &Script,
    destinations: &[Destination],
    confirmations: u32,
) -> Result<VirtualTransaction> {
    if destinations.is_empty() {
        return Err(Error::invalid_param("destinations", "at least one destination is required"));
    }
    if let Some(cell) = rgbpp_cells.iter().find(|c| !c.has_type(xudt_type)) {
        return Err(Error::invalid_param(
            "rgbpp_cells",
            format!("cell {}:{} holds another asset", cell.out_point.tx_hash, cell.out_point.index),
        ));
    }

    let mut available: u128 = 0;
    for cell in rgbpp_cells {
        available = available.checked_add(cell.udt_amount()?).ok_or_else(|| Error::Overflow {
            operation: "RGB++ input amount".into(),
        })?;
    }
    let mut required: u128 = 0;
    for destination in destinations {
        if destination.amount() == 0 {
            return Err(Error::ZeroAmount);
        }
        required = required.checked_add(destination.amount()).ok_or_else(|| Error::Overflow {
            operation: "destination amounts".into(),
        })?;
    }
    if available < required {
        return Err(Error::InsufficientAssetAmount { required, available });
    }

    let mut tx = CkbTransaction::default();
    spend_rgbpp_cells(&mut tx, rgbpp_cells);

    let min_capacity = rgbpp_udt_cell_capacity(Some(xudt_type));
    let push = |tx: &mut CkbTransaction, lock: Script, amount: u128| {
        let output = CellOutput::new(0, lock, Some(xudt_type.clone()));
        let capacity = min_capacity.max(output.occupied_capacity(16) + CKB_UNIT);
        tx.push_output(CellOutput { capacity, ..output }, encode_udt_amount(amount));
    };

    let mut btc_index = 0u32;
    for destination in destinations {
        let lock = destination_lock(scripts, destination, &mut btc_index, confirmations);
        push(&mut tx, lock, destination.amount());
    }

    let change = available - required;
    let asset_change = if change > 0 {
        btc_index += 1;
        push(&mut tx, scripts.rgbpp_lock(&RgbppLockArgs::placeholder(btc_index)), change);
        Some(change)
    } else {
        None
    };

    let inputs_capacity = rgbpp_cells.iter().map(LiveCell::capacity).sum();
    let last = tx.outputs.len() - 1;
    balance_capacity(&mut tx, inputs_capacity, last);

    add_deps(&mut tx, scripts, ScriptKind::RgbppLock);
    add_deps(&mut tx, scripts, ScriptKind::Xudt);

    debug!(
        "xUDT virtual transaction: {} inputs, {} outputs, {} BTC outputs",
        tx.inputs.len(),
        tx.outputs.len(),
        btc_index
    );
    VirtualTransaction::seal(tx, rgbpp_cells.to_vec(), btc_index, asset_change)
}

/// Virtual transaction moving one spore cell, data untouched
pub fn build_spore_virtual_tx(
    scripts: &ScriptRegistry,
    spore_cell: &LiveCell,
    destination: &Destination,
    confirmations: u32,
) -> Result<VirtualTransaction> {
    let spore_type = spore_cell
        .output
        .type_
        .as_ref()
        .filter(|t| scripts.is_kind(t, ScriptKind::Spore))
        .ok_or_else(|| Error::invalid_param("spore_cell", "cell carries no spore type"))?;

    let mut tx = CkbTransaction::default();
    spend_rgbpp_cells(&mut tx, std::slice::from_ref(spore_cell));

    let mut btc_index = 0u32;
    let lock = destination_lock(scripts, destination, &mut btc_index, confirmations);
    let output = CellOutput::new(0, lock, Some(spore_type.clone()));
    let capacity = spore_cell
        .capacity()
        .max(output.occupied_capacity(spore_cell.data.len()));
    tx.push_output(CellOutput { capacity, ..output }, spore_cell.data.clone());

    add_deps(&mut tx, scripts, ScriptKind::RgbppLock);
    add_deps(&mut tx, scripts, ScriptKind::Spore);

    VirtualTransaction::seal(tx, vec![spore_cell.clone()], btc_index, None)
}

/// Virtual transaction turning a launch cell into the supply and token info
/// cells, both bound to BTC output 1.
///
/// The xUDT args are the launch cell's lock hash, so only the holder of the
/// bound UTXO can ever issue this token.
pub fn build_launch_virtual_tx(
    scripts: &ScriptRegistry,
    launch_cell: &LiveCell,
    token_info: &TokenInfo,
    amount: u128,
) -> Result<VirtualTransaction> {
    if !scripts.is_kind(&launch_cell.output.lock, ScriptKind::RgbppLock) || !launch_cell.is_empty_cell() {
        return Err(Error::invalid_param(
            "launch_cell",
            "must be an empty cell under an RGB++ lock",
        ));
    }
    let info_data = token_info.encode()?;
    let info_capacity = cell_capacity(CellKind::TokenInfo {
        lock_args_size: RGBPP_LOCK_ARGS_SIZE,
        info_len: info_data.len(),
    });

    let xudt_type = scripts.xudt_type(launch_cell.output.lock.hash().0.to_vec());
    let xudt_capacity = launch_cell.capacity().saturating_sub(info_capacity);
    let minimum = rgbpp_udt_cell_capacity(Some(&xudt_type));
    if xudt_capacity < minimum {
        return Err(Error::InsufficientCapacity {
            required: minimum + info_capacity,
            available: launch_cell.capacity(),
        });
    }

    let mut tx = CkbTransaction::default();
    spend_rgbpp_cells(&mut tx, std::slice::from_ref(launch_cell));

    let bound = scripts.rgbpp_lock(&RgbppLockArgs::placeholder(1));
    let unique_type = scripts.script(
        ScriptKind::UniqueType,
        unique_type_args(&launch_cell.as_input(), TOKEN_INFO_OUTPUT_INDEX),
    );
    tx.push_output(
        CellOutput::new(xudt_capacity, bound.clone(), Some(xudt_type)),
        encode_udt_amount(amount),
    );
    tx.push_output(CellOutput::new(info_capacity, bound, Some(unique_type)), info_data);

    add_deps(&mut tx, scripts, ScriptKind::RgbppLock);
    add_deps(&mut tx, scripts, ScriptKind::Xudt);
    add_deps(&mut tx, scripts, ScriptKind::UniqueType);

    VirtualTransaction::seal(tx, vec![launch_cell.clone()], 1, None)
}

// ═══════════════════════════════════════════════════════════════════════════════
// AFTER BROADCAST
// ═══════════════════════════════════════════════════════════════════════════════

/// Replace placeholder txids in RGB++ and BTC time lock args with `btc_txid`.
///
/// Returns how many outputs were rewritten.
pub fn bind_btc_txid(tx: &mut CkbTransaction, scripts: &ScriptRegistry, btc_txid: &Txid) -> Result<usize> {
    let mut rewritten = 0;
    for output in &mut tx.outputs {
        let lock = &mut output.lock;
        if scripts.is_kind(lock, ScriptKind::RgbppLock) {
            let args = RgbppLockArgs::decode(&lock.args)?;
            if args.is_placeholder() {
                lock.args = RgbppLockArgs::new(args.out_index, btc_txid).encode();
                rewritten += 1;
            }
        } else if scripts.is_kind(lock, ScriptKind::BtcTimeLock) {
            let args = BtcTimeLockArgs::decode(&lock.args)?;
            if args.is_placeholder() {
                lock.args = BtcTimeLockArgs {
                    btc_txid: RgbppLockArgs::new(0, btc_txid).btc_txid,
                    ..args
                }
                .encode();
                rewritten += 1;
            }
        }
    }
    Ok(rewritten)
}

/// Fill every RGB++ witness placeholder with the unlock for `btc_tx` and
/// attach the SPV client cell
pub fn attach_unlock(
    tx: &mut CkbTransaction,
    extra: ExtraCommitmentData,
    btc_tx: &Transaction,
    proof: &SpvProof,
) -> Result<()> {
    let unlock = RgbppUnlock::new(extra, strip_witness(btc_tx), proof.proof.clone()).encode();
    let placeholder = Witness::Raw(RGBPP_WITNESS_PLACEHOLDER.to_vec());

    let mut filled = 0;
    for witness in tx.witnesses.iter_mut().filter(|w| **w == placeholder) {
        *witness = Witness::Args(WitnessArgs::with_lock(unlock.clone()));
        filled += 1;
    }
    if filled == 0 {
        return Err(Error::InvariantViolation("no RGB++ witness placeholder to fill".into()));
    }

    tx.add_cell_dep(CellDep::new(proof.spv_client.clone(), DepType::Code));
    Ok(())
}

/// Append the fee payer's capacity cells and change after the committed
/// range, then settle the fee on that change
pub fn add_paymaster(
    vtx: &VirtualTransaction,
    tx: CkbTransaction,
    paymaster_cells: &[LiveCell],
    paymaster_lock: Script,
    scripts: &ScriptRegistry,
    fee_rate: u64,
    witness_lock_placeholder_size: usize,
) -> Result<BuiltTransaction> {
    let mut tx = tx;
    tx.inputs.extend(paymaster_cells.iter().map(LiveCell::as_input));
    tx.witnesses.extend(placeholder_witnesses(paymaster_cells));
    for dep in scripts.cell_deps(ScriptKind::Secp256k1) {
        tx.add_cell_dep(dep);
    }
    tx.push_output(CellOutput::new(0, paymaster_lock, None), Vec::new());

    let sum_inputs_capacity =
        vtx.inputs_capacity() + paymaster_cells.iter().map(LiveCell::capacity).sum::<u64>();
    let fee = settle_change(&mut tx, sum_inputs_capacity, fee_rate, witness_lock_placeholder_size)?;

    Ok(BuiltTransaction {
        tx,
        fee,
        sum_inputs_capacity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckb::builder::test_support::*;
    use crate::ckb::types::OutPoint;
    use crate::codec::hash::H256;
    use bitcoin::hashes::Hash;
    use bitcoin::{absolute::LockTime, transaction::Version};

    fn rgbpp_cell(n: u8, type_script: Option<&Script>, data: Vec<u8>, ckb: u64) -> LiveCell {
        let lock = registry().rgbpp_lock(&RgbppLockArgs::new(n as u32, &Txid::from_byte_array([n; 32])));
        LiveCell {
            out_point: OutPoint::new(H256([n; 32]), 0),
            output: CellOutput::new(ckb * CKB_UNIT, lock, type_script.cloned()),
            data,
        }
    }

    fn token() -> Script {
        xudt(&secp_lock(9))
    }

    #[test]
    fn test_xudt_transfer_binds_in_order() {
        let scripts = registry();
        let cells = vec![
            rgbpp_cell(1, Some(&token()), encode_udt_amount(600), 254),
            rgbpp_cell(2, Some(&token()), encode_udt_amount(400), 254),
        ];
        let vtx = build_xudt_virtual_tx(
            &scripts,
            &cells,
            &token(),
            &[Destination::Btc { amount: 300 }, Destination::Btc { amount: 500 }],
            6,
        )
        .unwrap();

        assert_eq!(vtx.btc_outputs, 3);
        assert_eq!(vtx.asset_change, Some(200));
        assert_eq!(vtx.extra, ExtraCommitmentData { input_len: 2, output_len: 3 });
        for (index, output) in vtx.tx.outputs.iter().enumerate() {
            let args = RgbppLockArgs::decode(&output.lock.args).unwrap();
            assert!(args.is_placeholder());
            assert_eq!(args.out_index, index as u32 + 1);
        }
        assert_eq!(vtx.tx.outputs_data[2], encode_udt_amount(200));
        assert_eq!(vtx.tx.witnesses, vec![Witness::Raw(vec![0xff]); 2]);
        // fee-neutral: surplus rides on the change cell
        assert!(vtx.tx.outputs_capacity() >= vtx.inputs_capacity());
    }

    #[test]
    fn test_xudt_leap_to_ckb_uses_time_lock() {
        let scripts = registry();
        let cells = vec![rgbpp_cell(1, Some(&token()), encode_udt_amount(100), 254)];
        let receiver = secp_lock(5);
        let vtx = build_xudt_virtual_tx(
            &scripts,
            &cells,
            &token(),
            &[Destination::Ckb {
                lock: receiver.clone(),
                amount: 100,
            }],
            6,
        )
        .unwrap();

        assert_eq!(vtx.btc_outputs, 0);
        assert_eq!(vtx.asset_change, None);
        let lock = &vtx.tx.outputs[0].lock;
        assert!(scripts.is_kind(lock, ScriptKind::BtcTimeLock));
        let args = BtcTimeLockArgs::decode(&lock.args).unwrap();
        assert_eq!(args.lock_script, receiver);
        assert_eq!(args.after, 6);
    }

    #[test]
    fn test_xudt_virtual_tx_rejects_foreign_and_short_inputs() {
        let scripts = registry();
        let other = xudt(&secp_lock(8));
        let cells = vec![rgbpp_cell(1, Some(&other), encode_udt_amount(100), 254)];
        assert!(matches!(
            build_xudt_virtual_tx(&scripts, &cells, &token(), &[Destination::Btc { amount: 1 }], 6),
            Err(Error::InvalidParameter { .. })
        ));

        let cells = vec![rgbpp_cell(1, Some(&token()), encode_udt_amount(100), 254)];
        assert_eq!(
            build_xudt_virtual_tx(&scripts, &cells, &token(), &[Destination::Btc { amount: 101 }], 6)
                .unwrap_err(),
            Error::InsufficientAssetAmount { required: 101, available: 100 }
        );
    }

    #[test]
    fn test_spore_keeps_data() {
        let scripts = registry();
        let spore_type = scripts.script(ScriptKind::Spore, vec![3; 32]);
        let cell = rgbpp_cell(1, Some(&spore_type), b"spore content".to_vec(), 300);
        let vtx = build_spore_virtual_tx(&scripts, &cell, &Destination::Btc { amount: 0 }, 6).unwrap();

        assert_eq!(vtx.tx.outputs_data[0], cell.data);
        assert_eq!(vtx.tx.outputs[0].type_, Some(spore_type));
        assert_eq!(vtx.tx.outputs[0].capacity, cell.capacity());
        assert_eq!(vtx.btc_outputs, 1);
    }

    #[test]
    fn test_launch_splits_capacity() {
        let scripts = registry();
        let info = TokenInfo::new(8, "RGBPP Test Token", "RTT");
        let cell = rgbpp_cell(1, None, vec![], 407);
        let vtx = build_launch_virtual_tx(&scripts, &cell, &info, 2_100_000_000_000_000).unwrap();

        assert_eq!(vtx.tx.outputs.len(), 2);
        assert_eq!(vtx.tx.outputs_capacity(), cell.capacity());
        assert_eq!(
            vtx.tx.outputs[0].type_.as_ref().map(|t| t.args.clone()),
            Some(cell.output.lock.hash().0.to_vec())
        );
        assert_eq!(TokenInfo::decode(&vtx.tx.outputs_data[1]).unwrap(), info);

        let small = rgbpp_cell(2, None, vec![], 300);
        assert!(matches!(
            build_launch_virtual_tx(&scripts, &small, &info, 1),
            Err(Error::InsufficientCapacity { .. })
        ));
    }

    #[test]
    fn test_bind_txid_and_unlock() {
        let scripts = registry();
        let cells = vec![rgbpp_cell(1, Some(&token()), encode_udt_amount(100), 254)];
        let vtx = build_xudt_virtual_tx(
            &scripts,
            &cells,
            &token(),
            &[
                Destination::Btc { amount: 60 },
                Destination::Ckb {
                    lock: secp_lock(5),
                    amount: 40,
                },
            ],
            6,
        )
        .unwrap();

        let txid = Txid::from_byte_array([0xab; 32]);
        let mut tx = vtx.tx.clone();
        assert_eq!(bind_btc_txid(&mut tx, &scripts, &txid).unwrap(), 2);
        assert_eq!(RgbppLockArgs::decode(&tx.outputs[0].lock.args).unwrap().txid(), txid);
        assert!(!BtcTimeLockArgs::decode(&tx.outputs[1].lock.args).unwrap().is_placeholder());
        assert_eq!(bind_btc_txid(&mut tx, &scripts, &txid).unwrap(), 0);

        let btc_tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: vec![],
        };
        let proof = SpvProof {
            spv_client: OutPoint::new(H256([7; 32]), 0),
            proof: vec![1, 2, 3],
        };
        attach_unlock(&mut tx, vtx.extra, &btc_tx, &proof).unwrap();
        match &tx.witnesses[0] {
            Witness::Args(args) => {
                let unlock = RgbppUnlock::decode(args.lock.as_deref().unwrap_or_default()).unwrap();
                assert_eq!(unlock.extra_data, vtx.extra);
                assert_eq!(unlock.btc_tx_proof, vec![1, 2, 3]);
            }
            other => panic!("unexpected witness {:?}", other),
        }
        assert!(tx.cell_deps.contains(&CellDep::new(proof.spv_client.clone(), DepType::Code)));
        assert!(matches!(
            attach_unlock(&mut tx, vtx.extra, &btc_tx, &proof),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_paymaster_pays_fee_outside_range() {
        let scripts = registry();
        let cells = vec![rgbpp_cell(1, Some(&token()), encode_udt_amount(100), 254)];
        let vtx = build_xudt_virtual_tx(&scripts, &cells, &token(), &[Destination::Btc { amount: 100 }], 6)
            .unwrap();
        let payer = secp_lock(4);
        let funding = vec![capacity_cell(9, &payer, 500)];

        let built = add_paymaster(&vtx, vtx.tx.clone(), &funding, payer.clone(), &scripts, 1_100, 65).unwrap();
        assert_eq!(built.tx.inputs.len(), 2);
        assert_eq!(built.tx.outputs.len(), 2);
        assert_eq!(built.tx.outputs[1].lock, payer);
        built.check_capacity_conservation().unwrap();
        assert_eq!(
            calculate_commitment(&built.tx, vtx.extra).unwrap(),
            vtx.commitment
        );
    }

    #[test]
    fn test_paymaster_fee_covers_signature() {
        let scripts = registry();
        let cells = vec![rgbpp_cell(1, Some(&token()), encode_udt_amount(100), 254)];
        let vtx = build_xudt_virtual_tx(&scripts, &cells, &token(), &[Destination::Btc { amount: 100 }], 6)
            .unwrap();
        let payer = secp_lock(4);
        let funding = vec![capacity_cell(9, &payer, 300), capacity_cell(10, &payer, 300)];

        let mut built = add_paymaster(&vtx, vtx.tx.clone(), &funding, payer, &scripts, 1_000, 65).unwrap();
        for witness in &mut built.tx.witnesses {
            if let Witness::Args(args) = witness {
                args.lock = Some(vec![1; 65]);
            }
        }
        let needed = crate::ckb::fee::calculate_transaction_fee(built.tx.serialized_size_in_block(), 1_000);
        assert_eq!(built.fee, needed);
    }
}
