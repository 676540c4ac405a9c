//! Transaction skeleton for signing.
//!
//! Wallets that sign by lock group need each input's cell. The skeleton pairs
//! a transaction with its resolved input cells and sizes leader witnesses as
//! if the signatures were already in.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::ckb::collector::Collector;
use crate::ckb::types::{CkbTransaction, LiveCell, Script, Witness, WitnessArgs};
use crate::error::{Error, Result};

/// Inputs sharing a lock script, signed together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockGroup {
    /// Shared lock
    pub lock: Script,
    /// Input indices, ascending; the first one holds the group witness
    pub input_indices: Vec<usize>,
}

/// A transaction with its input cells resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSkeleton {
    /// The transaction, witnesses rewritten to signature placeholders
    pub tx: CkbTransaction,
    /// Cell behind each input, in input order
    pub input_cells: Vec<LiveCell>,
}

impl TransactionSkeleton {
    /// Lock groups in order of first appearance
    pub fn lock_groups(&self) -> Vec<LockGroup> {
        let mut groups: Vec<LockGroup> = Vec::new();
        for (index, cell) in self.input_cells.iter().enumerate() {
            match groups.iter_mut().find(|g| g.lock == cell.output.lock) {
                Some(group) => group.input_indices.push(index),
                None => groups.push(LockGroup {
                    lock: cell.output.lock.clone(),
                    input_indices: vec![index],
                }),
            }
        }
        groups
    }

    /// Total input capacity
    pub fn inputs_capacity(&self) -> u64 {
        self.input_cells.iter().map(LiveCell::capacity).sum()
    }

    /// Fee implied by the current outputs
    pub fn fee(&self) -> Result<u64> {
        self.inputs_capacity()
            .checked_sub(self.tx.outputs_capacity())
            .ok_or_else(|| Error::InsufficientCapacity {
                required: self.tx.outputs_capacity(),
                available: self.inputs_capacity(),
            })
    }
}

/// Resolve every input of `tx` and size empty structured witnesses for signing.
///
/// Lookups run concurrently; a spent or unknown input fails with
/// [`Error::MissingPreviousOutputCell`]. Orderings are preserved.
pub async fn to_skeleton(
    tx: &CkbTransaction,
    collector: &dyn Collector,
    witness_lock_placeholder_size: usize,
) -> Result<TransactionSkeleton> {
    let lookups = tx.inputs.iter().map(|input| async move {
        let out_point = &input.previous_output;
        collector
            .get_live_cell(out_point)
            .await?
            .ok_or_else(|| Error::MissingPreviousOutputCell {
                tx_hash: out_point.tx_hash.to_hex(),
                index: out_point.index,
            })
    });
    let input_cells = try_join_all(lookups).await?;

    let mut tx = tx.clone();
    for witness in &mut tx.witnesses {
        // filled locks (RGB++ unlocks) stay as they are
        if let Witness::Args(args @ WitnessArgs { lock: None, .. }) = witness {
            args.lock = Some(vec![0u8; witness_lock_placeholder_size]);
        }
    }

    Ok(TransactionSkeleton { tx, input_cells })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckb::collector::MemoryCollector;
    use crate::ckb::types::{CellInput, CellOutput, HashType, OutPoint};
    use crate::codec::hash::H256;

    fn lock(n: u8) -> Script {
        Script::new(H256([1; 32]), HashType::Type, vec![n; 20])
    }

    fn cell(n: u8, owner: u8) -> LiveCell {
        LiveCell {
            out_point: OutPoint::new(H256([n; 32]), 0),
            output: CellOutput::new(100, lock(owner), None),
            data: vec![],
        }
    }

    fn spending(cells: &[LiveCell]) -> CkbTransaction {
        let mut tx = CkbTransaction::default();
        for cell in cells {
            tx.inputs.push(CellInput::new(cell.out_point.clone()));
        }
        tx.witnesses = vec![Witness::empty_args(), Witness::empty_args(), Witness::empty()];
        tx.witnesses.truncate(cells.len());
        tx.push_output(CellOutput::new(150, lock(9), None), vec![]);
        tx
    }

    #[tokio::test]
    async fn test_resolves_inputs_and_sizes_witnesses() {
        let cells = vec![cell(1, 1), cell(2, 2), cell(3, 1)];
        let collector = MemoryCollector::with_cells(cells.clone());
        let tx = spending(&cells);

        let skeleton = to_skeleton(&tx, &collector, 65).await.unwrap();
        assert_eq!(skeleton.input_cells, cells);
        assert_eq!(skeleton.tx.inputs, tx.inputs);
        assert_eq!(skeleton.tx.witnesses[0].to_bytes().len(), 85);
        assert_eq!(skeleton.tx.witnesses[2], Witness::empty());
        assert_eq!(skeleton.fee().unwrap(), 150);

        let groups = skeleton.lock_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].input_indices, vec![0, 2]);
        assert_eq!(groups[1].input_indices, vec![1]);
    }

    #[tokio::test]
    async fn test_missing_input_reported() {
        let cells = vec![cell(1, 1), cell(2, 1)];
        let collector = MemoryCollector::with_cells(vec![cells[0].clone()]);

        let err = to_skeleton(&spending(&cells), &collector, 65).await.unwrap_err();
        assert_eq!(
            err,
            Error::MissingPreviousOutputCell {
                tx_hash: H256([2; 32]).to_hex(),
                index: 0
            }
        );
    }
}
