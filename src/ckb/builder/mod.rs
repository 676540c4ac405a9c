//! CKB-only transaction builders.
//!
//! Every builder runs the same pipeline:
//! 1. Resolve scripts from the registry
//! 2. Fetch cells through the collector and check preconditions
//! 3. Compute capacities and select inputs
//! 4. Assemble outputs, cell deps and placeholder witnesses
//! 5. Settle the fee on the final pure change output

pub mod burn;
pub mod issue;
pub mod leap;
pub mod merge;
pub mod transfer;

pub use burn::*;
pub use issue::*;
pub use leap::*;
pub use merge::*;
pub use transfer::*;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ckb::collector::{capacity_cells, Collector};
use crate::ckb::fee::settle_change;
use crate::ckb::types::{CellOutput, CkbTransaction, LiveCell, Script, Witness};
use crate::core::config::RgbppConfig;
use crate::core::scripts::{ScriptKind, ScriptRegistry};
use crate::error::{Error, Result};
use crate::selector::Selection;

/// An unsigned transaction with its fee accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltTransaction {
    /// The unsigned transaction
    pub tx: CkbTransaction,
    /// Fee in shannons
    pub fee: u64,
    /// Capacity of all inputs
    pub sum_inputs_capacity: u64,
}

impl BuiltTransaction {
    /// Check `Σ outputs + fee == Σ inputs`
    pub fn check_capacity_conservation(&self) -> Result<()> {
        let spent = self.tx.outputs_capacity() + self.fee;
        if spent != self.sum_inputs_capacity {
            return Err(Error::InvariantViolation(format!(
                "outputs plus fee {} differ from inputs {}",
                spent, self.sum_inputs_capacity
            )));
        }
        Ok(())
    }
}

/// Builds CKB-only transactions against one collector and network
pub struct CkbTxBuilder<'a> {
    collector: &'a dyn Collector,
    config: RgbppConfig,
    scripts: ScriptRegistry,
}

impl<'a> CkbTxBuilder<'a> {
    /// Create a builder
    pub fn new(collector: &'a dyn Collector, config: RgbppConfig) -> Self {
        let scripts = config.scripts();
        Self {
            collector,
            config,
            scripts,
        }
    }

    /// Script registry in use
    pub fn scripts(&self) -> &ScriptRegistry {
        &self.scripts
    }

    /// Configuration in use
    pub fn config(&self) -> &RgbppConfig {
        &self.config
    }

    pub(crate) fn collector(&self) -> &'a dyn Collector {
        self.collector
    }

    /// Capacity cells of `lock` covering `committed` outputs plus a change
    /// cell and the fee budget, on top of the `have` shannons already in.
    pub(crate) async fn collect_capacity(
        &self,
        lock: &Script,
        have: u64,
        committed: u64,
    ) -> Result<Selection<LiveCell>> {
        let min_change = CellOutput::new(0, lock.clone(), None).occupied_capacity(0);
        let need = committed.saturating_add(min_change);
        let fee_budget = self.config.initial_fee_budget;

        if have >= need.saturating_add(fee_budget) {
            return Ok(Selection {
                selected: Vec::new(),
                sum_value: 0,
            });
        }

        let cells = capacity_cells(self.collector, lock).await?;
        let selection = self
            .collector
            .collect_inputs(&cells, need.saturating_sub(have), fee_budget, None)
            .map_err(|e| match e {
                Error::InsufficientCapacity { required, available } => Error::InsufficientCapacity {
                    required: required + have,
                    available: available + have,
                },
                other => other,
            })?;
        debug!(
            "Selected {} capacity cells holding {} shannons",
            selection.selected.len(),
            selection.sum_value
        );
        Ok(selection)
    }

    /// Append change to `change_lock`, attach the secp256k1 dep and witnesses
    /// for `input_cells`, then settle the fee.
    pub(crate) fn finalize(
        &self,
        tx: CkbTransaction,
        input_cells: &[LiveCell],
        change_lock: Script,
    ) -> Result<BuiltTransaction> {
        self.finalize_with(tx, input_cells, change_lock, None)
    }

    /// [`Self::finalize`] with `input_type` placed in the first witness
    pub(crate) fn finalize_with(
        &self,
        mut tx: CkbTransaction,
        input_cells: &[LiveCell],
        change_lock: Script,
        input_type: Option<Vec<u8>>,
    ) -> Result<BuiltTransaction> {
        tx.inputs = input_cells.iter().map(LiveCell::as_input).collect();
        tx.witnesses = placeholder_witnesses(input_cells);
        if let (Some(input_type), Some(Witness::Args(first))) = (input_type, tx.witnesses.first_mut()) {
            first.input_type = Some(input_type);
        }
        for dep in self.scripts.cell_deps(ScriptKind::Secp256k1) {
            tx.add_cell_dep(dep);
        }
        tx.push_output(CellOutput::new(0, change_lock, None), Vec::new());

        let sum_inputs_capacity: u64 = input_cells.iter().map(LiveCell::capacity).sum();
        let fee = settle_change(
            &mut tx,
            sum_inputs_capacity,
            self.config.ckb_fee_rate,
            self.config.witness_lock_placeholder_size,
        )?;

        Ok(BuiltTransaction {
            tx,
            fee,
            sum_inputs_capacity,
        })
    }

    pub(crate) fn add_deps(&self, tx: &mut CkbTransaction, kind: ScriptKind) {
        for dep in self.scripts.cell_deps(kind) {
            tx.add_cell_dep(dep);
        }
    }
}

/// Structured placeholder for the first input of each lock group, empty otherwise
pub fn placeholder_witnesses(input_cells: &[LiveCell]) -> Vec<Witness> {
    let mut seen: Vec<&Script> = Vec::new();
    input_cells
        .iter()
        .map(|cell| {
            if seen.contains(&&cell.output.lock) {
                Witness::empty()
            } else {
                seen.push(&cell.output.lock);
                Witness::empty_args()
            }
        })
        .collect()
}

/// Amount in the smallest unit: `supply * 10^decimal`
pub fn scaled_amount(supply: u128, decimal: u8) -> Result<u128> {
    10u128
        .checked_pow(decimal as u32)
        .and_then(|unit| supply.checked_mul(unit))
        .ok_or_else(|| Error::Overflow {
            operation: format!("{} * 10^{}", supply, decimal),
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::ckb::types::{CellOutput, LiveCell, OutPoint, Script};
    use crate::codec::encode_udt_amount;
    use crate::codec::hash::H256;
    use crate::core::network::{BtcTestnetType, Network};
    use crate::core::scripts::{ScriptKind, ScriptRegistry};
    use crate::utils::constants::CKB_UNIT;

    pub fn registry() -> ScriptRegistry {
        ScriptRegistry::new(Network::Testnet, BtcTestnetType::Testnet3)
    }

    pub fn secp_lock(n: u8) -> Script {
        registry().script(ScriptKind::Secp256k1, vec![n; 20])
    }

    pub fn xudt(owner: &Script) -> Script {
        registry().xudt_type(owner.hash().0.to_vec())
    }

    pub fn capacity_cell(n: u8, owner: &Script, ckb: u64) -> LiveCell {
        LiveCell {
            out_point: OutPoint::new(H256([n; 32]), 0),
            output: CellOutput::new(ckb * CKB_UNIT, owner.clone(), None),
            data: vec![],
        }
    }

    pub fn udt_cell(n: u8, owner: &Script, type_script: &Script, amount: u128) -> LiveCell {
        LiveCell {
            out_point: OutPoint::new(H256([n; 32]), 1),
            output: CellOutput::new(143 * CKB_UNIT, owner.clone(), Some(type_script.clone())),
            data: encode_udt_amount(amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_placeholder_witnesses_per_lock_group() {
        let a = secp_lock(1);
        let b = secp_lock(2);
        let cells = vec![
            capacity_cell(1, &a, 100),
            capacity_cell(2, &b, 100),
            capacity_cell(3, &a, 100),
        ];
        let witnesses = placeholder_witnesses(&cells);
        assert_eq!(
            witnesses,
            vec![Witness::empty_args(), Witness::empty_args(), Witness::empty()]
        );
    }

    #[test]
    fn test_scaled_amount() {
        assert_eq!(scaled_amount(21_000_000, 8).unwrap(), 2_100_000_000_000_000);
        assert!(matches!(scaled_amount(u128::MAX, 1), Err(Error::Overflow { .. })));
    }
}
