//! Consolidate every xUDT cell of one owner into a single cell.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ckb::builder::{udt_output, BuiltTransaction, CkbTxBuilder};
use crate::ckb::collector::{asset_cells, collect_udt_inputs};
use crate::ckb::types::{CkbTransaction, Script};
use crate::core::scripts::ScriptKind;
use crate::error::Result;

/// Parameters of an xUDT merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeParams {
    /// Owner of the cells
    pub owner_lock: Script,
    /// Asset to consolidate
    pub xudt_type: Script,
}

impl CkbTxBuilder<'_> {
    /// Spend all of the owner's cells of the asset into one
    pub async fn merge(&self, params: MergeParams) -> Result<BuiltTransaction> {
        let owner = &params.owner_lock;
        let cells = asset_cells(self.collector(), owner, &params.xudt_type).await?;
        let udt = collect_udt_inputs(&cells, None)?;

        let mut tx = CkbTransaction::default();
        let (output, data) = udt_output(owner, &params.xudt_type, udt.sum_amount);
        tx.push_output(output, data);

        let capacity = self
            .collect_capacity(owner, udt.sum_capacity, tx.outputs_capacity())
            .await?;
        let mut inputs = udt.selected;
        inputs.extend(capacity.selected);
        self.add_deps(&mut tx, ScriptKind::Xudt);

        let built = self.finalize(tx, &inputs, owner.clone())?;
        debug!(
            "Merge of {} cells holding {} built with fee {}",
            cells.len(),
            udt.sum_amount,
            built.fee
        );
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckb::builder::test_support::*;
    use crate::ckb::collector::MemoryCollector;
    use crate::codec::encode_udt_amount;
    use crate::core::config::RgbppConfig;
    use crate::error::Error;

    #[tokio::test]
    async fn test_merge_three_cells() {
        let owner = secp_lock(1);
        let token = xudt(&secp_lock(9));
        let collector = MemoryCollector::with_cells(vec![
            udt_cell(1, &owner, &token, 100),
            udt_cell(2, &owner, &token, 200),
            udt_cell(3, &owner, &token, 300),
        ]);
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());

        let built = builder
            .merge(MergeParams {
                owner_lock: owner.clone(),
                xudt_type: token.clone(),
            })
            .await
            .unwrap();

        assert_eq!(built.tx.inputs.len(), 3);
        assert_eq!(built.tx.outputs.len(), 2);
        assert_eq!(built.tx.outputs_data[0], encode_udt_amount(600));
        assert_eq!(built.tx.outputs[0].lock, owner);
        built.check_capacity_conservation().unwrap();
    }

    #[tokio::test]
    async fn test_merge_without_cells() {
        let collector = MemoryCollector::new();
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());
        let err = builder
            .merge(MergeParams {
                owner_lock: secp_lock(1),
                xudt_type: xudt(&secp_lock(9)),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoMatchingAssetCell { .. }));
    }
}
