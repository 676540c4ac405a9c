//! Destroy part of an xUDT balance.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ckb::builder::{udt_output, BuiltTransaction, CkbTxBuilder};
use crate::ckb::collector::{asset_cells, collect_udt_inputs};
use crate::ckb::types::{CkbTransaction, Script};
use crate::core::scripts::ScriptKind;
use crate::error::{Error, Result};

/// Parameters of an xUDT burn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnParams {
    /// Owner of the cells being burned from
    pub owner_lock: Script,
    /// Asset to burn
    pub xudt_type: Script,
    /// Amount to destroy
    pub amount: u128,
}

impl CkbTxBuilder<'_> {
    /// Burn `amount`; any remainder goes back to the owner and freed capacity
    /// ends up in the change cell
    pub async fn burn(&self, params: BurnParams) -> Result<BuiltTransaction> {
        if params.amount == 0 {
            return Err(Error::ZeroAmount);
        }
        let owner = &params.owner_lock;
        let cells = asset_cells(self.collector(), owner, &params.xudt_type).await?;
        let udt = collect_udt_inputs(&cells, Some(params.amount))?;

        let mut tx = CkbTransaction::default();
        let residual = udt.sum_amount - params.amount;
        if residual > 0 {
            let (output, data) = udt_output(owner, &params.xudt_type, residual);
            tx.push_output(output, data);
        }

        let capacity = self
            .collect_capacity(owner, udt.sum_capacity, tx.outputs_capacity())
            .await?;
        let mut inputs = udt.selected;
        inputs.extend(capacity.selected);
        self.add_deps(&mut tx, ScriptKind::Xudt);

        let built = self.finalize(tx, &inputs, owner.clone())?;
        debug!("Burn of {} built with fee {}", params.amount, built.fee);
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

    fn burn(owner: &Script, token: &Script, amount: u128) -> BurnParams {
        BurnParams {
            owner_lock: owner.clone(),
            xudt_type: token.clone(),
            amount,
        }
    }

    #[tokio::test]
    async fn test_partial_burn_keeps_residual() {
        let owner = secp_lock(1);
        let token = xudt(&secp_lock(9));
        let collector = MemoryCollector::with_cells(vec![
            udt_cell(1, &owner, &token, 1_000),
            capacity_cell(2, &owner, 500),
        ]);
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());

        let built = builder.burn(burn(&owner, &token, 400)).await.unwrap();
        assert_eq!(built.tx.outputs.len(), 2);
        assert_eq!(built.tx.outputs_data[0], encode_udt_amount(600));
        built.check_capacity_conservation().unwrap();
    }

    #[tokio::test]
    async fn test_full_burn_leaves_only_change() {
        let owner = secp_lock(1);
        let token = xudt(&secp_lock(9));
        let collector = MemoryCollector::with_cells(vec![udt_cell(1, &owner, &token, 1_000)]);
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());

        let built = builder.burn(burn(&owner, &token, 1_000)).await.unwrap();
        assert_eq!(built.tx.outputs.len(), 1);
        assert!(built.tx.outputs[0].type_.is_none());
        assert_eq!(built.tx.inputs.len(), 1);
        built.check_capacity_conservation().unwrap();
    }

    #[tokio::test]
    async fn test_burn_validation() {
        let owner = secp_lock(1);
        let token = xudt(&secp_lock(9));
        let collector = MemoryCollector::with_cells(vec![udt_cell(1, &owner, &token, 10)]);
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());

        assert_eq!(builder.burn(burn(&owner, &token, 0)).await.unwrap_err(), Error::ZeroAmount);
        assert_eq!(
            builder.burn(burn(&owner, &token, 11)).await.unwrap_err(),
            Error::InsufficientAssetAmount { required: 11, available: 10 }
        );
    }
}
