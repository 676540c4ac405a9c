//! xUDT issuance on CKB.
//!
//! Outputs: `[xUDT cell, token info cell, change]`. The xUDT args are the
//! issuer's lock hash, which puts the issuer in owner mode. The token info
//! cell is guarded by a unique type derived from the first input.

use ckb_hash::blake2b_256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ckb::builder::{scaled_amount, BuiltTransaction, CkbTxBuilder};
use crate::ckb::capacity::{token_info_cell_capacity, udt_cell_capacity};
use crate::ckb::types::{CellInput, CellOutput, CkbTransaction, Script};
use crate::codec::encode_udt_amount;
use crate::codec::token_info::TokenInfo;
use crate::core::scripts::ScriptKind;
use crate::error::{Error, Result};
use crate::utils::constants::UNIQUE_TYPE_ARGS_SIZE;

/// Output index of the token info cell in an issue transaction
pub const TOKEN_INFO_OUTPUT_INDEX: u64 = 1;

/// Parameters of an xUDT issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueParams {
    /// Lock of the issuer; receives the supply and the token info cell
    pub issuer_lock: Script,
    /// Token metadata
    pub token_info: TokenInfo,
    /// Supply in whole tokens, scaled by `10^decimal`
    pub total_supply: u128,
}

/// Unique type args: `blake2b(first_input ‖ u64_le(output_index))[..20]`
pub fn unique_type_args(first_input: &CellInput, output_index: u64) -> Vec<u8> {
    let mut preimage = first_input.to_bytes();
    preimage.extend_from_slice(&output_index.to_le_bytes());
    blake2b_256(preimage)[..UNIQUE_TYPE_ARGS_SIZE].to_vec()
}

impl CkbTxBuilder<'_> {
    /// Issue `total_supply` tokens to the issuer
    pub async fn issue(&self, params: IssueParams) -> Result<BuiltTransaction> {
        if params.total_supply == 0 {
            return Err(Error::ZeroAmount);
        }
        let amount = scaled_amount(params.total_supply, params.token_info.decimal)?;
        let info_data = params.token_info.encode()?;

        let lock = &params.issuer_lock;
        let xudt_type = self.scripts().xudt_type(lock.hash().0.to_vec());
        let xudt_capacity = udt_cell_capacity(lock, Some(&xudt_type));
        let info_capacity = token_info_cell_capacity(lock, &params.token_info);

        let selection = self
            .collect_capacity(lock, 0, xudt_capacity + info_capacity)
            .await?;
        let first_input = selection
            .selected
            .first()
            .map(|cell| cell.as_input())
            .ok_or_else(|| Error::NoLiveCell("issuer has no capacity cells".into()))?;

        let unique_type = self.scripts().script(
            ScriptKind::UniqueType,
            unique_type_args(&first_input, TOKEN_INFO_OUTPUT_INDEX),
        );

        let mut tx = CkbTransaction::default();
        tx.push_output(
            CellOutput::new(xudt_capacity, lock.clone(), Some(xudt_type)),
            encode_udt_amount(amount),
        );
        tx.push_output(
            CellOutput::new(info_capacity, lock.clone(), Some(unique_type)),
            info_data,
        );
        self.add_deps(&mut tx, ScriptKind::Xudt);
        self.add_deps(&mut tx, ScriptKind::UniqueType);

        let built = self.finalize(tx, &selection.selected, lock.clone())?;
        debug!(
            "Issue of {} {} built with fee {}",
            amount, params.token_info.symbol, built.fee
        );
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckb::builder::test_support::*;
    use crate::ckb::collector::MemoryCollector;
    use crate::codec::hash::H256;
    use crate::core::config::RgbppConfig;
    use crate::ckb::types::OutPoint;
    use crate::utils::constants::CKB_UNIT;

    fn params(issuer: &Script) -> IssueParams {
        IssueParams {
            issuer_lock: issuer.clone(),
            token_info: TokenInfo::new(8, "XUDT Test Token", "XTT"),
            total_supply: 21_000_000,
        }
    }

    #[tokio::test]
    async fn test_issue_layout() {
        let issuer = secp_lock(1);
        let collector = MemoryCollector::with_cells(vec![capacity_cell(1, &issuer, 5_000)]);
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());

        let built = builder.issue(params(&issuer)).await.unwrap();
        let tx = &built.tx;

        assert_eq!(tx.outputs.len(), 3);
        assert_eq!(tx.outputs_data[0], 2_100_000_000_000_000u128.to_le_bytes().to_vec());
        assert_eq!(tx.outputs[0].type_, Some(xudt(&issuer)));
        assert_eq!(
            tx.outputs[1].type_.as_ref().map(|t| t.args.clone()),
            Some(unique_type_args(&tx.inputs[0], 1))
        );
        assert_eq!(
            TokenInfo::decode(&tx.outputs_data[1]).unwrap(),
            params(&issuer).token_info
        );
        assert!(tx.outputs_data[2].is_empty());
        assert_eq!(tx.cell_deps.len(), 3);
        built.check_capacity_conservation().unwrap();
    }

    #[tokio::test]
    async fn test_issue_needs_capacity() {
        let issuer = secp_lock(1);
        let collector = MemoryCollector::with_cells(vec![capacity_cell(1, &issuer, 5)]);
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());

        let err = builder.issue(params(&issuer)).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientCapacity { available, .. } if available == 5 * CKB_UNIT));

        let empty = MemoryCollector::new();
        let builder = CkbTxBuilder::new(&empty, RgbppConfig::default());
        assert!(matches!(builder.issue(params(&issuer)).await, Err(Error::NoLiveCell(_))));
    }

    #[tokio::test]
    async fn test_zero_supply_rejected() {
        let issuer = secp_lock(1);
        let collector = MemoryCollector::new();
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());
        let zero = IssueParams {
            total_supply: 0,
            ..params(&issuer)
        };
        assert_eq!(builder.issue(zero).await.unwrap_err(), Error::ZeroAmount);
    }

    #[test]
    fn test_unique_type_args_depend_on_input() {
        let a = CellInput::new(OutPoint::new(H256([1; 32]), 0));
        let b = CellInput::new(OutPoint::new(H256([1; 32]), 1));
        assert_eq!(unique_type_args(&a, 1).len(), 20);
        assert_ne!(unique_type_args(&a, 1), unique_type_args(&b, 1));
        assert_ne!(unique_type_args(&a, 1), unique_type_args(&a, 0));
    }
}
