//! CKB transactions that hand cells over to Bitcoin.
//!
//! A leap-out locks xUDT under an RGB++ lock bound to an outpoint the
//! receiver already owns. Prepare-launch does the same with bare capacity,
//! reserving the cell a later RGB++ launch consumes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ckb::builder::transfer::{total_amount, udt_output};
use crate::ckb::builder::{BuiltTransaction, CkbTxBuilder};
use crate::ckb::capacity::{cell_capacity, rgbpp_udt_cell_capacity, CellKind};
use crate::ckb::collector::{asset_cells, collect_udt_inputs};
use crate::ckb::types::{CellOutput, CkbTransaction, Script};
use crate::codec::encode_udt_amount;
use crate::codec::rgbpp::RgbppLockArgs;
use crate::codec::token_info::TokenInfo;
use crate::core::scripts::ScriptKind;
use crate::error::{Error, Result};
use crate::utils::constants::RGBPP_LOCK_ARGS_SIZE;

/// Bitcoin outpoint receiving xUDT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcBoundReceiver {
    /// Outpoint the output is bound to; must reference a real BTC transaction
    pub lock_args: RgbppLockArgs,
    /// Amount in the smallest unit
    pub amount: u128,
}

/// Parameters of a CKB→BTC leap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeapToBtcParams {
    /// Sender lock; funds capacity and receives both changes
    pub from_lock: Script,
    /// Asset being moved
    pub xudt_type: Script,
    /// Receivers, in output order
    pub receivers: Vec<BtcBoundReceiver>,
}

/// Parameters of a prepare-launch transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareLaunchParams {
    /// Lock funding the launch cell
    pub from_lock: Script,
    /// Outpoint the launch cell is bound to
    pub owned_utxo: RgbppLockArgs,
    /// Metadata of the token to be launched, used for sizing
    pub token_info: TokenInfo,
    /// Launch cell capacity; defaults to [`launch_cell_capacity`]
    pub launch_capacity: Option<u64>,
}

/// Capacity a launch cell needs to fund both the RGB++ xUDT cell and the
/// token info cell it turns into
pub fn launch_cell_capacity(info: &TokenInfo) -> u64 {
    rgbpp_udt_cell_capacity(None)
        + cell_capacity(CellKind::TokenInfo {
            lock_args_size: RGBPP_LOCK_ARGS_SIZE,
            info_len: info.encoded_len(),
        })
}

impl CkbTxBuilder<'_> {
    /// Move xUDT from CKB onto Bitcoin outpoints
    pub async fn leap_to_btc(&self, params: LeapToBtcParams) -> Result<BuiltTransaction> {
        let total = total_amount(params.receivers.iter().map(|r| &r.amount))?;
        if let Some(index) = params.receivers.iter().position(|r| r.lock_args.is_placeholder()) {
            return Err(Error::invalid_param(
                format!("receivers[{}]", index),
                "lock args must reference a broadcast BTC transaction",
            ));
        }
        let from = &params.from_lock;

        let cells = asset_cells(self.collector(), from, &params.xudt_type).await?;
        let udt = collect_udt_inputs(&cells, Some(total))?;

        let mut tx = CkbTransaction::default();
        let capacity = rgbpp_udt_cell_capacity(Some(&params.xudt_type));
        for receiver in &params.receivers {
            let lock = self.scripts().rgbpp_lock(&receiver.lock_args);
            tx.push_output(
                CellOutput::new(capacity, lock, Some(params.xudt_type.clone())),
                encode_udt_amount(receiver.amount),
            );
        }
        let asset_change = udt.sum_amount - total;
        if asset_change > 0 {
            let (output, data) = udt_output(from, &params.xudt_type, asset_change);
            tx.push_output(output, data);
        }

        let funding = self
            .collect_capacity(from, udt.sum_capacity, tx.outputs_capacity())
            .await?;
        let mut inputs = udt.selected;
        inputs.extend(funding.selected);
        self.add_deps(&mut tx, ScriptKind::Xudt);

        let built = self.finalize(tx, &inputs, from.clone())?;
        debug!(
            "Leap of {} to {} BTC outpoints built with fee {}",
            total,
            params.receivers.len(),
            built.fee
        );
        Ok(built)
    }

    /// Create the RGB++-locked capacity cell a launch consumes
    pub async fn prepare_launch(&self, params: PrepareLaunchParams) -> Result<BuiltTransaction> {
        if params.owned_utxo.is_placeholder() {
            return Err(Error::invalid_param(
                "owned_utxo",
                "must reference a broadcast BTC transaction",
            ));
        }
        let minimum = launch_cell_capacity(&params.token_info);
        let capacity = params.launch_capacity.unwrap_or(minimum);
        if capacity < minimum {
            return Err(Error::InsufficientCapacity {
                required: minimum,
                available: capacity,
            });
        }
        let from = &params.from_lock;

        let mut tx = CkbTransaction::default();
        tx.push_output(
            CellOutput::new(capacity, self.scripts().rgbpp_lock(&params.owned_utxo), None),
            Vec::new(),
        );
        let funding = self.collect_capacity(from, 0, capacity).await?;

        let built = self.finalize(tx, &funding.selected, from.clone())?;
        debug!("Launch cell of {} shannons built with fee {}", capacity, built.fee);
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckb::builder::test_support::*;
    use crate::ckb::collector::MemoryCollector;
    use crate::core::config::RgbppConfig;
    use crate::utils::constants::CKB_UNIT;
    use bitcoin::hashes::Hash;
    use bitcoin::Txid;

    fn bound(n: u8) -> RgbppLockArgs {
        RgbppLockArgs::new(1, &Txid::from_byte_array([n; 32]))
    }

    #[tokio::test]
    async fn test_leap_outputs_bound_to_outpoints() {
        let from = secp_lock(1);
        let token = xudt(&secp_lock(9));
        let collector = MemoryCollector::with_cells(vec![
            udt_cell(1, &from, &token, 1_000),
            capacity_cell(2, &from, 1_000),
        ]);
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());

        let built = builder
            .leap_to_btc(LeapToBtcParams {
                from_lock: from.clone(),
                xudt_type: token.clone(),
                receivers: vec![BtcBoundReceiver {
                    lock_args: bound(7),
                    amount: 400,
                }],
            })
            .await
            .unwrap();
        let tx = &built.tx;

        assert_eq!(tx.outputs.len(), 3);
        assert!(registry().is_kind(&tx.outputs[0].lock, ScriptKind::RgbppLock));
        assert_eq!(RgbppLockArgs::decode(&tx.outputs[0].lock.args).unwrap(), bound(7));
        assert_eq!(tx.outputs[0].capacity, 254 * CKB_UNIT);
        assert_eq!(tx.outputs_data[1], encode_udt_amount(600));
        built.check_capacity_conservation().unwrap();
    }

    #[tokio::test]
    async fn test_leap_rejects_placeholder_outpoint() {
        let from = secp_lock(1);
        let token = xudt(&secp_lock(9));
        let collector = MemoryCollector::new();
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());

        let err = builder
            .leap_to_btc(LeapToBtcParams {
                from_lock: from,
                xudt_type: token,
                receivers: vec![BtcBoundReceiver {
                    lock_args: RgbppLockArgs::placeholder(1),
                    amount: 1,
                }],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_prepare_launch() {
        let from = secp_lock(1);
        let collector = MemoryCollector::with_cells(vec![capacity_cell(1, &from, 2_000)]);
        let builder = CkbTxBuilder::new(&collector, RgbppConfig::default());
        let info = TokenInfo::new(8, "RGBPP Test Token", "RTT");

        let built = builder
            .prepare_launch(PrepareLaunchParams {
                from_lock: from.clone(),
                owned_utxo: bound(3),
                token_info: info.clone(),
                launch_capacity: None,
            })
            .await
            .unwrap();

        assert_eq!(built.tx.outputs.len(), 2);
        assert_eq!(built.tx.outputs[0].capacity, launch_cell_capacity(&info));
        assert!(built.tx.outputs[0].type_.is_none());
        built.check_capacity_conservation().unwrap();

        let err = builder
            .prepare_launch(PrepareLaunchParams {
                from_lock: from,
                owned_utxo: bound(3),
                token_info: info,
                launch_capacity: Some(100 * CKB_UNIT),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientCapacity { .. }));
    }

    #[test]
    fn test_launch_cell_capacity() {
        let info = TokenInfo::new(8, "RGBPP Test Token", "RTT");
        // 254 for the xUDT cell, 33 + 36 + 53 + 8 + 22 + 1 for the info cell
        assert_eq!(launch_cell_capacity(&info), (254 + 153) * CKB_UNIT);
    }
}
