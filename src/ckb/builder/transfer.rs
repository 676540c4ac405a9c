//! xUDT transfer on CKB.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ckb::builder::{BuiltTransaction, CkbTxBuilder};
use crate::ckb::capacity::udt_cell_capacity;
use crate::ckb::collector::{asset_cells, collect_udt_inputs};
use crate::ckb::types::{CellOutput, CkbTransaction, Script};
use crate::codec::encode_udt_amount;
use crate::codec::xudt_witness::XudtWitnessInput;
use crate::core::scripts::ScriptKind;
use crate::error::{Error, Result};

/// Recipient of an xUDT amount on CKB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdtReceiver {
    /// Receiving lock
    pub lock: Script,
    /// Amount in the smallest unit
    pub amount: u128,
}

/// Parameters of a CKB xUDT transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    /// Sender lock; funds capacity and receives both changes
    pub from_lock: Script,
    /// Asset being moved
    pub xudt_type: Script,
    /// Recipients, in output order
    pub receivers: Vec<UdtReceiver>,
    /// Owner proof or extension data for the xUDT group
    pub type_witness: Option<XudtWitnessInput>,
}

/// Standard xUDT output for `lock` holding `amount`
pub fn udt_output(lock: &Script, xudt_type: &Script, amount: u128) -> (CellOutput, Vec<u8>) {
    let capacity = udt_cell_capacity(lock, Some(xudt_type));
    (
        CellOutput::new(capacity, lock.clone(), Some(xudt_type.clone())),
        encode_udt_amount(amount),
    )
}

/// Sum of receiver amounts, rejecting empty lists and zero amounts
pub(crate) fn total_amount<'a>(amounts: impl IntoIterator<Item = &'a u128>) -> Result<u128> {
    let mut total: u128 = 0;
    let mut count = 0usize;
    for &amount in amounts {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        total = total.checked_add(amount).ok_or_else(|| Error::Overflow {
            operation: "receiver amounts".into(),
        })?;
        count += 1;
    }
    if count == 0 {
        return Err(Error::invalid_param("receivers", "at least one receiver is required"));
    }
    Ok(total)
}

impl CkbTxBuilder<'_> {
    /// Move xUDT from `from_lock` to the receivers.
    ///
    /// Outputs: receivers in order, then an asset change cell if the inputs
    /// hold more than sent, then the capacity change.
    pub async fn transfer(&self, params: TransferParams) -> Result<BuiltTransaction> {
        let total = total_amount(params.receivers.iter().map(|r| &r.amount))?;
        let from = &params.from_lock;

        let cells = asset_cells(self.collector(), from, &params.xudt_type).await?;
        let udt = collect_udt_inputs(&cells, Some(total))?;

        let mut tx = CkbTransaction::default();
        for receiver in &params.receivers {
            let (output, data) = udt_output(&receiver.lock, &params.xudt_type, receiver.amount);
            tx.push_output(output, data);
        }
        let asset_change = udt.sum_amount - total;
        if asset_change > 0 {
            let (output, data) = udt_output(from, &params.xudt_type, asset_change);
            tx.push_output(output, data);
        }

        let capacity = self
            .collect_capacity(from, udt.sum_capacity, tx.outputs_capacity())
            .await?;
        let mut inputs = udt.selected;
        inputs.extend(capacity.selected);
        self.add_deps(&mut tx, ScriptKind::Xudt);

        let built = self.finalize_with(
            tx,
            &inputs,
            from.clone(),
            params.type_witness.as_ref().map(XudtWitnessInput::encode),
        )?;
        debug!(
            "Transfer of {} to {} receivers built with fee {}",
            total,
            params.receivers.len(),
            built.fee
        );
        Ok(built)
    }
}
