//! Cross-chain leap orchestration.
//!
//! Drives an RGB++ operation through both chains in a fixed order: select the
//! bound UTXOs, build the CKB virtual transaction, commit it in a PSBT, have
//! the wallet sign it, broadcast, and only then finish the CKB transaction
//! against the real BTC txid.
//!
//! Everything before the broadcast fails fast with `Err`. Once the BTC
//! transaction is out, a failing CKB leg is reported inside [`TxResult`]
//! so the caller still learns the BTC txid.

use std::fmt;

use bitcoin::{Amount, Transaction, TxOut, Txid};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::btc::psbt::{build_rgbpp_psbt, extract_transaction, FeeRate};
use crate::btc::scripts::{parse_address, OpReturnBuilder};
use crate::btc::signer::{sign_psbt, InputToSign, PsbtSigner};
use crate::btc::source::{broadcast_transaction, BtcDataSource};
use crate::btc::utxo::Utxo;
use crate::ckb::builder::{
    scaled_amount, BtcBoundReceiver, CkbTxBuilder, LeapToBtcParams, TransferParams, UdtReceiver,
};
use crate::ckb::collector::{capacity_cells, CellQuery, Collector};
use crate::ckb::signer::{sign, submit, CkbClient, CkbSigner};
use crate::ckb::types::{CellOutput, LiveCell, Script};
use crate::codec::hash::H256;
use crate::codec::rgbpp::RgbppLockArgs;
use crate::core::config::RgbppConfig;
use crate::core::network::Chain;
use crate::core::scripts::ScriptRegistry;
use crate::error::{Error, Result};
use crate::rgbpp::intent::{AssetIdentity, BtcParty, FeeParams, LaunchIntent, Receiver, TransferIntent};
use crate::rgbpp::virtual_tx::{
    add_paymaster, attach_unlock, bind_btc_txid, build_launch_virtual_tx, build_spore_virtual_tx,
    build_xudt_virtual_tx, Destination, VirtualTransaction,
};
use crate::selector::CandidateFilter;
use crate::utils::hex::to_hex;

// ═══════════════════════════════════════════════════════════════════════════════
// STATE & RESULT
// ═══════════════════════════════════════════════════════════════════════════════

/// Progress of a cross-chain operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeapState {
    /// Nothing done yet
    Init,
    /// Source UTXOs and their cells resolved
    UtxoSelected,
    /// Unsigned PSBT built
    PsbtBuilt,
    /// Wallet signed the PSBT
    PsbtSigned,
    /// CKB transaction complete, unsigned
    CkbTxBuilt,
    /// CKB transaction signed
    CkbTxSigned,
    /// Accepted by the network
    Submitted,
    /// BTC transaction mined
    Confirmed,
    /// CKB leg failed after the BTC broadcast
    Failed,
}

impl fmt::Display for LeapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeapState::Init => "init",
            LeapState::UtxoSelected => "utxo_selected",
            LeapState::PsbtBuilt => "psbt_built",
            LeapState::PsbtSigned => "psbt_signed",
            LeapState::CkbTxBuilt => "ckb_tx_built",
            LeapState::CkbTxSigned => "ckb_tx_signed",
            LeapState::Submitted => "submitted",
            LeapState::Confirmed => "confirmed",
            LeapState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a cross-chain call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    /// Broadcast BTC transaction, if the operation had a BTC leg
    pub btc_tx_id: Option<Txid>,
    /// Submitted CKB transaction
    pub ckb_tx_hash: Option<H256>,
    /// Why the CKB leg failed after the BTC broadcast
    pub error: Option<Error>,
    /// State the operation stopped in
    pub state: LeapState,
}

impl TxResult {
    /// Whether both legs went through
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.ckb_tx_hash.is_some()
    }
}

/// Logs every state transition of one operation
struct Progress {
    operation: &'static str,
    state: LeapState,
}

impl Progress {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            state: LeapState::Init,
        }
    }

    fn advance(&mut self, next: LeapState) {
        info!("{}: {} -> {}", self.operation, self.state, next);
        self.state = next;
    }
}

/// UTXOs carrying the moved asset, with the cells bound to them
#[derive(Debug)]
struct SourceSelection {
    utxos: Vec<Utxo>,
    cells: Vec<LiveCell>,
}

fn required<'i, T>(value: &'i Option<T>, name: &str, reason: &str) -> Result<&'i T> {
    value.as_ref().ok_or_else(|| Error::invalid_param(name, reason))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs transfer and launch intents against the supplied capabilities
pub struct LeapOrchestrator<'a> {
    collector: &'a dyn Collector,
    btc_source: &'a dyn BtcDataSource,
    psbt_signer: &'a dyn PsbtSigner,
    ckb_signer: &'a dyn CkbSigner,
    ckb_client: &'a dyn CkbClient,
    utxo_filter: Option<&'a dyn CandidateFilter<Utxo>>,
    config: RgbppConfig,
    scripts: ScriptRegistry,
}

impl<'a> LeapOrchestrator<'a> {
    /// Create an orchestrator for `config`'s network
    pub fn new(
        collector: &'a dyn Collector,
        btc_source: &'a dyn BtcDataSource,
        psbt_signer: &'a dyn PsbtSigner,
        ckb_signer: &'a dyn CkbSigner,
        ckb_client: &'a dyn CkbClient,
        config: RgbppConfig,
    ) -> Self {
        let scripts = config.scripts();
        Self {
            collector,
            btc_source,
            psbt_signer,
            ckb_signer,
            ckb_client,
            utxo_filter: None,
            config,
            scripts,
        }
    }

    /// Skip BTC fee UTXOs rejected by `filter`
    pub fn with_utxo_filter(mut self, filter: &'a dyn CandidateFilter<Utxo>) -> Self {
        self.utxo_filter = Some(filter);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &RgbppConfig {
        &self.config
    }

    fn effective_config(&self, fee: &FeeParams) -> Result<RgbppConfig> {
        let mut config = self.config.clone();
        if let Some(rate) = fee.ckb_fee_rate {
            config.ckb_fee_rate = rate;
        }
        if let Some(rate) = fee.btc_fee_rate {
            config.btc_fee_rate = rate;
        }
        config
            .validate()
            .map_err(|e| Error::invalid_param("fee", e.to_string()))?;
        Ok(config)
    }

    /// Execute a transfer or leap.
    ///
    /// CKB sources produce a single CKB transaction. BTC sources run the full
    /// RGB++ flow and return `Ok` with `error` set when only the CKB leg failed.
    pub async fn execute(&self, intent: &TransferIntent) -> Result<TxResult> {
        intent.validate()?;
        let config = self.effective_config(&intent.fee)?;

        match intent.source_chain {
            Chain::Ckb => self.execute_on_ckb(intent, config).await,
            Chain::Bitcoin => self.execute_rgbpp(intent, &config).await,
        }
    }

    /// Issue an xUDT from the launch cell bound to `intent.owned_utxo`
    pub async fn launch(&self, intent: &LaunchIntent) -> Result<TxResult> {
        intent.validate()?;
        let config = self.effective_config(&intent.fee)?;
        let mut progress = Progress::new("launch");

        let launch_lock = self.scripts.rgbpp_lock(&intent.owned_utxo);
        let launch_cell = self
            .collector
            .get_cells(&CellQuery::capacity(launch_lock))
            .await?
            .into_iter()
            .find(LiveCell::is_empty_cell)
            .ok_or_else(|| {
                Error::NoLiveCell(format!(
                    "no launch cell bound to {}:{}",
                    intent.owned_utxo.txid(),
                    intent.owned_utxo.out_index
                ))
            })?;

        let amount = scaled_amount(intent.total_supply, intent.token_info.decimal)?;
        let vtx = build_launch_virtual_tx(&self.scripts, &launch_cell, &intent.token_info, amount)?;

        let utxos = self.btc_source.get_utxos(&intent.btc_party.address).await?;
        let owned = utxos
            .iter()
            .find(|u| u.rgbpp_lock_args() == intent.owned_utxo)
            .cloned()
            .ok_or_else(|| {
                Error::invalid_param("owned_utxo", "not an unspent output of the BTC party")
            })?;
        let bound = self.bound_cells(&utxos).await?;
        let fee_candidates = free_utxos(&utxos, &bound);
        progress.advance(LeapState::UtxoSelected);

        self.complete_rgbpp(
            vtx,
            vec![owned],
            fee_candidates,
            &[],
            &intent.btc_party,
            &intent.ckb_party.lock,
            &config,
            progress,
        )
        .await
    }

    /// Where the BTC transaction stands
    pub async fn confirmation_state(&self, btc_txid: &Txid) -> Result<LeapState> {
        let info = self
            .btc_source
            .get_transaction(btc_txid)
            .await?
            .ok_or_else(|| Error::DataSource(format!("unknown transaction {}", btc_txid)))?;
        Ok(if info.confirmed {
            LeapState::Confirmed
        } else {
            LeapState::Submitted
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CKB SOURCE
    // ═══════════════════════════════════════════════════════════════════════════

    async fn execute_on_ckb(&self, intent: &TransferIntent, config: RgbppConfig) -> Result<TxResult> {
        let mut progress = Progress::new("ckb transfer");
        let owner = required(&intent.ckb_party, "ckb_party", "required as the asset owner")?;
        let xudt_type = match &intent.asset {
            AssetIdentity::Xudt { .. } => intent.asset.type_script(&self.scripts)?,
            _ => {
                return Err(Error::invalid_param(
                    "asset",
                    "only xUDT moves from a CKB source",
                ))
            }
        };
        let builder = CkbTxBuilder::new(self.collector, config);

        let built = match intent.destination_chain {
            Chain::Ckb => {
                let receivers = intent
                    .receivers
                    .iter()
                    .filter_map(|r| match r {
                        Receiver::Ckb { lock, amount } => Some(UdtReceiver {
                            lock: lock.clone(),
                            amount: *amount,
                        }),
                        _ => None,
                    })
                    .collect();
                builder
                    .transfer(TransferParams {
                        from_lock: owner.lock.clone(),
                        xudt_type,
                        receivers,
                        type_witness: None,
                    })
                    .await?
            }
            Chain::Bitcoin => {
                let receivers = intent
                    .receivers
                    .iter()
                    .filter_map(|r| match r {
                        Receiver::BtcOutPoint { txid, vout, amount } => Some(BtcBoundReceiver {
                            lock_args: RgbppLockArgs::new(*vout, txid),
                            amount: *amount,
                        }),
                        _ => None,
                    })
                    .collect();
                builder
                    .leap_to_btc(LeapToBtcParams {
                        from_lock: owner.lock.clone(),
                        xudt_type,
                        receivers,
                    })
                    .await?
            }
        };
        progress.advance(LeapState::CkbTxBuilt);

        let signed = sign(&built.tx, self.ckb_signer).await?;
        progress.advance(LeapState::CkbTxSigned);
        let hash = submit(&signed, self.ckb_client).await?;
        progress.advance(LeapState::Submitted);

        Ok(TxResult {
            btc_tx_id: None,
            ckb_tx_hash: Some(hash),
            error: None,
            state: progress.state,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BTC SOURCE
    // ═══════════════════════════════════════════════════════════════════════════

    async fn execute_rgbpp(&self, intent: &TransferIntent, config: &RgbppConfig) -> Result<TxResult> {
        let mut progress = Progress::new("rgbpp transfer");
        let btc = required(&intent.btc_party, "btc_party", "required when the source is BTC")?;
        let payer = required(&intent.ckb_party, "ckb_party", "required to pay the CKB fee")?;
        let asset_type = intent.asset.type_script(&self.scripts)?;

        let utxos = self.btc_source.get_utxos(&btc.address).await?;
        let bound = self.bound_cells(&utxos).await?;
        let required_amount = if intent.asset.is_whole_cell() {
            None
        } else {
            let total = intent
                .receivers
                .iter()
                .try_fold(0u128, |sum, r| sum.checked_add(r.amount()))
                .ok_or_else(|| Error::Overflow {
                    operation: "receiver amounts".into(),
                })?;
            Some(total)
        };
        let source = select_source(&utxos, &bound, &asset_type, required_amount)?;
        let fee_candidates = free_utxos(&utxos, &bound);
        progress.advance(LeapState::UtxoSelected);

        let destinations: Vec<Destination> = intent
            .receivers
            .iter()
            .map(|r| match r {
                Receiver::Ckb { lock, amount } => Destination::Ckb {
                    lock: lock.clone(),
                    amount: *amount,
                },
                other => Destination::Btc {
                    amount: other.amount(),
                },
            })
            .collect();
        let vtx = match &intent.asset {
            AssetIdentity::Xudt { .. } => build_xudt_virtual_tx(
                &self.scripts,
                &source.cells,
                &asset_type,
                &destinations,
                config.btc_time_lock_confirmations,
            )?,
            _ => build_spore_virtual_tx(
                &self.scripts,
                &source.cells[0],
                &destinations[0],
                config.btc_time_lock_confirmations,
            )?,
        };

        let receiver_addresses: Vec<&str> = intent
            .receivers
            .iter()
            .filter_map(|r| match r {
                Receiver::BtcAddress { address, .. } => Some(address.as_str()),
                _ => None,
            })
            .collect();

        self.complete_rgbpp(
            vtx,
            source.utxos,
            fee_candidates,
            &receiver_addresses,
            btc,
            &payer.lock,
            config,
            progress,
        )
        .await
    }

    /// Cells bound to each UTXO, looked up concurrently
    async fn bound_cells(&self, utxos: &[Utxo]) -> Result<Vec<Vec<LiveCell>>> {
        let lookups = utxos.iter().map(|utxo| {
            let query = CellQuery::by_lock(self.scripts.rgbpp_lock(&utxo.rgbpp_lock_args()));
            async move { self.collector.get_cells(&query).await }
        });
        try_join_all(lookups).await
    }

    /// Paymaster cells covering the virtual transaction's capacity deficit,
    /// a change cell and the fee budget
    async fn select_paymaster(
        &self,
        vtx: &VirtualTransaction,
        payer: &Script,
        config: &RgbppConfig,
    ) -> Result<Vec<LiveCell>> {
        let deficit = vtx.tx.outputs_capacity().saturating_sub(vtx.inputs_capacity());
        let min_change = CellOutput::new(0, payer.clone(), None).occupied_capacity(0);
        let cells = capacity_cells(self.collector, payer).await?;
        let selection = self.collector.collect_inputs(
            &cells,
            deficit.saturating_add(min_change),
            config.initial_fee_budget,
            None,
        )?;
        debug!(
            "Paymaster funds {} shannons from {} cells",
            selection.sum_value,
            selection.selected.len()
        );
        Ok(selection.selected)
    }

    /// BTC leg then CKB leg of an RGB++ operation
    #[allow(clippy::too_many_arguments)]
    async fn complete_rgbpp(
        &self,
        vtx: VirtualTransaction,
        rgbpp_utxos: Vec<Utxo>,
        fee_candidates: Vec<Utxo>,
        receiver_addresses: &[&str],
        btc: &BtcParty,
        payer: &Script,
        config: &RgbppConfig,
        mut progress: Progress,
    ) -> Result<TxResult> {
        let paymaster_cells = self.select_paymaster(&vtx, payer, config).await?;

        let network = config.btc_network();
        let sender_script = parse_address(&btc.address, network)?.script_pubkey();
        let bound_output = |script_pubkey| TxOut {
            value: Amount::from_sat(config.rgbpp_utxo_value),
            script_pubkey,
        };

        let mut outputs = vec![OpReturnBuilder::commitment_output(&vtx.commitment)?];
        for address in receiver_addresses {
            outputs.push(bound_output(parse_address(address, network)?.script_pubkey()));
        }
        // asset change and launched supply stay with the sender
        while outputs.len() - 1 < vtx.btc_outputs as usize {
            outputs.push(bound_output(sender_script.clone()));
        }
        if outputs.len() - 1 != vtx.btc_outputs as usize {
            return Err(Error::InvariantViolation(format!(
                "{} BTC outputs for {} bound CKB outputs",
                outputs.len() - 1,
                vtx.btc_outputs
            )));
        }

        let built = build_rgbpp_psbt(
            &rgbpp_utxos,
            outputs,
            &fee_candidates,
            sender_script,
            FeeRate::from_sat_per_vb(config.btc_fee_rate),
            self.utxo_filter,
        )?;
        debug!(
            "PSBT spends {} RGB++ and {} fee UTXOs, fee {} sats",
            rgbpp_utxos.len(),
            built.fee_inputs.len(),
            built.fee
        );
        progress.advance(LeapState::PsbtBuilt);

        let inputs: Vec<InputToSign> = (0..built.psbt.inputs.len())
            .map(|index| InputToSign {
                index,
                signer: btc.sign_input(),
            })
            .collect();
        let signed = sign_psbt(&built.psbt, &inputs, self.psbt_signer).await?;
        progress.advance(LeapState::PsbtSigned);

        let btc_tx = extract_transaction(signed)?;
        let btc_txid = broadcast_transaction(self.btc_source, &btc_tx).await?;

        match self
            .finish_ckb_leg(&vtx, &btc_tx, &btc_txid, &paymaster_cells, payer, config, &mut progress)
            .await
        {
            Ok(hash) => Ok(TxResult {
                btc_tx_id: Some(btc_txid),
                ckb_tx_hash: Some(hash),
                error: None,
                state: progress.state,
            }),
            Err(e) => {
                warn!("CKB leg of BTC transaction {} failed: {}", btc_txid, e);
                progress.advance(LeapState::Failed);
                Ok(TxResult {
                    btc_tx_id: Some(btc_txid),
                    ckb_tx_hash: None,
                    error: Some(e),
                    state: progress.state,
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_ckb_leg(
        &self,
        vtx: &VirtualTransaction,
        btc_tx: &Transaction,
        btc_txid: &Txid,
        paymaster_cells: &[LiveCell],
        payer: &Script,
        config: &RgbppConfig,
        progress: &mut Progress,
    ) -> Result<H256> {
        let mut tx = vtx.tx.clone();
        bind_btc_txid(&mut tx, &self.scripts, btc_txid)?;

        let proof = self
            .btc_source
            .get_rgbpp_spv_proof(btc_txid, config.spv_proof_confirmations)
            .await?;
        attach_unlock(&mut tx, vtx.extra, btc_tx, &proof)?;

        let built = add_paymaster(
            vtx,
            tx,
            paymaster_cells,
            payer.clone(),
            &self.scripts,
            config.ckb_fee_rate,
            config.witness_lock_placeholder_size,
        )?;
        progress.advance(LeapState::CkbTxBuilt);

        let signed = sign(&built.tx, self.ckb_signer).await?;
        progress.advance(LeapState::CkbTxSigned);
        let hash = submit(&signed, self.ckb_client).await?;
        progress.advance(LeapState::Submitted);
        Ok(hash)
    }
}

/// UTXOs no RGB++ cell is bound to
fn free_utxos(utxos: &[Utxo], bound: &[Vec<LiveCell>]) -> Vec<Utxo> {
    utxos
        .iter()
        .zip(bound)
        .filter(|(_, cells)| cells.is_empty())
        .map(|(utxo, _)| utxo.clone())
        .collect()
}

/// Take UTXOs carrying `asset_type`, in order, until `required` is covered
/// (or the first one for a whole-cell asset). Every cell bound to a taken
/// UTXO must be of the asset, since spending the UTXO releases all of them.
fn select_source(
    utxos: &[Utxo],
    bound: &[Vec<LiveCell>],
    asset_type: &Script,
    required: Option<u128>,
) -> Result<SourceSelection> {
    let mut selection = SourceSelection {
        utxos: Vec::new(),
        cells: Vec::new(),
    };
    let mut available: u128 = 0;

    for (utxo, cells) in utxos.iter().zip(bound) {
        if !cells.iter().any(|c| c.has_type(asset_type)) {
            continue;
        }
        if cells.iter().any(|c| !c.has_type(asset_type)) {
            return Err(Error::invalid_param(
                "btc_party",
                format!("UTXO {}:{} also carries other assets", utxo.txid, utxo.vout),
            ));
        }

        selection.utxos.push(utxo.clone());
        selection.cells.extend(cells.iter().cloned());

        match required {
            None => return Ok(selection),
            Some(required) => {
                for cell in cells {
                    available = available.saturating_add(cell.udt_amount()?);
                }
                if available >= required {
                    return Ok(selection);
                }
            }
        }
    }

    match required {
        Some(required) if available > 0 => Err(Error::InsufficientAssetAmount { required, available }),
        _ => Err(Error::NoMatchingAssetCell {
            asset: to_hex(&asset_type.args),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckb::builder::test_support::*;
    use crate::ckb::types::OutPoint;
    use crate::codec::encode_udt_amount;
    use crate::utils::constants::CKB_UNIT;
    use bitcoin::hashes::Hash;
    use bitcoin::ScriptBuf;

    fn utxo(n: u8) -> Utxo {
        Utxo::new(Txid::from_byte_array([n; 32]), 0, 10_000, ScriptBuf::new())
    }

    fn bound_cell(utxo: &Utxo, type_script: &Script, amount: u128) -> LiveCell {
        LiveCell {
            out_point: OutPoint::new(H256([utxo.txid.to_byte_array()[0]; 32]), 0),
            output: CellOutput::new(
                254 * CKB_UNIT,
                registry().rgbpp_lock(&utxo.rgbpp_lock_args()),
                Some(type_script.clone()),
            ),
            data: encode_udt_amount(amount),
        }
    }

    #[test]
    fn test_select_source_takes_prefix() {
        let token = xudt(&secp_lock(9));
        let utxos = vec![utxo(1), utxo(2), utxo(3), utxo(4)];
        let bound = vec![
            vec![bound_cell(&utxos[0], &token, 100)],
            vec![],
            vec![bound_cell(&utxos[2], &token, 300)],
            vec![bound_cell(&utxos[3], &token, 500)],
        ];

        let selection = select_source(&utxos, &bound, &token, Some(350)).unwrap();
        assert_eq!(selection.utxos, vec![utxos[0].clone(), utxos[2].clone()]);
        assert_eq!(selection.cells.len(), 2);
        assert_eq!(free_utxos(&utxos, &bound), vec![utxos[1].clone()]);

        assert_eq!(
            select_source(&utxos, &bound, &token, Some(1_000)).unwrap_err(),
            Error::InsufficientAssetAmount { required: 1_000, available: 900 }
        );
    }

    #[test]
    fn test_select_source_rejects_mixed_utxo() {
        let token = xudt(&secp_lock(9));
        let other = xudt(&secp_lock(8));
        let utxos = vec![utxo(1)];
        let bound = vec![vec![
            bound_cell(&utxos[0], &token, 100),
            bound_cell(&utxos[0], &other, 100),
        ]];
        assert!(matches!(
            select_source(&utxos, &bound, &token, Some(10)),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            select_source(&utxos, &[vec![]], &token, None),
            Err(Error::NoMatchingAssetCell { .. })
        ));
    }

    #[test]
    fn test_leap_state_names() {
        assert_eq!(LeapState::PsbtSigned.to_string(), "psbt_signed");
        assert_eq!(
            serde_json::to_string(&LeapState::CkbTxBuilt).unwrap(),
            "\"ckb_tx_built\""
        );
    }
}
