//! CKB signing and submission.

use async_trait::async_trait;
use tracing::info;

use crate::ckb::types::CkbTransaction;
use crate::codec::hash::H256;
use crate::core::network::Chain;
use crate::error::{Error, Result};

/// Wallet capability that fills CKB witnesses
#[async_trait]
pub trait CkbSigner: Send + Sync {
    /// Sign `tx`, returning it with witnesses filled
    async fn sign_transaction(&self, tx: CkbTransaction) -> Result<CkbTransaction>;
}

/// Node capability that accepts CKB transactions
#[async_trait]
pub trait CkbClient: Send + Sync {
    /// Send a signed transaction, returning its hash
    async fn send_transaction(&self, tx: &CkbTransaction) -> Result<H256>;
}

/// Sign `tx`, rejecting any signer output that changed more than witnesses
pub async fn sign(tx: &CkbTransaction, signer: &dyn CkbSigner) -> Result<CkbTransaction> {
    let signed = signer.sign_transaction(tx.clone()).await?;

    let mutated = if signed.version != tx.version {
        Some("version")
    } else if signed.cell_deps != tx.cell_deps {
        Some("cell_deps")
    } else if signed.header_deps != tx.header_deps {
        Some("header_deps")
    } else if signed.inputs != tx.inputs {
        Some("inputs")
    } else if signed.outputs != tx.outputs {
        Some("outputs")
    } else if signed.outputs_data != tx.outputs_data {
        Some("outputs_data")
    } else {
        None
    };

    if let Some(field) = mutated {
        return Err(Error::SignerMutatedTransaction(field.into()));
    }
    Ok(signed)
}

/// Submit a signed transaction; no retries
pub async fn submit(tx: &CkbTransaction, client: &dyn CkbClient) -> Result<H256> {
    let hash = client.send_transaction(tx).await.map_err(|e| match e {
        Error::NetworkSubmission { .. } => e,
        other => Error::NetworkSubmission {
            chain: Chain::Ckb,
            reason: other.to_string(),
        },
    })?;
    info!("CKB transaction {} submitted", hash);
    Ok(hash)
}

/// Sign then submit
pub async fn sign_and_submit(
    tx: &CkbTransaction,
    signer: &dyn CkbSigner,
    client: &dyn CkbClient,
) -> Result<H256> {
    let signed = sign(tx, signer).await?;
    submit(&signed, client).await
}
