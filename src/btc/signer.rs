//! PSBT signing through an external wallet.

use async_trait::async_trait;
use bitcoin::psbt::Psbt;
use serde::{Deserialize, Serialize};

use crate::btc::psbt::{psbt_from_hex, psbt_to_hex};
use crate::error::{Error, Result};

/// How the wallet identifies the key for an input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInput {
    /// Key behind a BTC address
    ByAddress(String),
    /// Key with this hex public key
    ByPublicKey(String),
}

/// Request to sign one PSBT input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputToSign {
    /// Input index
    pub index: usize,
    /// Key to sign with
    pub signer: SignInput,
}

/// Wallet capability that signs PSBTs
#[async_trait]
pub trait PsbtSigner: Send + Sync {
    /// Sign the requested inputs, returning the signed PSBT hex
    async fn sign_psbt(&self, psbt_hex: &str, inputs: &[InputToSign]) -> Result<String>;
}

/// Hand `psbt` to the wallet and check the result still spends the same thing
pub async fn sign_psbt(
    psbt: &Psbt,
    inputs: &[InputToSign],
    signer: &dyn PsbtSigner,
) -> Result<Psbt> {
    let signed_hex = signer
        .sign_psbt(&psbt_to_hex(psbt), inputs)
        .await
        .map_err(|e| match e {
            Error::PsbtSigningFailure(_) => e,
            other => Error::PsbtSigningFailure(other.to_string()),
        })?;

    let signed = psbt_from_hex(&signed_hex)
        .map_err(|e| Error::PsbtSigningFailure(format!("wallet returned an invalid PSBT: {}", e)))?;

    if signed.unsigned_tx != psbt.unsigned_tx {
        return Err(Error::SignerMutatedTransaction("unsigned_tx".into()));
    }

    Ok(signed)
}
