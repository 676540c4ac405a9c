//! RGB++ commitment.
//!
//! The BTC transaction commits to the CKB virtual transaction through a
//! double SHA-256 over the committed inputs and outputs:
//!
//! ```text
//! sha256(sha256(
//!     "RGB++" ‖ version[2] ‖ input_len ‖ output_len
//!     ‖ out_point[0..input_len]
//!     ‖ for each committed output: CellOutput ‖ u32_le(data_len) ‖ data
//! ))
//! ```
//!
//! Output locks still carry the placeholder txid when this is computed; the
//! RGB++ lock zeroes the txid again when verifying.

use sha2::{Digest, Sha256};

use crate::ckb::types::CkbTransaction;
use crate::codec::molecule::pack_u32;
use crate::codec::rgbpp::ExtraCommitmentData;
use crate::error::{Error, Result};
use crate::utils::constants::{RGBPP_COMMITMENT_TAG, RGBPP_COMMITMENT_VERSION, RGBPP_MAX_COMMITTED_CELLS};

/// Committed range covering every input and output of `tx`
pub fn commitment_range(tx: &CkbTransaction) -> Result<ExtraCommitmentData> {
    let narrow = |len: usize, what: &str| {
        if len > RGBPP_MAX_COMMITTED_CELLS {
            return Err(Error::invalid_param(
                what,
                format!("{} exceeds the {} cells a commitment covers", len, RGBPP_MAX_COMMITTED_CELLS),
            ));
        }
        Ok(len as u8)
    };
    Ok(ExtraCommitmentData {
        input_len: narrow(tx.inputs.len(), "inputs")?,
        output_len: narrow(tx.outputs.len(), "outputs")?,
    })
}

/// Commitment over the first `extra.input_len` inputs and `extra.output_len`
/// outputs of `tx`
pub fn calculate_commitment(tx: &CkbTransaction, extra: ExtraCommitmentData) -> Result<[u8; 32]> {
    tx.check_alignment()?;
    let (input_len, output_len) = (extra.input_len as usize, extra.output_len as usize);
    if input_len > tx.inputs.len() || output_len > tx.outputs.len() {
        return Err(Error::InvariantViolation(format!(
            "committed range {}/{} exceeds transaction {}/{}",
            input_len,
            output_len,
            tx.inputs.len(),
            tx.outputs.len()
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(RGBPP_COMMITMENT_TAG);
    hasher.update(RGBPP_COMMITMENT_VERSION);
    hasher.update([extra.input_len, extra.output_len]);
    for input in &tx.inputs[..input_len] {
        hasher.update(input.previous_output.to_bytes());
    }
    for (output, data) in tx.outputs[..output_len].iter().zip(&tx.outputs_data) {
        hasher.update(output.to_bytes());
        hasher.update(pack_u32(data.len() as u32));
        hasher.update(data);
    }

    Ok(Sha256::digest(hasher.finalize()).into())
}
