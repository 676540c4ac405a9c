//! Bitcoin script helpers.
//!
//! The RGB++ commitment rides in a bare `OP_RETURN <32 bytes>` output.

use bitcoin::address::NetworkUnchecked;
use bitcoin::script::{Builder as ScriptBuilder, PushBytesBuf};
use bitcoin::{opcodes, Address, Amount, ScriptBuf, TxOut};

use crate::error::{Error, Result};

/// OP_RETURN builder for RGB++ commitments
pub struct OpReturnBuilder;

impl OpReturnBuilder {
    /// Maximum OP_RETURN data size
    pub const MAX_DATA_SIZE: usize = 80;

    /// `OP_RETURN <data>`
    pub fn data(data: &[u8]) -> Result<ScriptBuf> {
        if data.len() > Self::MAX_DATA_SIZE {
            return Err(Error::invalid_param(
                "op_return",
                format!("{} bytes exceeds {}", data.len(), Self::MAX_DATA_SIZE),
            ));
        }
        let push_bytes = PushBytesBuf::try_from(data.to_vec())
            .map_err(|e| Error::invalid_param("op_return", e.to_string()))?;

        Ok(ScriptBuilder::new()
            .push_opcode(opcodes::all::OP_RETURN)
            .push_slice(push_bytes)
            .into_script())
    }

    /// Zero-value output carrying an RGB++ commitment
    pub fn commitment_output(commitment: &[u8; 32]) -> Result<TxOut> {
        Ok(TxOut {
            value: Amount::ZERO,
            script_pubkey: Self::data(commitment)?,
        })
    }

    /// Extract a 32-byte commitment from an OP_RETURN script
    pub fn parse_commitment(script: &ScriptBuf) -> Option<[u8; 32]> {
        let bytes = script.as_bytes();

        // OP_RETURN, OP_PUSHBYTES_32, 32 bytes
        if bytes.len() != 34 || bytes[0] != opcodes::all::OP_RETURN.to_u8() || bytes[1] != 32 {
            return None;
        }

        let mut commitment = [0u8; 32];
        commitment.copy_from_slice(&bytes[2..]);
        Some(commitment)
    }
}

/// Parse an address and check it belongs to `network`
pub fn parse_address(address: &str, network: bitcoin::Network) -> Result<Address> {
    address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| Error::invalid_param("address", format!("{}: {}", address, e)))?
        .require_network(network)
        .map_err(|e| Error::invalid_param("address", format!("{}: {}", address, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_roundtrip() {
        let commitment = [42u8; 32];
        let output = OpReturnBuilder::commitment_output(&commitment).unwrap();

        assert_eq!(output.value, Amount::ZERO);
        assert!(output.script_pubkey.is_op_return());
        assert_eq!(OpReturnBuilder::parse_commitment(&output.script_pubkey), Some(commitment));
    }

    #[test]
    fn test_oversized_data_rejected() {
        assert!(OpReturnBuilder::data(&[0u8; 81]).is_err());
        let short = OpReturnBuilder::data(&[1u8; 4]).unwrap();
        assert_eq!(OpReturnBuilder::parse_commitment(&short), None);
    }

    #[test]
    fn test_address_network_checked() {
        let testnet = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
        assert!(parse_address(testnet, bitcoin::Network::Testnet).is_ok());
        assert!(parse_address(testnet, bitcoin::Network::Bitcoin).is_err());
        assert!(parse_address("not-an-address", bitcoin::Network::Testnet).is_err());
    }
}
