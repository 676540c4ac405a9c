//! xUDT witness input, carried in `WitnessArgs.input_type` of an xUDT group.
//!
//! ```text
//! table XudtWitnessInput {
//!     owner_script:       ScriptOpt,
//!     owner_signature:    BytesOpt,
//!     raw_extension_data: ScriptVecOpt,
//!     extension_data:     BytesVec,
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::ckb::types::Script;
use crate::codec::molecule::*;
use crate::error::Result;
use crate::utils::hex;

/// Owner proof and extension data for xUDT scripts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XudtWitnessInput {
    /// Script proving ownership when owner mode is by script
    pub owner_script: Option<Script>,
    /// Signature for the owner script
    #[serde(default, with = "hex::opt_bytes")]
    pub owner_signature: Option<Vec<u8>>,
    /// Extension scripts, in the order of the xUDT args
    pub raw_extension_data: Option<Vec<Script>>,
    /// Per-extension witness data
    #[serde(with = "hex::bytes_vec")]
    pub extension_data: Vec<Vec<u8>>,
}

impl XudtWitnessInput {
    /// Molecule encoding
    pub fn encode(&self) -> Vec<u8> {
        let owner_script = pack_option(self.owner_script.as_ref().map(Script::to_bytes));
        let owner_signature = pack_option(self.owner_signature.as_deref().map(pack_bytes));
        let raw_extension_data = pack_option(self.raw_extension_data.as_ref().map(|scripts| {
            let items: Vec<_> = scripts.iter().map(Script::to_bytes).collect();
            pack_dynvec(&items)
        }));
        let extension_data: Vec<_> = self.extension_data.iter().map(|d| pack_bytes(d)).collect();

        pack_table(&[
            owner_script,
            owner_signature,
            raw_extension_data,
            pack_dynvec(&extension_data),
        ])
    }

    /// Decode the molecule encoding
    pub fn decode(data: &[u8]) -> Result<Self> {
        let fields = unpack_table(data, 4, "XudtWitnessInput")?;

        let owner_script = unpack_option(fields[0], Script::from_slice)?;
        let owner_signature =
            unpack_option(fields[1], |f| unpack_bytes(f, "XudtWitnessInput.owner_signature"))?;
        let raw_extension_data = unpack_option(fields[2], |f| {
            unpack_dynvec(f, "XudtWitnessInput.raw_extension_data")?
                .into_iter()
                .map(Script::from_slice)
                .collect::<Result<Vec<_>>>()
        })?;
        let extension_data = unpack_dynvec(fields[3], "XudtWitnessInput.extension_data")?
            .into_iter()
            .map(|item| unpack_bytes(item, "XudtWitnessInput.extension_data"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            owner_script,
            owner_signature,
            raw_extension_data,
            extension_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckb::types::HashType;
    use crate::codec::hash::H256;

    #[test]
    fn test_all_absent_encodes_as_zero_length_options() {
        let empty = XudtWitnessInput::default();
        let encoded = empty.encode();
        // 20 header bytes + empty BytesVec (4)
        assert_eq!(encoded.len(), 24);
        assert_eq!(XudtWitnessInput::decode(&encoded).unwrap(), empty);
    }

    #[test]
    fn test_fields_independently_optional() {
        let script = Script::new(H256([3; 32]), HashType::Type, vec![1, 2, 3]);
        let only_signature = XudtWitnessInput {
            owner_signature: Some(vec![9; 65]),
            ..Default::default()
        };
        let only_extensions = XudtWitnessInput {
            raw_extension_data: Some(vec![script.clone(), script]),
            extension_data: vec![vec![], vec![0xaa]],
            ..Default::default()
        };

        for value in [only_signature, only_extensions] {
            assert_eq!(XudtWitnessInput::decode(&value.encode()).unwrap(), value);
        }
    }

    #[test]
    fn test_empty_signature_differs_from_absent() {
        let absent = XudtWitnessInput::default();
        let empty = XudtWitnessInput {
            owner_signature: Some(vec![]),
            ..Default::default()
        };
        assert_ne!(absent.encode(), empty.encode());
        assert_eq!(XudtWitnessInput::decode(&empty.encode()).unwrap(), empty);
    }
}
