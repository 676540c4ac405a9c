//! CKB transaction data model.
//!
//! The structures mirror the CKB JSON-RPC shape for serde and carry their own
//! molecule encoding, which is what hashes and fee sizes are computed over.

use ckb_hash::blake2b_256;
use serde::{Deserialize, Serialize};

use crate::codec::hash::H256;
use crate::codec::molecule::*;
use crate::error::{Error, Result};
use crate::utils::constants::{CELL_CAPACITY_SIZE, CKB_UNIT, SCRIPT_FIXED_SIZE, TX_BLOCK_OVERHEAD};
use crate::utils::hex;

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPTS
// ═══════════════════════════════════════════════════════════════════════════════

/// How a script's `code_hash` is matched against deployed code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    /// Data hash, VM version 0
    Data,
    /// Type script hash
    Type,
    /// Data hash, VM version 1
    Data1,
    /// Data hash, VM version 2
    Data2,
}

impl HashType {
    /// Molecule byte
    pub fn as_byte(&self) -> u8 {
        match self {
            HashType::Data => 0,
            HashType::Type => 1,
            HashType::Data1 => 2,
            HashType::Data2 => 4,
        }
    }

    /// Parse the molecule byte
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(HashType::Data),
            1 => Ok(HashType::Type),
            2 => Ok(HashType::Data1),
            4 => Ok(HashType::Data2),
            other => Err(Error::encoding("HashType", format!("unknown byte {}", other))),
        }
    }
}

/// Lock or type script
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Script {
    /// Code hash of the script binary or its type id
    pub code_hash: H256,
    /// How `code_hash` is interpreted
    pub hash_type: HashType,
    /// Script arguments
    #[serde(with = "hex::bytes")]
    pub args: Vec<u8>,
}

impl Script {
    /// Create a script
    pub fn new(code_hash: H256, hash_type: HashType, args: Vec<u8>) -> Self {
        Self { code_hash, hash_type, args }
    }

    /// Same code, different args
    pub fn with_args(&self, args: Vec<u8>) -> Self {
        Self { args, ..self.clone() }
    }

    /// Whether both scripts run the same code
    pub fn same_code(&self, other: &Script) -> bool {
        self.code_hash == other.code_hash && self.hash_type == other.hash_type
    }

    /// Bytes this script occupies inside a cell
    pub fn occupied_size(&self) -> usize {
        SCRIPT_FIXED_SIZE + self.args.len()
    }

    /// Molecule encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        pack_table(&[
            self.code_hash.0.to_vec(),
            vec![self.hash_type.as_byte()],
            pack_bytes(&self.args),
        ])
    }

    /// Decode the molecule encoding
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let fields = unpack_table(data, 3, "Script")?;
        let hash_type = match fields[1] {
            [byte] => HashType::from_byte(*byte)?,
            other => {
                return Err(Error::encoding(
                    "Script",
                    format!("hash_type must be 1 byte, got {}", other.len()),
                ))
            }
        };
        Ok(Self {
            code_hash: H256::from_slice(fields[0])?,
            hash_type,
            args: unpack_bytes(fields[2], "Script.args")?,
        })
    }

    /// blake2b-256 of the molecule encoding
    pub fn hash(&self) -> H256 {
        H256(blake2b_256(self.to_bytes()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CELLS
// ═══════════════════════════════════════════════════════════════════════════════

/// Reference to a transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the producing transaction
    pub tx_hash: H256,
    /// Output index
    #[serde(with = "hex::u32_hex")]
    pub index: u32,
}

impl OutPoint {
    /// Encoded width
    pub const SIZE: usize = 36;

    /// Create an out point
    pub fn new(tx_hash: H256, index: u32) -> Self {
        Self { tx_hash, index }
    }

    /// Molecule struct encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.tx_hash.0.to_vec();
        out.extend_from_slice(&pack_u32(self.index));
        out
    }

    /// Decode the molecule struct encoding
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() != Self::SIZE {
            return Err(Error::encoding(
                "OutPoint",
                format!("expected {} bytes, got {}", Self::SIZE, data.len()),
            ));
        }
        Ok(Self {
            tx_hash: H256::from_slice(&data[..32])?,
            index: unpack_u32(&data[32..], "OutPoint.index")?,
        })
    }
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInput {
    /// Cell being consumed
    pub previous_output: OutPoint,
    /// Relative or absolute lock time
    #[serde(with = "hex::u64_hex")]
    pub since: u64,
}

impl CellInput {
    /// Input with no since restriction
    pub fn new(previous_output: OutPoint) -> Self {
        Self { previous_output, since: 0 }
    }

    /// Molecule struct encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = pack_u64(self.since).to_vec();
        out.extend_from_slice(&self.previous_output.to_bytes());
        out
    }
}

/// How a cell dep is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepType {
    /// The cell holds code
    Code,
    /// The cell holds a list of out points
    DepGroup,
}

/// Cell dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellDep {
    /// Dep cell
    pub out_point: OutPoint,
    /// How the dep is loaded
    pub dep_type: DepType,
}

impl CellDep {
    /// Create a cell dep
    pub fn new(out_point: OutPoint, dep_type: DepType) -> Self {
        Self { out_point, dep_type }
    }

    /// Molecule struct encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.out_point.to_bytes();
        out.push(match self.dep_type {
            DepType::Code => 0,
            DepType::DepGroup => 1,
        });
        out
    }
}

/// Cell output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellOutput {
    /// Capacity in shannons
    #[serde(with = "hex::u64_hex")]
    pub capacity: u64,
    /// Lock script
    pub lock: Script,
    /// Type script
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<Script>,
}

impl CellOutput {
    /// Create an output
    pub fn new(capacity: u64, lock: Script, type_: Option<Script>) -> Self {
        Self { capacity, lock, type_ }
    }

    /// Bytes occupied by this output with `data_len` bytes of data
    pub fn occupied_size(&self, data_len: usize) -> usize {
        CELL_CAPACITY_SIZE
            + self.lock.occupied_size()
            + self.type_.as_ref().map_or(0, Script::occupied_size)
            + data_len
    }

    /// Minimum capacity this output needs, in shannons
    pub fn occupied_capacity(&self, data_len: usize) -> u64 {
        self.occupied_size(data_len) as u64 * CKB_UNIT
    }

    /// Molecule encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        pack_table(&[
            pack_u64(self.capacity).to_vec(),
            self.lock.to_bytes(),
            pack_option(self.type_.as_ref().map(Script::to_bytes)),
        ])
    }
}

/// A live cell as returned by the indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveCell {
    /// Where the cell lives
    pub out_point: OutPoint,
    /// Cell output
    pub output: CellOutput,
    /// Cell data
    #[serde(with = "hex::bytes")]
    pub data: Vec<u8>,
}

impl LiveCell {
    /// Capacity in shannons
    pub fn capacity(&self) -> u64 {
        self.output.capacity
    }

    /// Cell without type script and data, usable for capacity only
    pub fn is_empty_cell(&self) -> bool {
        self.output.type_.is_none() && self.data.is_empty()
    }

    /// Whether the type script equals `type_script`
    pub fn has_type(&self, type_script: &Script) -> bool {
        self.output.type_.as_ref() == Some(type_script)
    }

    /// xUDT amount stored in the first 16 data bytes
    pub fn udt_amount(&self) -> Result<u128> {
        unpack_u128_prefix(&self.data, "xUDT amount")
    }

    /// Input spending this cell
    pub fn as_input(&self) -> CellInput {
        CellInput::new(self.out_point.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WITNESSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Structured witness, each field independently optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessArgs {
    /// Lock script witness
    #[serde(default, with = "hex::opt_bytes")]
    pub lock: Option<Vec<u8>>,
    /// Type script witness for inputs
    #[serde(default, with = "hex::opt_bytes")]
    pub input_type: Option<Vec<u8>>,
    /// Type script witness for outputs
    #[serde(default, with = "hex::opt_bytes")]
    pub output_type: Option<Vec<u8>>,
}

impl WitnessArgs {
    /// Lock placeholder of `size` zero bytes, used for fee sizing
    pub fn lock_placeholder(size: usize) -> Self {
        Self {
            lock: Some(vec![0u8; size]),
            ..Default::default()
        }
    }

    /// Witness with only the lock field set
    pub fn with_lock(lock: Vec<u8>) -> Self {
        Self {
            lock: Some(lock),
            ..Default::default()
        }
    }

    /// Molecule encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        let opt = |field: &Option<Vec<u8>>| pack_option(field.as_deref().map(pack_bytes));
        pack_table(&[opt(&self.lock), opt(&self.input_type), opt(&self.output_type)])
    }

    /// Decode the molecule encoding
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let fields = unpack_table(data, 3, "WitnessArgs")?;
        let opt = |field: &[u8], what: &str| unpack_option(field, |f| unpack_bytes(f, what));
        Ok(Self {
            lock: opt(fields[0], "WitnessArgs.lock")?,
            input_type: opt(fields[1], "WitnessArgs.input_type")?,
            output_type: opt(fields[2], "WitnessArgs.output_type")?,
        })
    }
}

/// Transaction witness: either opaque bytes or a structured placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Witness {
    /// Opaque witness bytes (empty for group followers)
    Raw(#[serde(with = "hex::bytes")] Vec<u8>),
    /// Structured witness for a group leader, filled during signing
    Args(WitnessArgs),
}

impl Witness {
    /// Empty follower witness
    pub fn empty() -> Self {
        Witness::Raw(Vec::new())
    }

    /// Structured leader placeholder with all fields absent
    pub fn empty_args() -> Self {
        Witness::Args(WitnessArgs::default())
    }

    /// Bytes placed in the transaction
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Witness::Raw(bytes) => bytes.clone(),
            Witness::Args(args) => args.to_bytes(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Unsigned (or partially signed) CKB transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CkbTransaction {
    /// Transaction version
    #[serde(with = "hex::u32_hex")]
    pub version: u32,
    /// Cell deps
    pub cell_deps: Vec<CellDep>,
    /// Header deps
    pub header_deps: Vec<H256>,
    /// Inputs
    pub inputs: Vec<CellInput>,
    /// Outputs
    pub outputs: Vec<CellOutput>,
    /// Output data, positionally aligned with outputs
    #[serde(with = "hex::bytes_vec")]
    pub outputs_data: Vec<Vec<u8>>,
    /// Witnesses, positionally aligned with inputs
    pub witnesses: Vec<Witness>,
}

impl CkbTransaction {
    /// Append an output with its data
    pub fn push_output(&mut self, output: CellOutput, data: Vec<u8>) {
        self.outputs.push(output);
        self.outputs_data.push(data);
    }

    /// Add a cell dep unless already present
    pub fn add_cell_dep(&mut self, dep: CellDep) {
        if !self.cell_deps.contains(&dep) {
            self.cell_deps.push(dep);
        }
    }

    /// Sum of output capacities
    pub fn outputs_capacity(&self) -> u64 {
        self.outputs.iter().map(|o| o.capacity).sum()
    }

    /// Check the output/data alignment invariant
    pub fn check_alignment(&self) -> Result<()> {
        if self.outputs.len() != self.outputs_data.len() {
            return Err(Error::InvariantViolation(format!(
                "{} outputs but {} outputs_data",
                self.outputs.len(),
                self.outputs_data.len()
            )));
        }
        Ok(())
    }

    /// Molecule encoding of the raw transaction (no witnesses)
    pub fn raw_bytes(&self) -> Vec<u8> {
        let cell_deps: Vec<_> = self.cell_deps.iter().map(CellDep::to_bytes).collect();
        let inputs: Vec<_> = self.inputs.iter().map(CellInput::to_bytes).collect();
        let outputs: Vec<_> = self.outputs.iter().map(CellOutput::to_bytes).collect();
        let outputs_data: Vec<_> = self.outputs_data.iter().map(|d| pack_bytes(d)).collect();
        pack_table(&[
            pack_u32(self.version).to_vec(),
            pack_fixvec(&cell_deps),
            pack_fixvec(&self.header_deps),
            pack_fixvec(&inputs),
            pack_dynvec(&outputs),
            pack_dynvec(&outputs_data),
        ])
    }

    /// Molecule encoding of the full transaction
    pub fn to_bytes(&self) -> Vec<u8> {
        let witnesses: Vec<_> = self.witnesses.iter().map(|w| pack_bytes(&w.to_bytes())).collect();
        pack_table(&[self.raw_bytes(), pack_dynvec(&witnesses)])
    }

    /// Transaction hash
    pub fn hash(&self) -> H256 {
        H256(blake2b_256(self.raw_bytes()))
    }

    /// Size the transaction occupies in a block, the basis of the fee
    pub fn serialized_size_in_block(&self) -> usize {
        self.to_bytes().len() + TX_BLOCK_OVERHEAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secp_lock(arg: u8) -> Script {
        Script::new(
            "0x9bd7e06f3ecf4be0f2fcd2188b23f1b9fcc88e5d4b65a8637b17723bbda3cce8"
                .parse()
                .unwrap(),
            HashType::Type,
            vec![arg; 20],
        )
    }

    #[test]
    fn test_script_molecule_round_trip() {
        let script = secp_lock(7);
        let bytes = script.to_bytes();
        // header 16 + code hash 32 + hash type 1 + args 4 + 20
        assert_eq!(bytes.len(), 73);
        assert_eq!(Script::from_slice(&bytes).unwrap(), script);
    }

    #[test]
    fn test_script_hash_covers_every_field() {
        let script = secp_lock(1);
        assert_eq!(script.hash(), secp_lock(1).hash());
        assert_ne!(script.hash(), secp_lock(2).hash());

        let mut data_type = script.clone();
        data_type.hash_type = HashType::Data1;
        assert_ne!(script.hash(), data_type.hash());
    }

    #[test]
    fn test_occupied_capacity_secp_cell() {
        let output = CellOutput::new(0, secp_lock(1), None);
        assert_eq!(output.occupied_capacity(0), 61 * CKB_UNIT);
    }

    #[test]
    fn test_witness_args_placeholder_size() {
        let witness = WitnessArgs::lock_placeholder(65);
        assert_eq!(witness.to_bytes().len(), 85);
        assert_eq!(WitnessArgs::default().to_bytes().len(), 16);
        assert_eq!(WitnessArgs::from_slice(&witness.to_bytes()).unwrap(), witness);
    }

    #[test]
    fn test_witness_serde_shapes() {
        let raw: Witness = serde_json::from_str("\"0x\"").unwrap();
        assert_eq!(raw, Witness::empty());

        let args: Witness = serde_json::from_str(r#"{"lock":"0x00"}"#).unwrap();
        assert_eq!(args, Witness::Args(WitnessArgs::with_lock(vec![0])));
    }

    #[test]
    fn test_transaction_json_round_trip() {
        let mut tx = CkbTransaction::default();
        tx.inputs.push(CellInput::new(OutPoint::new(H256([1; 32]), 3)));
        tx.push_output(CellOutput::new(100 * CKB_UNIT, secp_lock(2), None), vec![]);
        tx.witnesses.push(Witness::empty_args());

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"index\":\"0x3\""));
        let back: CkbTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
        assert_eq!(back.hash(), tx.hash());
    }
}
