//! RGB++ binding codec.
//!
//! Byte-exact encode/decode of every binary layout the core produces:
//! - Molecule primitives (fixvec, dynvec, table, option)
//! - 32-byte hashes
//! - Token info cell data
//! - xUDT witness input
//! - RGB++ lock args, BTC time lock args and the RGB++ unlock witness
//! - Spore and cluster data
//!
//! Every decoder rejects short, long or otherwise malformed input instead of
//! truncating it.

pub mod hash;
pub mod molecule;
pub mod rgbpp;
pub mod spore;
pub mod token_info;
pub mod xudt_witness;

pub use hash::H256;
pub use rgbpp::{BtcTimeLockArgs, ExtraCommitmentData, RgbppLockArgs, RgbppUnlock};
pub use spore::{ClusterData, SporeData};
pub use token_info::TokenInfo;
pub use xudt_witness::XudtWitnessInput;

/// Encode an xUDT amount as cell data
pub fn encode_udt_amount(amount: u128) -> Vec<u8> {
    molecule::pack_u128(amount).to_vec()
}
