//! Bitcoin side of RGB++.
//!
//! This module provides PSBT construction, wallet signing and the data
//! source the orchestrator reads UTXOs and proofs from.

pub mod psbt;
pub mod scripts;
pub mod signer;
pub mod source;
pub mod utxo;

pub use psbt::*;
pub use scripts::*;
pub use signer::*;
pub use source::*;
pub use utxo::*;
