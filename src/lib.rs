//! # RGB++ Core
//!
//! Transaction orchestration for RGB++ assets: xUDT tokens and spores that
//! live in CKB cells bound to Bitcoin UTXOs.
//!
//! ## Architecture
//!
//! The crate consists of several modules:
//!
//! - **Codec**: Byte-exact molecule layouts of every RGB++ structure
//! - **CKB**: Capacity, fees, cell collection and the CKB-only builders
//! - **BTC**: PSBT construction, wallet signing and the Bitcoin data source
//! - **RGB++**: Commitments, virtual transactions and the leap orchestrator
//!
//! Network access, wallets and key material stay outside: every operation
//! receives its collaborators as trait objects.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rgbpp_core::prelude::*;
//!
//! let orchestrator = LeapOrchestrator::new(
//!     &collector, &btc_source, &wallet, &ckb_wallet, &ckb_node,
//!     RgbppConfig::default(),
//! );
//! let result = orchestrator.execute(&intent).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod btc;
pub mod ckb;
pub mod codec;
pub mod core;
pub mod error;
pub mod rgbpp;
pub mod selector;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::btc::{
        signer::{InputToSign, PsbtSigner, SignInput},
        source::{BtcDataSource, MemoryBtcSource, SpvProof},
        utxo::Utxo,
    };
    pub use crate::ckb::{
        builder::{BuiltTransaction, CkbTxBuilder},
        collector::{CellQuery, Collector, MemoryCollector},
        signer::{CkbClient, CkbSigner},
        types::{CellOutput, CkbTransaction, LiveCell, OutPoint, Script},
    };
    pub use crate::codec::{RgbppLockArgs, TokenInfo, H256};
    pub use crate::core::{
        config::RgbppConfig,
        network::{BtcTestnetType, Chain, Network},
        scripts::{ScriptKind, ScriptRegistry},
    };
    pub use crate::error::{Error, Result};
    pub use crate::rgbpp::{
        intent::{AssetIdentity, BtcParty, CkbParty, FeeParams, LaunchIntent, Receiver, TransferIntent},
        orchestrator::{LeapOrchestrator, LeapState, TxResult},
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
