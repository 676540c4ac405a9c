//! RGB++ operations spanning both chains.
//!
//! This module provides:
//! - Caller-facing intents
//! - The commitment a BTC transaction carries for its CKB counterpart
//! - Virtual transaction builders and their post-broadcast completion
//! - The orchestrator running both legs in order

pub mod commitment;
pub mod intent;
pub mod orchestrator;
pub mod virtual_tx;

pub use commitment::*;
pub use intent::*;
pub use orchestrator::*;
pub use virtual_tx::*;
